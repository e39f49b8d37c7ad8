//! Decision tables for applying schema diffs and handling broken connectors.
//! Pure functions; the planner performs the prompting they ask for.

use crate::error::StewardError;
use crate::steward::RunFlags;
use pgsteward_schema::{Diff, SchemaValidation};
use std::fmt;

/// Which diffs to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDecision {
    All,
    Safe,
    None,
}

impl MigrationDecision {
    pub fn admits(self, diff: &Diff) -> bool {
        match self {
            MigrationDecision::All => true,
            MigrationDecision::Safe => !diff.destructive,
            MigrationDecision::None => false,
        }
    }
}

/// The validation pass a set of diffs came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPass {
    Compatible,
    Strict,
    /// Optional STRICT diffs offered after a COMPATIBLE pass when no mode is
    /// configured. Skipping them is the default.
    StrictAfterCompatible,
}

impl ValidationPass {
    pub fn for_mode(mode: SchemaValidation) -> Self {
        match mode {
            SchemaValidation::Strict => ValidationPass::Strict,
            SchemaValidation::Compatible | SchemaValidation::None => ValidationPass::Compatible,
        }
    }

    pub fn default_decision(self) -> MigrationDecision {
        match self {
            ValidationPass::StrictAfterCompatible => MigrationDecision::None,
            ValidationPass::Compatible | ValidationPass::Strict => MigrationDecision::All,
        }
    }
}

impl fmt::Display for ValidationPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValidationPass::Compatible => "COMPATIBLE",
            ValidationPass::Strict => "STRICT",
            ValidationPass::StrictAfterCompatible => "STRICT_AFTER_COMPATIBLE",
        })
    }
}

/// An answer the user can pick in the migration prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationChoice {
    All { destructive: bool },
    Safe,
    Skip,
    Abort,
}

impl MigrationChoice {
    pub fn label(self) -> &'static str {
        match self {
            MigrationChoice::All { destructive: false } => "Execute all",
            MigrationChoice::All { destructive: true } => "Execute all (including destructive)",
            MigrationChoice::Safe => "Execute safe only",
            MigrationChoice::Skip => "Skip them",
            MigrationChoice::Abort => "Abort",
        }
    }

    pub fn into_decision(self) -> Result<MigrationDecision, StewardError> {
        match self {
            MigrationChoice::All { .. } => Ok(MigrationDecision::All),
            MigrationChoice::Safe => Ok(MigrationDecision::Safe),
            MigrationChoice::Skip => Ok(MigrationDecision::None),
            MigrationChoice::Abort => Err(StewardError::MigrationAborted),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationContext {
    pub flags: RunFlags,
    pub validate_only: bool,
    pub destructive: bool,
    pub has_safe_diffs: bool,
    pub pass: ValidationPass,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyOutcome {
    Decided(MigrationDecision),
    Prompt {
        choices: Vec<MigrationChoice>,
        default: usize,
    },
}

/// Resolves which diffs may run.
///
/// | interactive | validate only | force | destructive | outcome |
/// |---|---|---|---|---|
/// | yes | any | any | any | prompt |
/// | no | no | any | any | `MigrationRequired` |
/// | no | yes | yes | any | pass default |
/// | no | yes | no | no | pass default |
/// | no | yes | no | yes | `DestructiveChangeRejected` |
pub fn decide_migration(ctx: &MigrationContext) -> Result<PolicyOutcome, StewardError> {
    if ctx.flags.interactive() {
        return Ok(prompt_for(ctx));
    }
    if !ctx.validate_only {
        return Err(StewardError::MigrationRequired);
    }
    if ctx.flags.force || !ctx.destructive {
        return Ok(PolicyOutcome::Decided(ctx.pass.default_decision()));
    }
    Err(StewardError::DestructiveChangeRejected)
}

fn prompt_for(ctx: &MigrationContext) -> PolicyOutcome {
    let mut choices = vec![MigrationChoice::All {
        destructive: ctx.destructive,
    }];
    if ctx.destructive && ctx.has_safe_diffs {
        choices.push(MigrationChoice::Safe);
    }
    let last = match ctx.pass {
        ValidationPass::StrictAfterCompatible => MigrationChoice::Skip,
        ValidationPass::Compatible | ValidationPass::Strict => MigrationChoice::Abort,
    };
    choices.push(last);
    let default = match ctx.pass.default_decision() {
        MigrationDecision::None => choices.len() - 1,
        MigrationDecision::All | MigrationDecision::Safe => 0,
    };
    PolicyOutcome::Prompt { choices, default }
}

/// What to do with connectors the new schema would break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorOutcome {
    Keep,
    Delete,
    Confirm,
    Reject,
}

/// Validate-only runs ignore broken connectors, `--force` deletes them,
/// interactive runs ask and everything else fails.
pub fn decide_invalid_connectors(
    count: usize,
    flags: RunFlags,
    validate_only: bool,
) -> ConnectorOutcome {
    if count == 0 || validate_only {
        ConnectorOutcome::Keep
    } else if flags.force {
        ConnectorOutcome::Delete
    } else if flags.interactive() {
        ConnectorOutcome::Confirm
    } else {
        ConnectorOutcome::Reject
    }
}

/// Firebase CLI command that deploys the broken connectors before the schema.
/// This binary only manages the SQL side and has no connector deploy of its own.
pub fn suggested_command(service_name: &str, connectors: &[String]) -> String {
    let service_id = service_name.rsplit('/').next().unwrap_or(service_name);
    let onlys = connectors
        .iter()
        .map(|c| {
            let connector_id = c.rsplit('/').next().unwrap_or(c);
            format!("dataconnect:{service_id}:{connector_id}")
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("firebase deploy --only {onlys}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(non_interactive: bool, force: bool, validate_only: bool, destructive: bool) -> MigrationContext {
        MigrationContext {
            flags: RunFlags {
                non_interactive,
                force,
            },
            validate_only,
            destructive,
            has_safe_diffs: true,
            pass: ValidationPass::Compatible,
        }
    }

    #[test]
    fn non_interactive_safe_migration_runs_everything() {
        assert_eq!(
            decide_migration(&ctx(true, false, true, false)).unwrap(),
            PolicyOutcome::Decided(MigrationDecision::All)
        );
    }

    #[test]
    fn non_interactive_destructive_needs_force() {
        assert!(matches!(
            decide_migration(&ctx(true, false, true, true)),
            Err(StewardError::DestructiveChangeRejected)
        ));
        assert_eq!(
            decide_migration(&ctx(true, true, true, true)).unwrap(),
            PolicyOutcome::Decided(MigrationDecision::All)
        );
    }

    #[test]
    fn non_interactive_deploy_always_fails() {
        for (force, destructive) in [(false, false), (false, true), (true, false), (true, true)] {
            assert!(matches!(
                decide_migration(&ctx(true, force, false, destructive)),
                Err(StewardError::MigrationRequired)
            ));
        }
    }

    #[test]
    fn interactive_always_prompts() {
        for force in [false, true] {
            let outcome = decide_migration(&ctx(false, force, true, false)).unwrap();
            assert_eq!(
                outcome,
                PolicyOutcome::Prompt {
                    choices: vec![
                        MigrationChoice::All { destructive: false },
                        MigrationChoice::Abort
                    ],
                    default: 0,
                }
            );
        }
    }

    #[test]
    fn destructive_prompt_offers_safe_subset() {
        let outcome = decide_migration(&ctx(false, false, false, true)).unwrap();
        let PolicyOutcome::Prompt { choices, .. } = outcome else {
            panic!("expected prompt");
        };
        assert_eq!(
            choices,
            vec![
                MigrationChoice::All { destructive: true },
                MigrationChoice::Safe,
                MigrationChoice::Abort
            ]
        );
        assert_eq!(choices[0].label(), "Execute all (including destructive)");
    }

    #[test]
    fn strict_after_compatible_defaults_to_skip() {
        let mut c = ctx(false, false, true, false);
        c.pass = ValidationPass::StrictAfterCompatible;
        assert_eq!(
            decide_migration(&c).unwrap(),
            PolicyOutcome::Prompt {
                choices: vec![MigrationChoice::All { destructive: false }, MigrationChoice::Skip],
                default: 1,
            }
        );

        c.flags.non_interactive = true;
        assert_eq!(
            decide_migration(&c).unwrap(),
            PolicyOutcome::Decided(MigrationDecision::None)
        );
    }

    #[test]
    fn safe_decision_filters_destructive_diffs() {
        let safe = Diff {
            description: "add".to_string(),
            destructive: false,
            sql: "CREATE TABLE t (a int)".to_string(),
        };
        let drop = Diff {
            description: "drop".to_string(),
            destructive: true,
            sql: "DROP TABLE u".to_string(),
        };
        assert!(MigrationDecision::Safe.admits(&safe));
        assert!(!MigrationDecision::Safe.admits(&drop));
        assert!(!MigrationDecision::None.admits(&safe));
        assert!(MigrationChoice::Abort.into_decision().is_err());
    }

    #[test]
    fn connector_policy() {
        let interactive = RunFlags::default();
        let forced = RunFlags {
            non_interactive: true,
            force: true,
        };
        let batch = RunFlags {
            non_interactive: true,
            force: false,
        };
        assert_eq!(decide_invalid_connectors(0, batch, false), ConnectorOutcome::Keep);
        assert_eq!(decide_invalid_connectors(2, batch, true), ConnectorOutcome::Keep);
        assert_eq!(decide_invalid_connectors(2, forced, false), ConnectorOutcome::Delete);
        assert_eq!(decide_invalid_connectors(2, interactive, false), ConnectorOutcome::Confirm);
        assert_eq!(decide_invalid_connectors(2, batch, false), ConnectorOutcome::Reject);
    }

    #[test]
    fn suggested_command_lists_connector_ids() {
        let cmd = suggested_command(
            "projects/p/locations/l/services/svc",
            &[
                "projects/p/locations/l/services/svc/connectors/a".to_string(),
                "projects/p/locations/l/services/svc/connectors/b".to_string(),
            ],
        );
        assert_eq!(cmd, "firebase deploy --only dataconnect:svc:a,dataconnect:svc:b");
    }
}
