use clap::{Args, Parser, Subcommand};
use mimalloc::MiMalloc;
use pgsteward::config::Config;
use pgsteward::migrate::diffs_to_string;
use pgsteward::setup::{grant_role_to_user, setup_schema, setup_schema_if_necessary};
use pgsteward::sql::Visibility;
use pgsteward::{
    RunFlags, StewardError, Target, bootstrap, diff_schema, inspect_schema, migrate_schema,
};
use pgsteward_grants::ManagedRole;
use pgsteward_schema::Schema;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "pgsteward")]
#[command(about = "Provision SQL roles and migrate schemas on Cloud SQL for PostgreSQL", long_about = None)]
struct Cli {
    /// Config file (defaults to ./pgsteward.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Never prompt; fail instead of guessing on irreversible decisions
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Apply destructive migrations and delete broken connectors without asking
    #[arg(long, global = true)]
    force: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show ownership and setup status of a schema
    Status {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Create or repair the managed owner, writer and reader roles
    Setup {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Print the SQL needed to make the database match a schema document
    Diff {
        /// Schema document (JSON)
        #[arg(long)]
        schema_file: PathBuf,
    },

    /// Validate a schema document and migrate the database to match it
    Migrate {
        #[arg(long)]
        schema_file: PathBuf,
    },

    /// Migrate the database, then write the schema to the data service
    DeploySchema {
        #[arg(long)]
        schema_file: PathBuf,
    },

    /// Grant a managed role to a user or service account
    Grant {
        #[command(flatten)]
        target: TargetArgs,

        /// owner, writer or reader
        #[arg(long)]
        role: ManagedRole,

        /// Account e-mail to grant the role to
        #[arg(long)]
        email: String,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Cloud SQL instance id (defaults to database.instance_id)
    #[arg(long)]
    instance: Option<String>,

    /// Database name (defaults to database.database_id)
    #[arg(long)]
    database: Option<String>,

    /// Postgres schema (defaults to database.schema)
    #[arg(long)]
    schema: Option<String>,
}

impl TargetArgs {
    fn resolve(self, cfg: &Config) -> Result<Target, StewardError> {
        let instance = self
            .instance
            .or_else(|| cfg.database.instance_id.clone())
            .ok_or_else(|| StewardError::Config("--instance or database.instance_id is required".to_string()))?;
        let database = self
            .database
            .or_else(|| cfg.database.database_id.clone())
            .ok_or_else(|| StewardError::Config("--database or database.database_id is required".to_string()))?;
        let schema = self.schema.unwrap_or_else(|| cfg.database.schema.clone());
        Ok(Target::new(cfg.basic.project_id.clone(), instance, database).with_schema(schema))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let cfg = match Config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    let flags = RunFlags {
        non_interactive: cli.non_interactive,
        force: cli.force,
    };
    match run(cli.command, &cfg, flags).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, cfg: &Config, flags: RunFlags) -> Result<(), StewardError> {
    let steward = bootstrap::build_steward(cfg, flags).await?;
    match command {
        Commands::Status { target } => {
            let target = target.resolve(cfg)?;
            let snapshot = inspect_schema(steward.executor.as_ref(), &target).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::Setup { target } => {
            let target = target.resolve(cfg)?;
            let status = setup_schema(&steward, &target, Visibility::Verbose).await?;
            info!(target = %target, status = %status, "Schema setup complete");
        }
        Commands::Diff { schema_file } => {
            let schema = read_schema(&schema_file)?;
            let diffs = diff_schema(&steward, &schema).await?;
            if !diffs.is_empty() {
                println!("{}", diffs_to_string(&diffs));
            }
        }
        Commands::Migrate { schema_file } => {
            let schema = read_schema(&schema_file)?;
            let executed = migrate_schema(&steward, &schema, true).await?;
            info!(executed = executed.len(), "Schema migration finished");
        }
        Commands::DeploySchema { schema_file } => {
            let schema = read_schema(&schema_file)?;
            let executed = migrate_schema(&steward, &schema, false).await?;
            info!(executed = executed.len(), "Schema deployed");
        }
        Commands::Grant {
            target,
            role,
            email,
        } => {
            let target = target.resolve(cfg)?;
            setup_schema_if_necessary(&steward, &target).await?;
            grant_role_to_user(&steward, &target, role, &email).await?;
        }
    }
    Ok(())
}

fn read_schema(path: &Path) -> Result<Schema, StewardError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
