//! Interactive confirmation surface. The terminal implementation uses
//! `inquire`; tests script their answers.

use crate::error::StewardError;
use async_trait::async_trait;
use inquire::{Confirm, Select};

#[async_trait]
pub trait Prompter: Send + Sync {
    async fn confirm(&self, message: &str, default: bool) -> Result<bool, StewardError>;

    /// Returns the index of the chosen option.
    async fn select(
        &self,
        message: &str,
        options: &[String],
        default: usize,
    ) -> Result<usize, StewardError>;
}

/// Prompts on the controlling terminal. `inquire` blocks, so every prompt
/// runs on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn confirm(&self, message: &str, default: bool) -> Result<bool, StewardError> {
        let message = message.to_string();
        tokio::task::spawn_blocking(move || {
            Confirm::new(&message)
                .with_default(default)
                .prompt()
                .map_err(|e| StewardError::Prompt(e.to_string()))
        })
        .await
        .map_err(|e| StewardError::Prompt(e.to_string()))?
    }

    async fn select(
        &self,
        message: &str,
        options: &[String],
        default: usize,
    ) -> Result<usize, StewardError> {
        let message = message.to_string();
        let options = options.to_vec();
        tokio::task::spawn_blocking(move || {
            Select::new(&message, options)
                .with_starting_cursor(default)
                .with_vim_mode(true)
                .raw_prompt()
                .map(|choice| choice.index)
                .map_err(|e| StewardError::Prompt(e.to_string()))
        })
        .await
        .map_err(|e| StewardError::Prompt(e.to_string()))?
    }
}

/// Used for `--non-interactive` runs; any prompt is a bug in the caller's
/// policy and fails loudly.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

#[async_trait]
impl Prompter for NoPrompt {
    async fn confirm(&self, message: &str, _default: bool) -> Result<bool, StewardError> {
        Err(StewardError::Prompt(format!(
            "cannot ask {message:?} in non-interactive mode"
        )))
    }

    async fn select(
        &self,
        message: &str,
        _options: &[String],
        _default: usize,
    ) -> Result<usize, StewardError> {
        Err(StewardError::Prompt(format!(
            "cannot ask {message:?} in non-interactive mode"
        )))
    }
}
