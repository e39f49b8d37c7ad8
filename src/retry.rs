use backon::{BackoffBuilder, ConstantBuilder};
use std::time::Duration;

use crate::config::RetryConfig;

/// Linear backoff: the n-th retry waits `n * unit`.
///
/// `attempts` counts the first try, so at most `attempts - 1` sleeps are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    unit: Duration,
    attempts: usize,
}

impl LinearBackoff {
    pub fn new(unit: Duration, attempts: usize) -> Self {
        Self { unit, attempts }
    }

    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self::new(cfg.identity_backoff(), cfg.identity_attempts)
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 3)
    }
}

impl BackoffBuilder for LinearBackoff {
    type Backoff = std::vec::IntoIter<Duration>;

    fn build(self) -> Self::Backoff {
        (1..self.attempts.max(1))
            .map(|n| self.unit * n as u32)
            .collect::<Vec<_>>()
            .into_iter()
    }
}

/// Fixed-interval polling for long-running operations.
pub fn operation_poll(cfg: &RetryConfig) -> ConstantBuilder {
    ConstantBuilder::default()
        .with_delay(cfg.poll_interval())
        .with_max_times(cfg.max_polls)
}
