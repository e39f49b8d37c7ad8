mod oauth;
mod steward;
mod upstream;

pub use steward::StewardError;
pub(crate) use upstream::{is_already_exists, is_builtin_role_race, upstream_error};

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
