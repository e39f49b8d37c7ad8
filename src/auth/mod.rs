mod account;
mod token;

pub use account::resolve_caller_account;
pub use token::{AccessTokenSource, AuthorizedUserFile, RefreshingToken, StaticToken};
