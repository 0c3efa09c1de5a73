//! Command-line handlers.

mod auth;
mod request;

pub use auth::{auth_clear, auth_set, auth_status};
pub use request::{build_options, parse_header, request};
