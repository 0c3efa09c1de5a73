//! User notifications and the caller-side handling of request errors.

use log::{debug, warn};
use std::fmt;

use crate::auth::TokenStore;
use crate::http::{ApiError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// Writes notifications to stderr.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        eprintln!("{}: {}", severity, message);
    }
}

/// Severity a request error is shown with.
pub fn severity_for(error: &ApiError) -> Severity {
    match error.kind() {
        ErrorKind::Network | ErrorKind::Server => Severity::Warning,
        _ => Severity::Error,
    }
}

/// Translates a failed request into a user notification.
///
/// Authentication failures also clear the stored credentials so the next run
/// starts from a clean login.
pub fn handle_error(error: &ApiError, tokens: &dyn TokenStore, notifier: &dyn Notifier) {
    debug!(
        "Request failed: kind={} status={:?} code={:?}: {}",
        error.kind(),
        error.status(),
        error.code(),
        error
    );

    if error.kind() == ErrorKind::Authentication {
        if let Err(e) = tokens.clear() {
            warn!("Failed to clear stored credentials: {:#}", e);
        }
    }

    notifier.notify(&error.user_message(), severity_for(error));
}
