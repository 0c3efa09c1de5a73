//! Classification of failed API requests.

use std::fmt;

use super::payload::Payload;

pub const CODE_NETWORK: &str = "NETWORK_ERROR";
pub const CODE_UNAUTHORIZED: &str = "UNAUTHORIZED";
pub const CODE_VALIDATION: &str = "VALIDATION_ERROR";
pub const CODE_FORBIDDEN: &str = "FORBIDDEN";
pub const CODE_NOT_FOUND: &str = "NOT_FOUND";
pub const CODE_CONFLICT: &str = "CONFLICT";
pub const CODE_RATE_LIMITED: &str = "RATE_LIMITED";
pub const CODE_SERVER: &str = "SERVER_ERROR";
pub const CODE_UNKNOWN: &str = "UNKNOWN_ERROR";
pub const CODE_DECODE: &str = "DECODE_ERROR";

/// Cause of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response was received (DNS, connection refused, reset, ...)
    Network,
    /// HTTP 401
    Authentication,
    /// HTTP 400 or 422, usually with field-level errors in the payload
    Validation,
    /// HTTP 500, 502, 503 or 504
    Server,
    /// Any other status-coded failure
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Network => "network",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Validation => "validation",
            ErrorKind::Server => "server",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A failed request, classified by [`ErrorKind`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
    code: Option<String>,
    payload: Option<Payload>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            code: None,
            payload: None,
        }
    }

    /// A failure to reach the server at all.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message).with_code(CODE_NETWORK)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Field-level messages from a validation payload.
    ///
    /// Accepts `{"errors": {"field": "msg" | ["msg", ...]}}` and
    /// `{"errors": [{"field": "...", "message": "..."}]}`.
    pub fn field_errors(&self) -> Vec<(String, String)> {
        let Some(errors) = self
            .payload
            .as_ref()
            .and_then(Payload::as_json)
            .and_then(|body| body.get("errors"))
        else {
            return Vec::new();
        };

        let mut fields = Vec::new();
        if let Some(map) = errors.as_object() {
            for (field, value) in map {
                match value {
                    serde_json::Value::String(msg) => fields.push((field.clone(), msg.clone())),
                    serde_json::Value::Array(items) => {
                        for msg in items.iter().filter_map(|m| m.as_str()) {
                            fields.push((field.clone(), msg.to_string()));
                        }
                    }
                    other => fields.push((field.clone(), other.to_string())),
                }
            }
        } else if let Some(items) = errors.as_array() {
            for item in items {
                let field = item.get("field").and_then(|f| f.as_str());
                let msg = item.get("message").and_then(|m| m.as_str());
                if let (Some(field), Some(msg)) = (field, msg) {
                    fields.push((field.to_string(), msg.to_string()));
                }
            }
        }
        fields
    }

    /// Message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::Authentication => {
                "Your session has expired. Please log in again.".to_string()
            }
            ErrorKind::Validation => {
                let mut msg = self.message.clone();
                for (field, error) in self.field_errors() {
                    msg.push_str(&format!("\n  - {}: {}", field, error));
                }
                msg
            }
            ErrorKind::Network => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            ErrorKind::Server => {
                "The server encountered an error. Please try again later.".to_string()
            }
            ErrorKind::Unknown => match self.code() {
                Some(CODE_FORBIDDEN) => {
                    "You do not have permission to perform this action.".to_string()
                }
                Some(CODE_NOT_FOUND) => "The requested resource was not found.".to_string(),
                Some(CODE_RATE_LIMITED) => {
                    "Too many requests. Please wait a moment and try again.".to_string()
                }
                _ => self.message.clone(),
            },
        }
    }
}

/// Classifies a non-2xx response into an [`ApiError`].
///
/// The message comes from `body.message`, then `body.error`, then `"HTTP <status> error"`.
/// The decoded body, if any, is attached as the error payload.
pub fn classify(status: u16, body: Option<Payload>) -> ApiError {
    let message = body
        .as_ref()
        .and_then(|b| b.str_field("message").or_else(|| b.str_field("error")))
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {} error", status));

    let (kind, code) = match status {
        400 | 422 => (ErrorKind::Validation, CODE_VALIDATION),
        401 => (ErrorKind::Authentication, CODE_UNAUTHORIZED),
        403 => (ErrorKind::Unknown, CODE_FORBIDDEN),
        404 => (ErrorKind::Unknown, CODE_NOT_FOUND),
        409 => (ErrorKind::Unknown, CODE_CONFLICT),
        429 => (ErrorKind::Unknown, CODE_RATE_LIMITED),
        500 | 502 | 503 | 504 => (ErrorKind::Server, CODE_SERVER),
        _ => (ErrorKind::Unknown, CODE_UNKNOWN),
    };

    let error = ApiError::new(kind, message)
        .with_status(status)
        .with_code(code);
    match body {
        Some(body) => error.with_payload(body),
        None => error,
    }
}
