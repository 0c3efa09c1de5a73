//! Decoded response bodies.

use log::debug;
use serde_json::Value;
use std::fmt;

/// A response body decoded according to its content type.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Body of an `application/json` response.
    Json(Value),
    /// Any other body, kept as raw text.
    Text(String),
}

impl Payload {
    /// Decodes `body` as JSON when `content_type` mentions `application/json`,
    /// otherwise keeps it as text. A JSON body that fails to parse is kept as text.
    pub fn decode(content_type: Option<&str>, body: String) -> Self {
        let is_json = content_type
            .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
            .unwrap_or(false);

        if !is_json {
            return Payload::Text(body);
        }

        match serde_json::from_str(&body) {
            Ok(value) => Payload::Json(value),
            Err(e) => {
                debug!("Response declared JSON but failed to parse ({}), keeping text", e);
                Payload::Text(body)
            }
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Json(_) => None,
        }
    }

    /// Looks up a string field of a JSON object body.
    pub(crate) fn str_field(&self, key: &str) -> Option<&str> {
        self.as_json()?.get(key)?.as_str()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Json(value) => match serde_json::to_string_pretty(value) {
                Ok(pretty) => f.write_str(&pretty),
                Err(_) => write!(f, "{}", value),
            },
            Payload::Text(text) => f.write_str(text),
        }
    }
}
