use std::fmt;

use serde::{Deserialize, Serialize};

/// Error record reported by the backend while the token exchange is pending.
///
/// The backend may send bare strings (`"E_EXPIRED"`) or objects carrying a
/// `message` or `error` field; both normalize to the same record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FlowErrorWire")]
pub struct FlowError {
    pub message: String,
}

impl FlowError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&str> for FlowError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlowErrorWire {
    Text(String),
    Message { message: String },
    Error { error: String },
    Other(serde_json::Value),
}

impl From<FlowErrorWire> for FlowError {
    fn from(wire: FlowErrorWire) -> Self {
        match wire {
            FlowErrorWire::Text(message)
            | FlowErrorWire::Message { message }
            | FlowErrorWire::Error { error: message } => Self { message },
            FlowErrorWire::Other(value) => Self {
                message: value.to_string(),
            },
        }
    }
}
