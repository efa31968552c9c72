//! Error types for devicelink.

use thiserror::Error;

/// Primary error type for backend and configuration operations.
///
/// Errors raised while a session is polling never escape the coordinator;
/// they surface through [`AuthorizationView`](crate::coordinator::AuthorizationView)
/// instead. `LinkError` is what the backend seam and the config loader return.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unexpected status {status} from {endpoint}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Broad error category used for logging and CLI hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Server,
    Api,
    Serialization,
    State,
}

impl LinkError {
    pub fn unexpected_status(endpoint: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::UnexpectedStatus {
            endpoint: endpoint.into(),
            status,
            body: body.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Network(_) | Self::Io(_) => ErrorCategory::Network,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::UnexpectedStatus { status, .. } => match status {
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::InvalidState(_) => ErrorCategory::State,
        }
    }

    /// Whether a later poll tick could plausibly succeed where this one failed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Server
        )
    }
}

impl From<toml::de::Error> for LinkError {
    fn from(error: toml::de::Error) -> Self {
        Self::Configuration(error.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, LinkError>;
