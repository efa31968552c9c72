//! Backend seam polled by the coordinator.

use async_trait::async_trait;

use super::device_code::DeviceCodeResponse;
use super::error::FlowError;
use super::token::TokenResponse;
use crate::error::LinkError;

/// How the backend answered a request to start authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartResponse {
    /// The backend already holds a valid authorization; nothing to do.
    AlreadyAuthorized,
    /// The backend began a device flow with the provider.
    FlowStarted,
}

/// Backend that proxies the provider's device authorization exchange.
///
/// Implementations must be cheap to call repeatedly; the coordinator polls
/// `device_code`, `token` and `errors` on fixed intervals.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Ask the backend to begin authorization.
    ///
    /// Any status other than "already authorized" or "flow started" must be
    /// reported as an error.
    async fn start_authorization(&self) -> Result<StartResponse, LinkError>;

    /// Fetch the current device code; an empty `code` means "not yet issued".
    async fn device_code(&self) -> Result<DeviceCodeResponse, LinkError>;

    /// Fetch the current access token; empty or missing means "not yet issued".
    async fn token(&self) -> Result<TokenResponse, LinkError>;

    /// Fetch the flow errors recorded so far, oldest first.
    async fn errors(&self) -> Result<Vec<FlowError>, LinkError>;
}
