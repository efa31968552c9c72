//! Convenience re-exports for common use.

pub use crate::auth::{AuthBackend, DeviceCode, FlowError, HttpBackend, StartResponse, Token};
pub use crate::config::{LinkConfig, Timing};
pub use crate::coordinator::{AuthorizationView, Coordinator, Outcome, Phase, StartOutcome};
pub use crate::error::{LinkError, Result};
