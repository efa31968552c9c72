//! Read model handed to display code.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::session::{AuthorizationSession, Outcome, Phase};
use crate::auth::{DeviceCode, FlowError};

/// What a settings page or notification renderer needs to know.
///
/// Never carries timers or the access token itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationView {
    pub generation: u64,
    pub phase: Phase,
    pub device_code: Option<DeviceCode>,
    pub errors: Vec<FlowError>,
    pub authorized: bool,
    pub outcome: Option<Outcome>,
}

impl Default for AuthorizationView {
    fn default() -> Self {
        Self::project(&AuthorizationSession::new())
    }
}

impl From<&AuthorizationSession> for AuthorizationView {
    fn from(session: &AuthorizationSession) -> Self {
        Self::project(session)
    }
}

impl AuthorizationView {
    pub fn project(session: &AuthorizationSession) -> Self {
        Self {
            generation: session.generation(),
            phase: session.phase(),
            device_code: session.device_code().cloned(),
            errors: session.errors().to_vec(),
            authorized: session.phase() == Phase::Authorized,
            outcome: session.outcome().cloned(),
        }
    }

    /// No poll is running; the view will not change until the next start.
    pub fn is_settled(&self) -> bool {
        !self.phase.is_polling()
    }

    /// Countdown for the code the user is asked to enter.
    pub fn expires_in_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.phase != Phase::AwaitingToken {
            return None;
        }
        self.device_code.as_ref().map(|code| code.remaining(now))
    }

    /// One-line status suitable for a badge or notification.
    pub fn summary(&self) -> String {
        match self.phase {
            Phase::AwaitingDeviceCode => "requesting a device code".to_string(),
            Phase::AwaitingToken => match &self.device_code {
                Some(code) => format!(
                    "enter code {} at {}",
                    code.code, code.verification_url
                ),
                None => "waiting for authorization".to_string(),
            },
            Phase::Authorized => "linked".to_string(),
            Phase::Failed if !self.errors.is_empty() => {
                let reasons: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
                format!("authorization failed: {}", reasons.join(", "))
            }
            Phase::Failed | Phase::Idle => match &self.outcome {
                Some(Outcome::AlreadyAuthorized) => "linked".to_string(),
                Some(outcome) if self.phase == Phase::Failed => {
                    format!("authorization failed: {outcome}")
                }
                Some(outcome) => outcome.to_string(),
                None => "not linked".to_string(),
            },
        }
    }
}
