//! The authorization session state machine.
//!
//! `AuthorizationSession` is pure bookkeeping: it never sleeps or performs
//! I/O. Every mutation goes through a transition function that names the
//! timer it was triggered by; a transition requested by a timer that is no
//! longer armed is rejected with [`SessionError::StaleTimer`] and leaves the
//! session untouched. Transitions report which timers they disarmed and
//! armed so the driver can abort and spawn the matching tasks.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use strum::Display;
use thiserror::Error;

use crate::auth::{DeviceCode, FlowError, Token};

/// Where a session is in the device flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    AwaitingDeviceCode,
    AwaitingToken,
    Authorized,
    Failed,
}

impl Phase {
    /// Whether timers may be armed in this phase.
    pub fn is_polling(self) -> bool {
        matches!(self, Self::AwaitingDeviceCode | Self::AwaitingToken)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Authorized | Self::Failed)
    }

    fn can_advance_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::AwaitingDeviceCode)
                | (Self::AwaitingDeviceCode, Self::AwaitingToken)
                | (Self::AwaitingToken, Self::Authorized)
                | (Self::AwaitingToken, Self::Failed)
        )
    }
}

/// The four scheduled activities a session can own.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimerKind {
    DeviceCodePoll,
    DeviceCodeCeiling,
    TokenPoll,
    TokenDeadline,
}

/// Identity of one armed timer.
///
/// Ids are never reused: `seq` grows for the lifetime of the session value,
/// across generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId {
    generation: u64,
    seq: u64,
    kind: TimerKind,
}

impl TimerId {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}.{}", self.kind, self.generation, self.seq)
    }
}

/// Which wait ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimeoutStage {
    DeviceCode,
    Token,
}

/// Why the most recent session stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// The backend already held an authorization; no flow was started.
    AlreadyAuthorized,
    /// The backend refused or failed to start the flow.
    InitiationFailed { reason: String },
    Authorized,
    /// The backend reported flow errors; see the session's `errors`.
    Rejected,
    TimedOut { stage: TimeoutStage },
    Cancelled,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyAuthorized => f.write_str("already authorized"),
            Self::InitiationFailed { reason } => write!(f, "could not start authorization: {reason}"),
            Self::Authorized => f.write_str("authorized"),
            Self::Rejected => f.write_str("rejected by provider"),
            Self::TimedOut {
                stage: TimeoutStage::DeviceCode,
            } => f.write_str("timed out waiting for a device code"),
            Self::TimedOut {
                stage: TimeoutStage::Token,
            } => f.write_str("device code expired before authorization completed"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("illegal phase transition {from} -> {to}")]
    IllegalTransition { from: Phase, to: Phase },
    #[error("timer {0} is no longer armed")]
    StaleTimer(TimerId),
}

/// Timers a transition disarmed and armed, in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    pub disarmed: Vec<TimerId>,
    pub armed: Vec<TimerId>,
}

/// Mutable state of one run of the device flow.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationSession {
    generation: u64,
    phase: Phase,
    device_code: Option<DeviceCode>,
    token: Option<Token>,
    errors: Vec<FlowError>,
    outcome: Option<Outcome>,
    timers: BTreeMap<TimerKind, TimerId>,
    next_seq: u64,
    initiating: bool,
}

impl AuthorizationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn device_code(&self) -> Option<&DeviceCode> {
        self.device_code.as_ref()
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn errors(&self) -> &[FlowError] {
        &self.errors
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.timers.get(&id.kind) == Some(&id)
    }

    /// A start request for this generation is still waiting on the backend.
    pub fn is_initiating(&self) -> bool {
        self.initiating
    }

    pub fn armed_timers(&self) -> Vec<TimerId> {
        self.timers.values().copied().collect()
    }

    /// End whatever is running and open a fresh, idle generation.
    ///
    /// Returns every timer the previous generation still had armed.
    pub fn supersede(&mut self) -> Vec<TimerId> {
        let disarmed = self.disarm_all();
        self.generation += 1;
        self.phase = Phase::Idle;
        self.device_code = None;
        self.token = None;
        self.errors.clear();
        self.outcome = None;
        self.initiating = true;
        disarmed
    }

    pub fn mark_already_authorized(&mut self) {
        self.initiating = false;
        self.outcome = Some(Outcome::AlreadyAuthorized);
    }

    pub fn fail_initiation(&mut self, reason: impl Into<String>) {
        self.initiating = false;
        self.outcome = Some(Outcome::InitiationFailed {
            reason: reason.into(),
        });
    }

    /// `Idle -> AwaitingDeviceCode`, arming the device-code poll and its ceiling.
    pub fn begin_device_code_wait(&mut self) -> Result<Transition, SessionError> {
        self.advance(Phase::AwaitingDeviceCode)?;
        self.initiating = false;
        let armed = vec![
            self.arm(TimerKind::DeviceCodePoll),
            self.arm(TimerKind::DeviceCodeCeiling),
        ];
        Ok(Transition {
            disarmed: Vec::new(),
            armed,
        })
    }

    /// `AwaitingDeviceCode -> AwaitingToken` once the poll obtained a code.
    pub fn record_device_code(
        &mut self,
        by: TimerId,
        code: DeviceCode,
    ) -> Result<Transition, SessionError> {
        self.require(by, TimerKind::DeviceCodePoll)?;
        self.advance(Phase::AwaitingToken)?;
        let disarmed = self.disarm_all();
        self.device_code = Some(code);
        let armed = vec![
            self.arm(TimerKind::TokenPoll),
            self.arm(TimerKind::TokenDeadline),
        ];
        Ok(Transition { disarmed, armed })
    }

    /// The device-code ceiling fired first: stop polling and fall back to idle.
    pub fn expire_device_code_wait(&mut self, by: TimerId) -> Result<Transition, SessionError> {
        self.require(by, TimerKind::DeviceCodeCeiling)?;
        let disarmed = self.disarm_all();
        self.phase = Phase::Idle;
        self.outcome = Some(Outcome::TimedOut {
            stage: TimeoutStage::DeviceCode,
        });
        Ok(Transition {
            disarmed,
            armed: Vec::new(),
        })
    }

    /// Apply one token-poll result.
    ///
    /// Errors win over a token. With neither, the session keeps polling and
    /// the returned transition is empty.
    pub fn apply_token_poll(
        &mut self,
        by: TimerId,
        token: Option<Token>,
        errors: Vec<FlowError>,
    ) -> Result<Transition, SessionError> {
        self.require(by, TimerKind::TokenPoll)?;
        if !errors.is_empty() {
            self.advance(Phase::Failed)?;
            self.errors = errors;
            self.outcome = Some(Outcome::Rejected);
            return Ok(Transition {
                disarmed: self.disarm_all(),
                armed: Vec::new(),
            });
        }
        match token.filter(|t| !t.access_token.is_empty()) {
            Some(token) => {
                self.advance(Phase::Authorized)?;
                self.token = Some(token);
                self.outcome = Some(Outcome::Authorized);
                Ok(Transition {
                    disarmed: self.disarm_all(),
                    armed: Vec::new(),
                })
            }
            None => Ok(Transition::default()),
        }
    }

    /// The device code expired before a token arrived.
    pub fn expire_token_wait(&mut self, by: TimerId) -> Result<Transition, SessionError> {
        self.require(by, TimerKind::TokenDeadline)?;
        self.advance(Phase::Failed)?;
        self.outcome = Some(Outcome::TimedOut {
            stage: TimeoutStage::Token,
        });
        Ok(Transition {
            disarmed: self.disarm_all(),
            armed: Vec::new(),
        })
    }

    /// Stop a running flow without a new one replacing it.
    ///
    /// A polling or initiating session moves to a fresh idle generation, so a
    /// start response still in flight no longer matches. Settled sessions keep
    /// their phase and outcome.
    pub fn cancel(&mut self) -> Vec<TimerId> {
        let disarmed = self.disarm_all();
        if self.phase.is_polling() || self.initiating {
            self.generation += 1;
            self.initiating = false;
            self.phase = Phase::Idle;
            self.device_code = None;
            self.outcome = Some(Outcome::Cancelled);
        }
        disarmed
    }

    fn require(&self, by: TimerId, kind: TimerKind) -> Result<(), SessionError> {
        if by.kind == kind && self.is_armed(by) {
            Ok(())
        } else {
            Err(SessionError::StaleTimer(by))
        }
    }

    fn advance(&mut self, next: Phase) -> Result<(), SessionError> {
        if !self.phase.can_advance_to(next) {
            return Err(SessionError::IllegalTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    fn arm(&mut self, kind: TimerKind) -> TimerId {
        self.next_seq += 1;
        let id = TimerId {
            generation: self.generation,
            seq: self.next_seq,
            kind,
        };
        self.timers.insert(kind, id);
        id
    }

    fn disarm_all(&mut self) -> Vec<TimerId> {
        std::mem::take(&mut self.timers).into_values().collect()
    }
}
