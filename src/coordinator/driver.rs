//! Runs an [`AuthorizationSession`] against a backend with real timers.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::session::{AuthorizationSession, Phase, TimerId, TimerKind, Transition};
use super::timers::{spawn_once, spawn_repeating, TimerArena};
use super::view::AuthorizationView;
use crate::auth::{AuthBackend, HttpBackend, StartResponse, Token};
use crate::config::{LinkConfig, Timing};
use crate::error::LinkError;

/// Result of one [`Coordinator::start`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The backend is already linked; no polling was started.
    AlreadyAuthorized,
    /// The device-code wait is running.
    Started,
    /// The backend could not start the flow. Nothing is retried.
    Failed { reason: String },
    /// A later `start` or a `cancel` replaced this one before the backend
    /// answered.
    Superseded,
}

/// Device authorization polling coordinator.
///
/// Owns exactly one [`AuthorizationSession`] and every timer task that
/// session arms. Timer tasks hold only a weak reference back; each one checks
/// that its [`TimerId`] is still armed before touching the session, so a
/// response that outlives its poll is dropped instead of applied.
///
/// # Example
/// ```no_run
/// use devicelink::config::LinkConfig;
/// use devicelink::coordinator::{Coordinator, StartOutcome};
///
/// # async fn example() -> Result<(), devicelink::error::LinkError> {
/// let coordinator = Coordinator::from_config(&LinkConfig::from_env()?)?;
/// if coordinator.start().await == StartOutcome::Started {
///     let view = coordinator.wait_until_settled().await;
///     println!("{}", view.summary());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Coordinator {
    shared: Arc<Shared>,
}

struct Shared {
    backend: Arc<dyn AuthBackend>,
    timing: Timing,
    state: Mutex<State>,
    view_tx: watch::Sender<AuthorizationView>,
}

struct State {
    session: AuthorizationSession,
    arena: TimerArena,
}

impl Coordinator {
    pub fn new(backend: Arc<dyn AuthBackend>, timing: Timing) -> Self {
        let session = AuthorizationSession::new();
        let (view_tx, _) = watch::channel(AuthorizationView::project(&session));
        Self {
            shared: Arc::new(Shared {
                backend,
                timing,
                state: Mutex::new(State {
                    session,
                    arena: TimerArena::new(),
                }),
                view_tx,
            }),
        }
    }

    /// Build a coordinator polling the HTTP backend described by `config`.
    pub fn from_config(config: &LinkConfig) -> Result<Self, LinkError> {
        let backend = HttpBackend::new(config)?;
        Ok(Self::new(Arc::new(backend), config.timing.clone()))
    }

    /// Start a new authorization flow, superseding any flow still running.
    ///
    /// Every timer of the previous flow is cancelled before the backend is
    /// contacted. Failures are reported in the returned outcome and in the
    /// view; they are never raised.
    pub async fn start(&self) -> StartOutcome {
        let generation = {
            let mut state = self.shared.state.lock().await;
            let disarmed = state.session.supersede();
            if !disarmed.is_empty() {
                debug!(
                    cancelled = disarmed.len(),
                    "superseding running authorization flow"
                );
            }
            state.arena.cancel_all(disarmed);
            self.shared.publish(&state.session);
            state.session.generation()
        };
        info!(generation, "starting device authorization");

        let response = self.shared.backend.start_authorization().await;

        let mut state = self.shared.state.lock().await;
        if state.session.generation() != generation {
            debug!(generation, "discarding start response for a superseded flow");
            return StartOutcome::Superseded;
        }

        let outcome = match response {
            Ok(StartResponse::AlreadyAuthorized) => {
                info!(generation, "backend is already authorized");
                state.session.mark_already_authorized();
                StartOutcome::AlreadyAuthorized
            }
            Ok(StartResponse::FlowStarted) => match state.session.begin_device_code_wait() {
                Ok(transition) => {
                    self.shared.apply(&mut state, transition);
                    StartOutcome::Started
                }
                Err(err) => {
                    let reason = LinkError::InvalidState(err.to_string()).to_string();
                    warn!(generation, error = %reason, "could not begin device code wait");
                    state.session.fail_initiation(reason.clone());
                    StartOutcome::Failed { reason }
                }
            },
            Err(err) => {
                warn!(generation, error = %err, "backend refused to start authorization");
                state.session.fail_initiation(err.to_string());
                StartOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        };
        self.shared.publish(&state.session);
        outcome
    }

    /// Stop the running flow, if any, and cancel all of its timers.
    ///
    /// A `start` still waiting on the backend returns
    /// [`StartOutcome::Superseded`] and arms nothing.
    pub async fn cancel(&self) {
        let mut state = self.shared.state.lock().await;
        let disarmed = state.session.cancel();
        state.arena.cancel_all(disarmed);
        self.shared.publish(&state.session);
    }

    /// Current read model.
    pub fn view(&self) -> AuthorizationView {
        self.shared.view_tx.borrow().clone()
    }

    /// Subscribe to read-model changes.
    pub fn watch_view(&self) -> watch::Receiver<AuthorizationView> {
        self.shared.view_tx.subscribe()
    }

    /// Wait until no poll is running and return the settled view.
    ///
    /// Returns immediately when nothing is running.
    pub async fn wait_until_settled(&self) -> AuthorizationView {
        let mut rx = self.shared.view_tx.subscribe();
        if let Ok(view) = rx.wait_for(AuthorizationView::is_settled).await {
            return (*view).clone();
        }
        self.view()
    }

    /// Access token of the current session, once authorized.
    pub async fn token(&self) -> Option<Token> {
        self.shared.state.lock().await.session.token().cloned()
    }

    /// Timer tasks currently owned by the session.
    pub async fn scheduled_timers(&self) -> Vec<TimerId> {
        self.shared.state.lock().await.arena.ids()
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        // Timer tasks exit on their own once they fail to upgrade; aborting
        // here only makes it prompt.
        if let Ok(mut state) = self.shared.state.try_lock() {
            state.arena.abort_everything();
        }
    }
}

impl Shared {
    fn publish(&self, session: &AuthorizationSession) {
        self.view_tx.send_replace(AuthorizationView::project(session));
    }

    async fn is_armed(&self, id: TimerId) -> bool {
        self.state.lock().await.session.is_armed(id)
    }

    fn apply(self: &Arc<Self>, state: &mut State, transition: Transition) {
        state.arena.cancel_all(transition.disarmed);
        for id in transition.armed {
            let handle = self.spawn_timer(&state.session, id);
            state.arena.insert(id, handle);
        }
    }

    fn spawn_timer(self: &Arc<Self>, session: &AuthorizationSession, id: TimerId) -> AbortHandle {
        let weak = Arc::downgrade(self);
        debug!(timer = %id, "arming timer");
        match id.kind() {
            TimerKind::DeviceCodePoll => {
                spawn_repeating(self.timing.device_code_interval(), move || {
                    let weak = weak.clone();
                    async move {
                        match weak.upgrade() {
                            Some(shared) => shared.poll_device_code(id).await,
                            None => false,
                        }
                    }
                })
            }
            TimerKind::TokenPoll => spawn_repeating(self.timing.token_interval(), move || {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(shared) => shared.poll_token(id).await,
                        None => false,
                    }
                }
            }),
            TimerKind::DeviceCodeCeiling | TimerKind::TokenDeadline => {
                let wait = match id.kind() {
                    TimerKind::TokenDeadline => session
                        .device_code()
                        .map(|code| code.expires_in())
                        .unwrap_or_default(),
                    _ => self.timing.device_code_ceiling(),
                };
                let now = Instant::now();
                let deadline = now.checked_add(wait).unwrap_or(now);
                spawn_once(deadline, move || async move {
                    if let Some(shared) = weak.upgrade() {
                        shared.fire_deadline(id).await;
                    }
                })
            }
        }
    }

    /// One device-code poll tick. Returns whether polling should continue.
    async fn poll_device_code(self: &Arc<Self>, id: TimerId) -> bool {
        if !self.is_armed(id).await {
            return false;
        }
        let response = self.backend.device_code().await;

        let mut state = self.state.lock().await;
        if !state.session.is_armed(id) {
            debug!(timer = %id, "discarding device code response for a cancelled poll");
            return false;
        }
        let code = match response {
            Ok(response) => response.into_device_code(Utc::now()),
            Err(err) => {
                debug!(timer = %id, error = %err, transient = err.is_transient(), "device code poll failed");
                return true;
            }
        };
        let Some(code) = code else {
            return true;
        };

        match state.session.record_device_code(id, code) {
            Ok(transition) => {
                info!(
                    generation = id.generation(),
                    expires_in_secs = state.session.device_code().map(|c| c.expires_in_secs),
                    "device code issued; waiting for user authorization"
                );
                self.apply(&mut state, transition);
                self.publish(&state.session);
                false
            }
            Err(err) => {
                debug!(timer = %id, error = %err, "device code not recorded");
                false
            }
        }
    }

    /// One token poll tick. Returns whether polling should continue.
    async fn poll_token(self: &Arc<Self>, id: TimerId) -> bool {
        if !self.is_armed(id).await {
            return false;
        }
        let (token, errors) = tokio::join!(self.backend.token(), self.backend.errors());

        let mut state = self.state.lock().await;
        if !state.session.is_armed(id) {
            debug!(timer = %id, "discarding token response for a cancelled poll");
            return false;
        }
        let token = match token {
            Ok(response) => response.into_token(Utc::now()),
            Err(err) => {
                debug!(timer = %id, error = %err, transient = err.is_transient(), "token poll failed");
                None
            }
        };
        let errors = match errors {
            Ok(errors) => errors,
            Err(err) => {
                debug!(timer = %id, error = %err, transient = err.is_transient(), "error list poll failed");
                Vec::new()
            }
        };

        match state.session.apply_token_poll(id, token, errors) {
            Ok(transition) if transition.disarmed.is_empty() => true,
            Ok(transition) => {
                if state.session.phase() == Phase::Authorized {
                    info!(generation = id.generation(), "device authorization complete");
                } else {
                    warn!(
                        generation = id.generation(),
                        errors = ?state.session.errors(),
                        "device authorization rejected"
                    );
                }
                self.apply(&mut state, transition);
                self.publish(&state.session);
                false
            }
            Err(err) => {
                debug!(timer = %id, error = %err, "token poll result not applied");
                false
            }
        }
    }

    async fn fire_deadline(self: &Arc<Self>, id: TimerId) {
        let mut state = self.state.lock().await;
        let result = match id.kind() {
            TimerKind::DeviceCodeCeiling => state.session.expire_device_code_wait(id),
            TimerKind::TokenDeadline => state.session.expire_token_wait(id),
            TimerKind::DeviceCodePoll | TimerKind::TokenPoll => return,
        };
        match result {
            Ok(transition) => {
                info!(
                    generation = id.generation(),
                    timer = %id,
                    "authorization wait timed out"
                );
                self.apply(&mut state, transition);
                self.publish(&state.session);
            }
            Err(err) => debug!(timer = %id, error = %err, "deadline ignored"),
        }
    }
}
