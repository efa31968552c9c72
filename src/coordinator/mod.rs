//! Device authorization polling: session state machine, timers, read model,
//! and the coordinator that drives them.

pub mod driver;
pub mod session;
pub mod timers;
pub mod view;

pub use driver::{Coordinator, StartOutcome};
pub use session::{
    AuthorizationSession, Outcome, Phase, SessionError, TimeoutStage, TimerId, TimerKind,
    Transition,
};
pub use timers::TimerArena;
pub use view::AuthorizationView;
