//! Owned, cancellable timer tasks.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::session::TimerId;

/// Running timer tasks of the current session, keyed by the id the session
/// armed them under.
///
/// Cancelling is idempotent: unknown or already finished ids are ignored.
#[derive(Debug, Default)]
pub struct TimerArena {
    handles: HashMap<TimerId, AbortHandle>,
}

impl TimerArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: TimerId, handle: AbortHandle) {
        if let Some(previous) = self.handles.insert(id, handle) {
            previous.abort();
        }
    }

    /// Abort the task behind `id`. Returns whether a task was tracked.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.handles.remove(&id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self, ids: impl IntoIterator<Item = TimerId>) {
        for id in ids {
            self.cancel(id);
        }
    }

    pub fn abort_everything(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }

    pub fn ids(&self) -> Vec<TimerId> {
        let mut ids: Vec<TimerId> = self.handles.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Spawn a task calling `tick` every `period`, first after one full period.
///
/// The loop ends when `tick` returns `false`. Ticks never overlap: a slow
/// tick delays the next one instead of bursting.
pub fn spawn_repeating<F, Fut>(period: Duration, mut tick: F) -> AbortHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    let handle = tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !tick().await {
                break;
            }
        }
    });
    handle.abort_handle()
}

/// Spawn a task running `fire` once at `deadline`.
pub fn spawn_once<F, Fut>(deadline: Instant, fire: F) -> AbortHandle
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let handle = tokio::spawn(async move {
        time::sleep_until(deadline).await;
        fire().await;
    });
    handle.abort_handle()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::session::AuthorizationSession;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn two_ids() -> (TimerId, TimerId) {
        let mut session = AuthorizationSession::new();
        let transition = session.begin_device_code_wait().unwrap();
        (transition.armed[0], transition.armed[1])
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_timer_ticks_until_told_to_stop() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        spawn_repeating(Duration::from_secs(2), move || {
            let counter = counter.clone();
            async move { counter.fetch_add(1, Ordering::SeqCst) + 1 < 3 }
        });

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (id, _) = two_ids();
        let fired = Arc::new(AtomicUsize::new(0));
        let flag = fired.clone();
        let mut arena = TimerArena::new();
        arena.insert(
            id,
            spawn_once(Instant::now() + Duration::from_secs(5), move || async move {
                flag.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(arena.cancel(id));
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(arena.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let (first, second) = two_ids();
        let mut arena = TimerArena::new();
        arena.insert(
            first,
            spawn_once(Instant::now(), || async {}),
        );
        time::sleep(Duration::from_millis(10)).await;

        assert!(arena.cancel(first));
        assert!(!arena.cancel(first));
        assert!(!arena.cancel(second));
        arena.cancel_all([first, second]);
        assert_eq!(arena.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_everything_clears_arena() {
        let (first, second) = two_ids();
        let mut arena = TimerArena::new();
        for id in [first, second] {
            arena.insert(id, spawn_repeating(Duration::from_secs(1), || async { true }));
        }
        assert_eq!(arena.ids(), {
            let mut ids = vec![first, second];
            ids.sort();
            ids
        });
        arena.abort_everything();
        assert!(arena.is_empty());
    }
}
