//! Cancellable one-shot timers.
//!
//! A [`TimerHandle`] owns the task that waits out the delay. Cancelling aborts
//! that task and may be repeated freely. Because an abort can race with a
//! fire that is already queued, every timer carries a [`TimerId`] and a
//! [`TimerSlot`] only accepts fires for the id it currently holds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Identity of one armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Hands out unique timer ids for one engine
#[derive(Debug, Default)]
pub struct TimerIds {
    next: AtomicU64,
}

impl TimerIds {
    pub fn next(&self) -> TimerId {
        TimerId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Running one-shot timer
#[derive(Debug)]
pub struct TimerHandle {
    id: TimerId,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Call `on_fire` with the timer id once `delay` has elapsed
    pub fn schedule<F>(id: TimerId, delay: Duration, on_fire: F) -> Self
    where
        F: FnOnce(TimerId) + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(id);
        });
        Self { id, task }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Stop the timer; calling it again or after the timer fired is a no-op
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Holds at most one armed timer of a given role
#[derive(Debug, Default)]
pub struct TimerSlot {
    current: Option<TimerHandle>,
}

impl TimerSlot {
    /// Replace whatever is armed with `timer`
    pub fn arm(&mut self, timer: TimerHandle) {
        self.cancel();
        self.current = Some(timer);
    }

    pub fn cancel(&mut self) {
        if let Some(timer) = self.current.take() {
            timer.cancel();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.current.is_some()
    }

    /// Accept a fire for `id`, disarming the slot; stale ids are rejected
    pub fn claim(&mut self, id: TimerId) -> bool {
        match &self.current {
            Some(timer) if timer.id() == id => {
                self.current = None;
                true
            }
            _ => false,
        }
    }
}
