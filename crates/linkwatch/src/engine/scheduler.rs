//! Check scheduling state machine.
//!
//! [`Scheduler::handle`] is a pure transition function: it takes one input
//! and the current settings and returns the side effects the runtime must
//! carry out. It never touches timers or the network itself.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchedulerState {
    /// Online, waiting for the next periodic tick
    Idle,
    /// A probe is in flight
    Checking,
    /// A probe failed and a retry timer is armed
    RetryPending,
    /// Offline; no timers armed
    Suspended,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Checking => "checking",
            SchedulerState::RetryPending => "retry-pending",
            SchedulerState::Suspended => "suspended",
        };
        f.write_str(name)
    }
}

/// Events fed to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Liveness went online
    Online,
    /// Liveness went offline
    Offline,
    /// The periodic timer fired
    PeriodicTick,
    /// Someone asked for a check now
    Trigger,
    /// The retry timer fired
    RetryDue,
    /// The in-flight probe completed
    ProbeFinished { success: bool },
}

/// Side effects requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StartProbe { retry: u32 },
    ArmPeriodic(Duration),
    ArmRetry(Duration),
    CancelPeriodic,
    CancelRetry,
    AbortProbe,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    state: SchedulerState,
    retry_count: u32,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// A new scheduler starts suspended until it hears it is online
    pub fn new() -> Self {
        Self { state: SchedulerState::Suspended, retry_count: 0 }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn handle(&mut self, input: Input, settings: &Settings) -> Vec<Action> {
        use SchedulerState::*;

        match (self.state, input) {
            (Suspended, Input::Online) => {
                self.retry_count = 0;
                self.state = Checking;
                vec![
                    Action::CancelPeriodic,
                    Action::StartProbe { retry: 0 },
                    Action::ArmPeriodic(settings.interval_duration()),
                ]
            }
            // Liveness is edge-triggered; repeats are no-ops
            (_, Input::Online) | (Suspended, Input::Offline) => Vec::new(),

            (_, Input::Offline) => {
                self.retry_count = 0;
                self.state = Suspended;
                vec![Action::CancelPeriodic, Action::CancelRetry, Action::AbortProbe]
            }

            (Suspended, _) => Vec::new(),

            (Checking, Input::PeriodicTick) => {
                vec![Action::ArmPeriodic(settings.interval_duration())]
            }
            (Checking, Input::Trigger) => Vec::new(),

            (Idle | RetryPending, Input::PeriodicTick) => {
                let mut actions = self.start_fresh_check();
                actions.push(Action::ArmPeriodic(settings.interval_duration()));
                actions
            }
            (Idle | RetryPending, Input::Trigger) => self.start_fresh_check(),

            (RetryPending, Input::RetryDue) => {
                self.state = Checking;
                vec![Action::StartProbe { retry: self.retry_count }]
            }

            (Checking, Input::ProbeFinished { success }) => {
                if !success && self.retry_count < settings.max_retries {
                    let delay = settings.backoff_delay(self.retry_count);
                    self.retry_count += 1;
                    self.state = RetryPending;
                    vec![Action::ArmRetry(delay)]
                } else {
                    self.retry_count = 0;
                    self.state = Idle;
                    Vec::new()
                }
            }

            // Stale retry fire or completion
            (Idle | Checking, Input::RetryDue)
            | (Idle | RetryPending, Input::ProbeFinished { .. }) => Vec::new(),
        }
    }

    fn start_fresh_check(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.state == SchedulerState::RetryPending {
            actions.push(Action::CancelRetry);
        }
        self.retry_count = 0;
        self.state = SchedulerState::Checking;
        actions.push(Action::StartProbe { retry: 0 });
        actions
    }
}
