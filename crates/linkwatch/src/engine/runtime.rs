use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::scheduler::{Action, Input, Scheduler};
use super::{EngineView, MonitorConfig, Notification};
use crate::classifier::{classify, StabilityStatus};
use crate::history::SampleHistory;
use crate::measurement::Measurement;
use crate::metrics::calculate_metrics;
use crate::probe::{Probe, ProbeOutcome};
use crate::settings::SettingsProvider;
use crate::sink::{CheckIdGenerator, MeasurementRecord, MeasurementSink};
use crate::timer::{TimerHandle, TimerId, TimerIds, TimerSlot};
use crate::window::now_millis;

/// Requests arriving from a [`MonitorHandle`](super::MonitorHandle)
#[derive(Debug)]
pub(crate) enum Command {
    SetOnline(bool),
    CheckNow,
    ClearHistory,
    Shutdown,
}

/// Everything the runtime task reacts to
#[derive(Debug)]
pub(crate) enum Event {
    Command(Command),
    TimerFired(TimerId),
    ProbeDone { attempt: u64, outcome: ProbeOutcome, completed_at: i64 },
}

/// Sink work, applied in the order the runtime queued it
#[derive(Debug)]
enum SinkJob {
    Submit(MeasurementRecord),
    Clear,
}

struct InFlight {
    attempt: u64,
    task: JoinHandle<()>,
}

/// Single owner of all mutable engine state
pub(crate) struct Runtime {
    scheduler: Scheduler,
    history: SampleHistory,
    online: bool,
    status: StabilityStatus,

    probe: Probe,
    settings: Arc<dyn SettingsProvider>,
    sink_jobs: Option<mpsc::UnboundedSender<SinkJob>>,
    check_ids: CheckIdGenerator,

    timer_ids: TimerIds,
    periodic: TimerSlot,
    retry: TimerSlot,
    in_flight: Option<InFlight>,
    next_attempt: u64,

    events_tx: mpsc::UnboundedSender<Event>,
    view_tx: watch::Sender<EngineView>,
    notify_tx: broadcast::Sender<Notification>,
}

impl Runtime {
    pub(crate) fn new(
        config: MonitorConfig,
        events_tx: mpsc::UnboundedSender<Event>,
        view_tx: watch::Sender<EngineView>,
        notify_tx: broadcast::Sender<Notification>,
    ) -> Self {
        let mut history = SampleHistory::new();
        if !config.restored.is_empty() {
            info!(count = config.restored.len(), "Restoring measurement history");
        }
        for measurement in config.restored {
            history.append(measurement);
        }

        let sink_jobs = config.sink.map(|sink| spawn_sink_forwarder(sink, notify_tx.clone()));

        Self {
            scheduler: Scheduler::new(),
            history,
            online: false,
            status: StabilityStatus::Offline,
            probe: config.probe,
            settings: config.settings,
            sink_jobs,
            check_ids: config.check_ids,
            timer_ids: TimerIds::default(),
            periodic: TimerSlot::default(),
            retry: TimerSlot::default(),
            in_flight: None,
            next_attempt: 0,
            events_tx,
            view_tx,
            notify_tx,
        }
    }

    pub(crate) async fn run(mut self, mut events_rx: mpsc::UnboundedReceiver<Event>) {
        while let Some(event) = events_rx.recv().await {
            match event {
                Event::Command(Command::Shutdown) => break,
                Event::Command(command) => self.on_command(command),
                Event::TimerFired(id) => self.on_timer(id),
                Event::ProbeDone { attempt, outcome, completed_at } => {
                    self.on_probe_done(attempt, outcome, completed_at)
                }
            }
            self.publish();
        }

        self.cancel_all();
        self.publish();
        debug!("Monitor runtime exited");
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::SetOnline(online) => {
                if online != self.online {
                    info!(online, "Liveness changed");
                }
                self.online = online;
                let input = if online { Input::Online } else { Input::Offline };
                self.drive(input);
                self.refresh_status();
            }
            Command::CheckNow => self.drive(Input::Trigger),
            Command::ClearHistory => self.clear_history(),
            Command::Shutdown => {}
        }
    }

    fn on_timer(&mut self, id: TimerId) {
        if self.periodic.claim(id) {
            self.drive(Input::PeriodicTick);
        } else if self.retry.claim(id) {
            self.drive(Input::RetryDue);
        } else {
            debug!(?id, "Ignoring fire from a cancelled timer");
        }
    }

    fn on_probe_done(&mut self, attempt: u64, outcome: ProbeOutcome, completed_at: i64) {
        match &self.in_flight {
            Some(in_flight) if in_flight.attempt == attempt => self.in_flight = None,
            _ => {
                debug!(attempt, "Ignoring completion of a cancelled probe");
                return;
            }
        }

        let measurement = Measurement::from_outcome(completed_at, &outcome);
        self.history.append(measurement.clone());
        self.submit_to_sink(&measurement);
        let _ = self.notify_tx.send(Notification::MeasurementRecorded(measurement));

        self.drive(Input::ProbeFinished { success: outcome.is_success() });
        self.refresh_status();
    }

    /// Feed one input to the scheduler and carry out its actions
    fn drive(&mut self, input: Input) {
        let settings = self.settings.get();
        let before = self.scheduler.state();
        let actions = self.scheduler.handle(input, &settings);

        if before != self.scheduler.state() {
            debug!(?input, from = %before, to = %self.scheduler.state(), "Scheduler transition");
        }

        for action in actions {
            match action {
                Action::StartProbe { retry } => self.start_probe(retry, settings.timeout),
                Action::ArmPeriodic(delay) => {
                    let timer = self.schedule(delay);
                    self.periodic.arm(timer);
                }
                Action::ArmRetry(delay) => {
                    info!(
                        retry = self.scheduler.retry_count(),
                        max_retries = settings.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Check failed, scheduling retry"
                    );
                    let timer = self.schedule(delay);
                    self.retry.arm(timer);
                }
                Action::CancelPeriodic => self.periodic.cancel(),
                Action::CancelRetry => self.retry.cancel(),
                Action::AbortProbe => self.abort_probe(),
            }
        }
    }

    fn schedule(&self, delay: Duration) -> TimerHandle {
        let events = self.events_tx.clone();
        TimerHandle::schedule(self.timer_ids.next(), delay, move |id| {
            let _ = events.send(Event::TimerFired(id));
        })
    }

    fn start_probe(&mut self, retry: u32, timeout_ms: u64) {
        // The scheduler only starts a probe when none is in flight
        self.abort_probe();

        let attempt = self.next_attempt;
        self.next_attempt += 1;

        let probe = self.probe.clone();
        let events = self.events_tx.clone();
        debug!(attempt, retry, timeout_ms, "Starting probe");

        let task = tokio::spawn(async move {
            let outcome = probe.run(timeout_ms).await;
            let _ = events.send(Event::ProbeDone { attempt, outcome, completed_at: now_millis() });
        });
        self.in_flight = Some(InFlight { attempt, task });
    }

    fn abort_probe(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            debug!(attempt = in_flight.attempt, "Aborting in-flight probe");
            in_flight.task.abort();
        }
    }

    fn submit_to_sink(&self, measurement: &Measurement) {
        let Some(sink_jobs) = &self.sink_jobs else {
            return;
        };
        let record = MeasurementRecord::from_measurement(measurement, self.check_ids.next_id());
        if sink_jobs.send(SinkJob::Submit(record)).is_err() {
            warn!("Sink forwarder stopped, measurement not stored");
        }
    }

    fn clear_history(&mut self) {
        info!(dropped = self.history.len(), "Clearing measurement history");
        self.history.clear();
        self.refresh_status();

        if let Some(sink_jobs) = &self.sink_jobs {
            if sink_jobs.send(SinkJob::Clear).is_err() {
                warn!("Sink forwarder stopped, stored history not cleared");
            }
        }
    }

    fn refresh_status(&mut self) {
        let status = classify(&calculate_metrics(&self.history.all()), self.online);
        if status != self.status {
            info!(from = %self.status, to = %status, "Stability status changed");
            let _ =
                self.notify_tx.send(Notification::StatusChanged { from: self.status, to: status });
            self.status = status;
        }
    }

    fn cancel_all(&mut self) {
        self.periodic.cancel();
        self.retry.cancel();
        self.abort_probe();
    }

    pub(crate) fn publish(&self) {
        self.view_tx.send_replace(EngineView {
            history: Arc::new(self.history.clone()),
            online: self.online,
            state: self.scheduler.state(),
            retry_count: self.scheduler.retry_count(),
        });
    }
}

/// Feed sink jobs one at a time so a clear never overtakes an earlier submit.
///
/// Ends once the runtime drops its sender and the queue is drained.
fn spawn_sink_forwarder(
    sink: Arc<dyn MeasurementSink>,
    notify: broadcast::Sender<Notification>,
) -> mpsc::UnboundedSender<SinkJob> {
    let (jobs_tx, mut jobs_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(job) = jobs_rx.recv().await {
            match job {
                SinkJob::Submit(record) => {
                    if let Err(e) = sink.submit(&record).await {
                        warn!(check_id = record.check_id, "Failed to save measurement: {}", e);
                        let _ = notify.send(Notification::SinkFailed {
                            check_id: Some(record.check_id),
                            error: e.to_string(),
                        });
                    }
                }
                SinkJob::Clear => {
                    if let Err(e) = sink.clear().await {
                        warn!("Failed to clear stored history: {}", e);
                        let _ = notify
                            .send(Notification::SinkFailed { check_id: None, error: e.to_string() });
                    }
                }
            }
        }
        debug!("Sink forwarder exited");
    });

    jobs_tx
}
