/// Engine module - owns the monitoring state and drives the scheduler
///
/// A [`Monitor`] spawns a single runtime task that owns the sample history,
/// the scheduler state machine and the retry counter. Everything that wants
/// to change that state (liveness edges, timer fires, probe completions,
/// commands) sends an event to that task, so there is exactly one writer.
///
/// Readers go through a [`MonitorHandle`], which reads the latest published
/// snapshot and computes metrics and status on demand.
mod runtime;
pub mod scheduler;

pub use scheduler::{Action, Input, Scheduler, SchedulerState};

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::classifier::{classify, StabilityStatus};
use crate::error::EngineError;
use crate::history::SampleHistory;
use crate::measurement::Measurement;
use crate::metrics::{calculate_metrics, DerivedMetrics};
use crate::probe::Probe;
use crate::settings::SettingsProvider;
use crate::sink::{CheckIdGenerator, MeasurementSink};
use crate::window::{now_millis, TimeWindow};

use runtime::{Command, Event, Runtime};

/// Events published to subscribers
#[derive(Debug, Clone)]
pub enum Notification {
    /// A probe completed and its measurement was appended
    MeasurementRecorded(Measurement),
    /// The stability classification changed
    StatusChanged { from: StabilityStatus, to: StabilityStatus },
    /// The persistence sink rejected a write or clear
    SinkFailed { check_id: Option<u64>, error: String },
}

/// Everything needed to start a monitor
pub struct MonitorConfig {
    pub probe: Probe,
    pub settings: Arc<dyn SettingsProvider>,
    pub sink: Option<Arc<dyn MeasurementSink>>,
    /// Liveness at startup; later changes arrive via [`MonitorHandle::set_online`]
    pub initially_online: bool,
    pub check_ids: CheckIdGenerator,
    /// Measurements loaded from storage, oldest first
    pub restored: Vec<Measurement>,
}

impl MonitorConfig {
    pub fn new(probe: Probe, settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            probe,
            settings,
            sink: None,
            initially_online: true,
            check_ids: CheckIdGenerator::from_clock(),
            restored: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn MeasurementSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn initially_online(mut self, online: bool) -> Self {
        self.initially_online = online;
        self
    }

    pub fn with_check_ids(mut self, check_ids: CheckIdGenerator) -> Self {
        self.check_ids = check_ids;
        self
    }

    /// Seed the history; only the newest entries up to capacity are kept
    pub fn with_history(mut self, measurements: impl IntoIterator<Item = Measurement>) -> Self {
        self.restored = measurements.into_iter().collect();
        self
    }
}

/// Snapshot of engine state published after every change
#[derive(Debug, Clone)]
pub struct EngineView {
    pub history: Arc<SampleHistory>,
    pub online: bool,
    pub state: SchedulerState,
    pub retry_count: u32,
}

impl Default for EngineView {
    fn default() -> Self {
        Self {
            history: Arc::new(SampleHistory::new()),
            online: false,
            state: SchedulerState::Suspended,
            retry_count: 0,
        }
    }
}

/// Status, metrics and scheduler state computed from one snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Window the metrics cover; `None` means the whole history
    pub window: Option<TimeWindow>,
    pub status: StabilityStatus,
    pub metrics: DerivedMetrics,
    pub online: bool,
    pub scheduler_state: SchedulerState,
    pub retry_count: u32,
}

/// A running monitor engine
///
/// Dropping it without [`Monitor::shutdown`] still stops the engine; the
/// runtime just is not awaited.
pub struct Monitor {
    handle: MonitorHandle,
    task: Option<JoinHandle<()>>,
}

impl Monitor {
    /// Spawn the engine task on the current tokio runtime
    pub fn spawn(config: MonitorConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(EngineView::default());
        let (notify_tx, _) = broadcast::channel(64);

        let initially_online = config.initially_online;
        let runtime = Runtime::new(config, events_tx.clone(), view_tx, notify_tx.clone());
        runtime.publish();
        let task = tokio::spawn(runtime.run(events_rx));

        let handle = MonitorHandle { events: events_tx, view: view_rx, notify: notify_tx };
        if let Err(e) = handle.set_online(initially_online) {
            warn!("Failed to deliver initial liveness: {}", e);
        }

        info!(online = initially_online, "Monitor engine started");
        Self { handle, task: Some(task) }
    }

    pub fn handle(&self) -> MonitorHandle {
        self.handle.clone()
    }

    /// Cancel every timer and the in-flight probe, then wait for the engine
    pub async fn shutdown(mut self) {
        let _ = self.handle.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Monitor engine task ended abnormally: {}", e);
            }
        }
        info!("Monitor engine stopped");
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if self.task.is_some() {
            debug!("Monitor dropped without shutdown, stopping engine");
            let _ = self.handle.send(Command::Shutdown);
        }
    }
}

/// Cloneable read and command endpoint of a running monitor
#[derive(Clone)]
pub struct MonitorHandle {
    events: mpsc::UnboundedSender<Event>,
    view: watch::Receiver<EngineView>,
    notify: broadcast::Sender<Notification>,
}

impl MonitorHandle {
    fn snapshot(&self) -> EngineView {
        // Clone out of the borrow right away so the writer is never held up
        self.view.borrow().clone()
    }

    fn send(&self, command: Command) -> Result<(), EngineError> {
        self.events.send(Event::Command(command)).map_err(|_| EngineError::Stopped)
    }

    /// Consistent view of status and metrics, optionally limited to a window
    pub fn report(&self, window: Option<TimeWindow>) -> Report {
        let view = self.snapshot();
        let samples = match window {
            Some(window) => view.history.window_since(window.cutoff(now_millis())),
            None => view.history.all(),
        };
        let metrics = calculate_metrics(&samples);

        Report {
            window,
            status: classify(&metrics, view.online),
            metrics,
            online: view.online,
            scheduler_state: view.state,
            retry_count: view.retry_count,
        }
    }

    /// Current classification over the whole history
    pub fn current_status(&self) -> StabilityStatus {
        self.report(None).status
    }

    /// Metrics over the whole history
    pub fn current_metrics(&self) -> DerivedMetrics {
        self.report(None).metrics
    }

    /// Metrics over the measurements inside `window`
    pub fn metrics_in(&self, window: TimeWindow) -> DerivedMetrics {
        self.report(Some(window)).metrics
    }

    /// Status over the measurements inside `window`
    pub fn status_in(&self, window: TimeWindow) -> StabilityStatus {
        self.report(Some(window)).status
    }

    /// Measurements, oldest first, optionally limited to a window
    pub fn history(&self, window: Option<TimeWindow>) -> Vec<Measurement> {
        let history = self.snapshot().history;
        match window {
            Some(window) => history.window_since(window.cutoff(now_millis())),
            None => history.all(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.view.borrow().online
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.view.borrow().state
    }

    pub fn retry_count(&self) -> u32 {
        self.view.borrow().retry_count
    }

    /// Report a liveness edge
    pub fn set_online(&self, online: bool) -> Result<(), EngineError> {
        self.send(Command::SetOnline(online))
    }

    /// Request an immediate check; ignored while one is in flight
    pub fn check_now(&self) -> Result<(), EngineError> {
        self.send(Command::CheckNow)
    }

    /// Drop the in-memory history and clear the sink
    pub fn clear_history(&self) -> Result<(), EngineError> {
        self.send(Command::ClearHistory)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notify.subscribe()
    }

    /// Wait until the engine publishes a new snapshot
    pub async fn changed(&mut self) -> Result<(), EngineError> {
        self.view.changed().await.map_err(|_| EngineError::Stopped)
    }
}
