//! Host liveness derived from network interface state.
//!
//! On Linux every interface under `/sys/class/net` exposes an `operstate`
//! file. The host counts as online while at least one non-loopback
//! interface reports `up`. Only changes are forwarded to the engine.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use linkwatch::MonitorHandle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{LivenessConfig, LivenessMode};

pub const SYS_CLASS_NET: &str = "/sys/class/net";

/// Whether any non-loopback interface under `root` is up
pub async fn any_interface_up(root: &Path) -> io::Result<bool> {
    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name() == "lo" {
            continue;
        }
        match tokio::fs::read_to_string(entry.path().join("operstate")).await {
            Ok(state) if state.trim() == "up" => return Ok(true),
            Ok(_) => {}
            Err(e) => debug!(interface = ?entry.file_name(), "Unreadable operstate: {}", e),
        }
    }
    Ok(false)
}

pub struct LivenessWatcher {
    root: PathBuf,
    poll: Duration,
    mode: LivenessMode,
}

impl LivenessWatcher {
    pub fn new(config: &LivenessConfig) -> Self {
        Self {
            root: PathBuf::from(SYS_CLASS_NET),
            poll: Duration::from_secs(config.poll_seconds.max(1)),
            mode: config.mode,
        }
    }

    /// Read interfaces from another directory laid out like `/sys/class/net`
    #[cfg(test)]
    fn with_root(mut self, root: impl Into<PathBuf>, poll: Duration) -> Self {
        self.root = root.into();
        self.poll = poll;
        self
    }

    /// Liveness to start the engine with.
    ///
    /// Falls back to `always` when the interface directory is unavailable.
    pub async fn initial_state(&mut self) -> bool {
        if self.mode == LivenessMode::Always {
            return true;
        }
        match any_interface_up(&self.root).await {
            Ok(online) => online,
            Err(e) => {
                warn!(
                    root = %self.root.display(),
                    "Interface state unavailable, assuming always online: {}", e
                );
                self.mode = LivenessMode::Always;
                true
            }
        }
    }

    /// Poll until `shutdown` flips, reporting edges to the engine.
    ///
    /// Returns `None` in `always` mode since there is nothing to watch.
    pub fn spawn(
        self,
        handle: MonitorHandle,
        initially_online: bool,
        mut shutdown: watch::Receiver<bool>,
    ) -> Option<JoinHandle<()>> {
        if self.mode == LivenessMode::Always {
            info!("Liveness mode is always, host treated as online");
            return None;
        }

        info!(
            root = %self.root.display(),
            poll_ms = self.poll.as_millis() as u64,
            "Watching network interfaces"
        );
        Some(tokio::spawn(async move {
            let mut online = initially_online;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll) => {
                        let now_online = match any_interface_up(&self.root).await {
                            Ok(now_online) => now_online,
                            Err(e) => {
                                warn!("Failed to read interface state: {}", e);
                                continue;
                            }
                        };
                        if now_online == online {
                            continue;
                        }
                        online = now_online;
                        if handle.set_online(online).is_err() {
                            debug!("Engine stopped, liveness watcher exiting");
                            break;
                        }
                    }
                    _ = shutdown.changed() => {
                        debug!("Liveness watcher shutting down");
                        break;
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use linkwatch::{
        MemorySettings, Monitor, MonitorConfig, Probe, Reachability, Settings, TransportError,
    };

    use super::*;

    struct AlwaysUp;

    #[async_trait::async_trait]
    impl Reachability for AlwaysUp {
        async fn reach(&self) -> Result<(), TransportError> {
            Ok(())
        }

        fn target(&self) -> &str {
            "always-up"
        }
    }

    fn interface(root: &Path, name: &str, state: &str) {
        fs::create_dir_all(root.join(name)).unwrap();
        fs::write(root.join(name).join("operstate"), format!("{state}\n")).unwrap();
    }

    fn watcher(root: &Path) -> LivenessWatcher {
        LivenessWatcher::new(&LivenessConfig::default()).with_root(root, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_loopback_alone_is_offline() {
        let dir = tempfile::tempdir().unwrap();
        interface(dir.path(), "lo", "unknown");
        interface(dir.path(), "eth0", "down");
        assert!(!any_interface_up(dir.path()).await.unwrap());

        interface(dir.path(), "wlan0", "up");
        assert!(any_interface_up(dir.path()).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_root_falls_back_to_always() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = watcher(&dir.path().join("absent"));

        assert!(watcher.initial_state().await);
        assert_eq!(watcher.mode, LivenessMode::Always);
    }

    #[tokio::test]
    async fn test_edges_reach_the_engine() {
        let dir = tempfile::tempdir().unwrap();
        interface(dir.path(), "eth0", "down");

        let mut watcher = watcher(dir.path());
        let online = watcher.initial_state().await;
        assert!(!online);

        let settings = Arc::new(MemorySettings::new(Settings::default()));
        let monitor = Monitor::spawn(
            MonitorConfig::new(Probe::new(Arc::new(AlwaysUp)), settings).initially_online(online),
        );
        let handle = monitor.handle();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = watcher.spawn(handle.clone(), online, shutdown_rx).unwrap();

        interface(dir.path(), "eth0", "up");
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(handle.is_online());

        interface(dir.path(), "eth0", "down");
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!handle.is_online());

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        monitor.shutdown().await;
    }
}
