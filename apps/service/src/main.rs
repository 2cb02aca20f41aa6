use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use linkwatch::{
    HISTORY_CAPACITY, HttpReachability, MeasurementSink, Monitor, MonitorConfig, Notification,
    Probe, Reachability, SettingField, Settings, SettingsProvider, TcpReachability,
};
use logger::init_tracing;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

mod config;
mod http;
mod liveness;
mod settings_store;
mod sink;

use config::{Config, ProbeKind};
use liveness::LivenessWatcher;
use settings_store::FileSettingsStore;
use sink::JsonlSink;

#[derive(Parser)]
#[command(
    name = "linkwatch",
    about = "Connectivity monitor: probes reachability and classifies link stability",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/linkwatch/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start monitoring until Ctrl-C
    Run {
        /// Do not serve the HTTP read API
        #[arg(long)]
        no_http: bool,
    },
    /// Inspect or change the monitoring settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Print the current configuration
    Config,
    /// Remove every stored measurement record
    ClearHistory,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the effective settings
    Show,
    /// Set one field; out-of-range values are clamped
    Set {
        /// interval, timeout, max_retries, backoff_base_delay or backoff_multiplier
        field: SettingField,
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },
    /// Restore the defaults
    Reset,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config_path = config::resolve_path(cli.config.as_ref())?;
    let config = Config::from_config(Some(&config_path))
        .with_context(|| format!("loading {}", config_path.display()))?;

    match cli.command {
        Commands::Run { no_http } => run(config, &config_path, no_http).await,
        Commands::Settings { action } => {
            settings_command(action, FileSettingsStore::new(&config_path, config));
            Ok(())
        }
        Commands::Config => {
            println!("{config}");
            println!("Loaded from {}", config_path.display());
            Ok(())
        }
        Commands::ClearHistory => clear_history(&config).await,
    }
}

async fn run(config: Config, config_path: &Path, no_http: bool) -> anyhow::Result<()> {
    let transport: Arc<dyn Reachability> = match config.probe.kind {
        ProbeKind::Http => Arc::new(HttpReachability::new(&config.probe.target)?),
        ProbeKind::Tcp => Arc::new(TcpReachability::new(&config.probe.target)?),
    };
    let settings = Arc::new(FileSettingsStore::new(config_path, config.clone()));

    let mut watcher = LivenessWatcher::new(&config.liveness);
    let online = watcher.initial_state().await;

    let mut monitor_config =
        MonitorConfig::new(Probe::new(transport), settings).initially_online(online);
    if let Some(path) = &config.sink.path {
        let sink = Arc::new(JsonlSink::new(path));
        match sink.load_recent(HISTORY_CAPACITY).await {
            Ok(restored) => monitor_config = monitor_config.with_history(restored),
            Err(e) => warn!(path = %sink.path().display(), "Failed to restore history: {}", e),
        }
        info!(path = %sink.path().display(), "Recording measurements");
        monitor_config = monitor_config.with_sink(sink);
    }

    let monitor = Monitor::spawn(monitor_config);
    let notifications = tokio::spawn(log_measurements(monitor.handle().subscribe()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watcher_task = watcher.spawn(monitor.handle(), online, shutdown_rx);

    let server = if config.http.enabled && !no_http {
        let ip: IpAddr = config
            .http
            .bind
            .parse()
            .with_context(|| format!("invalid bind address {}", config.http.bind))?;
        let server = http::bind(SocketAddr::new(ip, config.http.port), monitor.handle())?;
        let server_handle = server.handle();
        actix_web::rt::spawn(server);
        Some(server_handle)
    } else {
        None
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    let _ = shutdown_tx.send(true);
    if let Some(server) = server {
        server.stop(true).await;
    }
    if let Some(task) = watcher_task {
        let _ = task.await;
    }
    monitor.shutdown().await;
    notifications.abort();

    Ok(())
}

async fn log_measurements(mut notifications: broadcast::Receiver<Notification>) {
    loop {
        match notifications.recv().await {
            Ok(Notification::MeasurementRecorded(m)) => info!(
                success = m.success,
                latency_ms = m.latency,
                error = m.error_category.map(|c| c.as_str()),
                "Check completed"
            ),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Measurement log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn settings_command(action: SettingsAction, store: FileSettingsStore) {
    match action {
        SettingsAction::Show => print_settings(&store.get()),
        SettingsAction::Set { field, value } => {
            let effective = store.set(field, value);
            println!("{field} = {effective}");
        }
        SettingsAction::Reset => {
            let defaults = store.reset();
            println!("Settings reset to defaults");
            print_settings(&defaults);
        }
    }
}

fn print_settings(settings: &Settings) {
    for field in SettingField::ALL {
        println!("{field} = {}", settings.get(field));
    }
}

async fn clear_history(config: &Config) -> anyhow::Result<()> {
    match &config.sink.path {
        Some(path) => {
            JsonlSink::new(path).clear().await?;
            println!("Cleared {}", path.display());
        }
        None => println!("No sink configured, nothing to clear"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_set_accepts_negative_values() {
        let cli =
            Cli::try_parse_from(["linkwatch", "settings", "set", "max-retries", "-1"]).unwrap();
        match cli.command {
            Commands::Settings { action: SettingsAction::Set { field, value } } => {
                assert_eq!(field, SettingField::MaxRetries);
                assert_eq!(value, -1.0);
            }
            _ => panic!("expected settings set"),
        }
    }

    #[test]
    fn test_unknown_setting_is_rejected() {
        assert!(Cli::try_parse_from(["linkwatch", "settings", "set", "jitter", "3"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["linkwatch", "run", "--no-http", "--config", "/tmp/lw"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/lw")));
        assert!(matches!(cli.command, Commands::Run { no_http: true }));
    }
}
