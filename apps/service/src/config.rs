use std::{env, fmt, fs, path};

use linkwatch::{DEFAULT_PROBE_TARGET, Settings};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config {}: {source}", path.display())]
    ReadFailed { path: path::PathBuf, source: std::io::Error },
    #[error("failed to write config {}: {source}", path.display())]
    WriteFailed { path: path::PathBuf, source: std::io::Error },
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config directory available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub settings: Settings,
    pub probe: ProbeConfig,
    pub liveness: LivenessConfig,
    pub sink: SinkConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    Http,
    Tcp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub kind: ProbeKind,
    /// URL for `http`, `host:port` for `tcp`
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LivenessMode {
    /// Watch the host's network interfaces
    Interfaces,
    /// Treat the host as permanently online
    Always,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub mode: LivenessMode,
    pub poll_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// JSON-lines file receiving every measurement; disabled when unset
    pub path: Option<path::PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { kind: ProbeKind::Http, target: DEFAULT_PROBE_TARGET.into() }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self { mode: LivenessMode::Interfaces, poll_seconds: 2 }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { enabled: true, bind: "127.0.0.1".into(), port: 7878 }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeKind::Http => write!(f, "http"),
            ProbeKind::Tcp => write!(f, "tcp"),
        }
    }
}

impl fmt::Display for LivenessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LivenessMode::Interfaces => write!(f, "interfaces"),
            LivenessMode::Always => write!(f, "always"),
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/linkwatch/config.toml or
/// $HOME/.config/...)
pub fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("linkwatch/config.toml"))
}

/// Resolve the path a config would be loaded from
pub fn resolve_path(
    optional_path: Option<impl AsRef<path::Path>>,
) -> Result<path::PathBuf, Error> {
    match optional_path {
        Some(path) => Ok(normalize_toml_path(path.as_ref())),
        None => default_config_path(),
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let settings = &self.settings;

        writeln!(f, "Current Configuration:")?;
        write_title_1(f, "Settings")?;
        write_1(f, "Interval (s)", &settings.interval)?;
        write_1(f, "Timeout (ms)", &settings.timeout)?;
        write_1(f, "Max Retries", &settings.max_retries)?;
        write_1(f, "Backoff Base Delay (ms)", &settings.backoff_base_delay)?;
        write_1(f, "Backoff Multiplier", &settings.backoff_multiplier)?;

        write_title_1(f, "Probe")?;
        write_1(f, "Kind", &self.probe.kind)?;
        write_1(f, "Target", &self.probe.target)?;

        write_title_1(f, "Liveness")?;
        write_1(f, "Mode", &self.liveness.mode)?;
        write_1(f, "Poll Interval (s)", &self.liveness.poll_seconds)?;

        write_title_1(f, "Sink")?;
        match &self.sink.path {
            Some(path) => write_1(f, "Path", &path.display())?,
            None => write_1(f, "Path", &"disabled")?,
        }

        write_title_1(f, "HTTP")?;
        write_1(f, "Enabled", &self.http.enabled)?;
        write_1(f, "Bind Address", &self.http.bind)?;
        write_1(f, "Port", &self.http.port)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/linkwatch/config.toml
    ///  or the specified path, with the name config.toml if one does not exist.
    /// Settings read from disk are clamped into bounds.
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path = resolve_path(optional_path)?;

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            let mut config: Self = toml::from_str(raw_string.as_str())?;
            config.settings = config.settings.clamped();
            Ok(config)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }
}
