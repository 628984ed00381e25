use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level tracker configuration, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub logging: LoggingConfig,
    pub ingest: IngestConfig,
    pub analytics: AnalyticsConfig,
}

impl TrackerConfig {
    /// Load configuration from default path (~/.config/perf-tracker/config.toml),
    /// falling back to defaults if the file doesn't exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Write current configuration to the default path.
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Write current configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("perf-tracker")
            .join("config.toml")
    }

    /// Directory session logs are written to and read from.
    pub fn log_dir(&self) -> PathBuf {
        self.logging
            .log_dir
            .clone()
            .unwrap_or_else(LoggingConfig::default_log_dir)
    }
}

/// Where and how session logs are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for per-session log files.
    pub log_dir: Option<PathBuf>,
    /// Extension of per-session log files, without the dot.
    pub file_extension: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None, // resolved at runtime to ~/.config/opencode/logs
            file_extension: "log".into(),
        }
    }
}

impl LoggingConfig {
    pub fn default_log_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("opencode")
            .join("logs")
    }
}

/// Event ingest behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Generic event types that are never logged.
    pub skip_event_types: Vec<String>,
    /// Generic event type that finalizes a session.
    pub idle_event_type: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            // Streaming part updates duplicate the final message content.
            skip_event_types: vec!["message.part.updated".into()],
            idle_event_type: "session.idle".into(),
        }
    }
}

/// Analytics defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Width of the longest bar in ASCII charts.
    pub chart_width: usize,
    /// Range used when none is given on the command line.
    pub default_range: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            chart_width: 50,
            default_range: "all".into(),
        }
    }
}
