//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use nearby_core::SightingLogger;
use serde::{Deserialize, Serialize};

use crate::cli::{ScanArgs, SinkKind};

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Sighting line destination
    #[serde(default)]
    pub sink: Option<SinkKind>,

    /// File to append sighting lines to
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Lines that may wait for a slow sink
    #[serde(default)]
    pub queue_capacity: Option<usize>,

    /// Capacity of the sighting event channel
    #[serde(default)]
    pub event_capacity: Option<usize>,

    /// Session length in seconds (runs until Ctrl-C when unset)
    #[serde(default)]
    pub duration: Option<u64>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nearby")
            .join("config.toml")
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`, or return default if missing or unreadable
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

/// Settings for one scan after merging flags over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    pub sink: SinkKind,
    pub log_file: Option<PathBuf>,
    pub queue_capacity: usize,
    pub event_capacity: usize,
    pub duration: Option<Duration>,
}

/// Default capacity of the sighting event channel.
const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Resolve scan settings: flags win over the config file, which wins over
/// built-in defaults. A log file on its own selects the file sink.
pub fn resolve_scan(args: &ScanArgs, config: &Config) -> Result<ScanSettings> {
    let log_file = args.log_file.clone().or_else(|| config.log_file.clone());
    let sink = match (args.sink, &args.log_file) {
        (Some(sink), _) => sink,
        (None, Some(_)) => SinkKind::File,
        (None, None) => config.sink.unwrap_or_default(),
    };

    if sink == SinkKind::File && log_file.is_none() {
        bail!("The file sink needs a log file (--log-file or log_file in the config)");
    }

    let queue_capacity = args
        .queue_capacity
        .or(config.queue_capacity)
        .unwrap_or(SightingLogger::DEFAULT_QUEUE_CAPACITY);
    if queue_capacity == 0 {
        bail!("queue capacity must be at least 1");
    }

    let event_capacity = args
        .event_capacity
        .or(config.event_capacity)
        .unwrap_or(DEFAULT_EVENT_CAPACITY);
    if event_capacity == 0 {
        bail!("event capacity must be at least 1");
    }

    Ok(ScanSettings {
        sink,
        log_file,
        queue_capacity,
        event_capacity,
        duration: args.duration.or(config.duration).map(Duration::from_secs),
    })
}
