//! Configuration file support for stmboot.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (STMBOOT_*)
//! 3. Local config file (./stmboot.toml)
//! 4. Global config file (~/.config/stmboot/config.toml)

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stmboot::{DevicePhrases, SessionConfig};

/// Local configuration file name.
pub const LOCAL_CONFIG_FILE: &str = "stmboot.toml";

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyUSB0" or "COM3").
    pub serial: Option<String>,
    /// Default baud rate.
    pub baud: Option<u32>,
}

/// Bootloader session tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSection {
    /// Pause before each DATA packet.
    pub packet_delay_ms: Option<u64>,
    /// Attempt ceiling for exchanges.
    pub retries: Option<u32>,
    /// Line ceiling for status drains.
    pub drain_lines: Option<u32>,
    /// Per-line read timeout.
    pub line_timeout_ms: Option<u64>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Session settings.
    #[serde(default)]
    pub session: SessionSection,
    /// Device phrases, for bootloader builds that print other text.
    ///
    /// Keys missing from the table keep the firmware defaults.
    pub phrases: Option<DevicePhrases>,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Local config overrides global
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content)
                .map_err(|e| {
                    warn!(
                        "Ignoring invalid TOML config file {}: {}",
                        path.display(),
                        e
                    );
                })
                .ok(),
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Parse a TOML document.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "stmboot").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one. Values set in `other` win.
    fn merge(&mut self, other: Self) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.connection.serial, other.connection.serial);
        take(&mut self.connection.baud, other.connection.baud);

        take(&mut self.session.packet_delay_ms, other.session.packet_delay_ms);
        take(&mut self.session.retries, other.session.retries);
        take(&mut self.session.drain_lines, other.session.drain_lines);
        take(&mut self.session.line_timeout_ms, other.session.line_timeout_ms);

        // A [phrases] table replaces the whole set
        take(&mut self.phrases, other.phrases);
    }

    /// Per-line read timeout, if configured.
    pub fn line_timeout(&self) -> Option<Duration> {
        self.session
            .line_timeout_ms
            .map(Duration::from_millis)
    }

    /// Session parameters with configured overrides applied over the defaults.
    pub fn session_config(&self) -> SessionConfig {
        let mut session = SessionConfig::default();
        if let Some(ms) = self.session.packet_delay_ms {
            session.packet_delay = Duration::from_millis(ms);
        }
        if let Some(retries) = self.session.retries {
            session.retries = retries;
        }
        if let Some(lines) = self.session.drain_lines {
            session.drain_lines = lines;
        }
        match &self.phrases {
            Some(phrases) => session.with_phrases(phrases.clone()),
            None => session,
        }
    }
}
