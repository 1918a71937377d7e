//! Configuration management for content share

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::video::{
    VIDEO_CLIENT_FLAG_DISABLE_CAPTURER, VIDEO_CLIENT_FLAG_ENABLE_TWO_SIMULCAST_STREAMS,
    VIDEO_CLIENT_FLAG_ENABLE_USE_HW_DECODE_AND_RENDER,
};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client settings for TURN renewal
    #[serde(default)]
    pub http: HttpConfig,

    /// Content share session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent override (defaults to crate name, version and OS)
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Whole-request timeout (ms)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Connection timeout (ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long a stop waits for the transport to confirm (ms)
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// Let the transport use hardware decode and render
    #[serde(default = "default_true")]
    pub enable_hw_decode: bool,

    /// Send two simulcast layers
    #[serde(default = "default_true")]
    pub enable_two_simulcast_streams: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for rolling log files (platform default when unset)
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Days to keep old log files
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
}

// Default value functions
fn default_timeout_ms() -> u64 {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_stop_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_retention_days() -> u64 {
    7
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: default_stop_timeout_ms(),
            enable_hw_decode: true,
            enable_two_simulcast_streams: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            retention_days: default_retention_days(),
        }
    }
}

impl HttpConfig {
    /// Effective User-Agent header value
    pub fn user_agent(&self) -> String {
        self.user_agent.clone().unwrap_or_else(|| {
            format!(
                "{}/{} ({})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS
            )
        })
    }
}

impl SessionConfig {
    /// Start flags passed to the transport. Content share never uses the
    /// transport's own capturer.
    pub fn video_client_flags(&self) -> u32 {
        let mut flags = VIDEO_CLIENT_FLAG_DISABLE_CAPTURER;
        if self.enable_hw_decode {
            flags |= VIDEO_CLIENT_FLAG_ENABLE_USE_HW_DECODE_AND_RENDER;
        }
        if self.enable_two_simulcast_streams {
            flags |= VIDEO_CLIENT_FLAG_ENABLE_TWO_SIMULCAST_STREAMS;
        }
        flags
    }
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let mut config = Config::default();
            config.config_path = Some(config_path);
            config.save()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.config_path()?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the config file path
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_config_path(),
        }
    }

    /// Use a specific file for subsequent saves
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    /// Get default config path
    fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("com", "amazonaws", "chime-content-share")
            .context("Failed to determine config directory")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}
