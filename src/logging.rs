use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

const LOG_FILE_BASENAME: &str = "content-share.log";
const LOG_DIR_ENV: &str = "CONTENT_SHARE_LOG_PATH";

/// Subsystem for macOS unified logging (os_log).
#[cfg(target_os = "macos")]
const OSLOG_SUBSYSTEM: &str = "com.amazonaws.chime.content-share";

/// Get the log directory path
pub fn get_log_dir(config: &LoggingConfig) -> Result<PathBuf> {
    resolve_log_dir(config)
}

/// Install the global tracing subscriber.
///
/// The returned guard flushes the file writer on drop; the host keeps it for
/// the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let log_dir = resolve_log_dir(config)?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;

    prune_old_logs(&log_dir, retention_window(config.retention_days));

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_BASENAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    #[cfg(target_os = "macos")]
    {
        let oslog_layer = tracing_oslog::OsLogger::new(OSLOG_SUBSYSTEM, "default");

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(oslog_layer)
            .try_init()
            .context("A global tracing subscriber is already installed")?;
    }

    #[cfg(not(target_os = "macos"))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .try_init()
            .context("A global tracing subscriber is already installed")?;
    }

    Ok(guard)
}

fn resolve_log_dir(config: &LoggingConfig) -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var(LOG_DIR_ENV) {
        return Ok(PathBuf::from(override_path));
    }

    if let Some(dir) = &config.directory {
        return Ok(dir.clone());
    }

    let proj_dirs = ProjectDirs::from("com", "amazonaws", "chime-content-share")
        .context("Failed to determine project directories for log path")?;

    #[cfg(target_os = "linux")]
    let base = proj_dirs
        .state_dir()
        .unwrap_or_else(|| proj_dirs.data_local_dir());

    #[cfg(not(target_os = "linux"))]
    let base = proj_dirs.data_local_dir();

    Ok(base.join("logs"))
}

fn retention_window(retention_days: u64) -> Duration {
    Duration::from_secs(retention_days.saturating_mul(60 * 60 * 24))
}

fn prune_old_logs(log_dir: &Path, max_age: Duration) {
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return;
    };

    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };

        if !file_name.starts_with(LOG_FILE_BASENAME) {
            continue;
        }

        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };

        if modified < cutoff {
            let _ = std::fs::remove_file(&path);
        }
    }
}
