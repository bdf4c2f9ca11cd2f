use crate::{config::LoggingConfig, paths::AppDirs};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable that overrides the configured filter, e.g.
/// `PLAYHOST_LOG=playhost_runtime=trace`.
pub const LOG_ENV_VAR: &str = "PLAYHOST_LOG";

const DEFAULT_LOG_FILE: &str = "playhost.log";

/// Keeps the non-blocking file writer alive; drop it last.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

pub fn init_logging(config: &LoggingConfig, dirs: &AppDirs) -> Result<LoggingGuard, LoggingError> {
    let log_dir = dirs.log_dir().to_path_buf();
    fs::create_dir_all(&log_dir).map_err(|source| LoggingError::CreateDirectory {
        path: log_dir.clone(),
        source,
    })?;

    let env_filter = build_filter(config)?;
    let (file, file_guard) = rolling_file(config, &log_dir)?;
    let writer = if config.stdout {
        BoxMakeWriter::new(std::io::stdout.with_max_level(Level::TRACE).and(file))
    } else {
        BoxMakeWriter::new(file)
    };

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_names(true)
        .with_ansi(config.stdout)
        .with_writer(writer)
        .try_init()
        .map_err(LoggingError::SubscriberInstall)?;
    tracing::info!(log_dir = %log_dir.display(), stdout = config.stdout, "Logging initialized");

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    let directive = std::env::var(LOG_ENV_VAR)
        .unwrap_or_else(|_| config.level.as_filter_directive().to_string());
    EnvFilter::try_new(&directive).map_err(|source| LoggingError::ParseLevel {
        level: directive,
        source,
    })
}

fn rolling_file(
    config: &LoggingConfig,
    log_dir: &Path,
) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let file_stem = config.file_name.as_deref().unwrap_or(DEFAULT_LOG_FILE);
    prune_logs(log_dir, file_stem, config.max_log_files.max(1))?;
    Ok(tracing_appender::non_blocking(
        tracing_appender::rolling::daily(log_dir, file_stem),
    ))
}

/// Delete the oldest files starting with `file_stem` until `keep` remain.
fn prune_logs(dir: &Path, file_stem: &str, keep: usize) -> Result<(), LoggingError> {
    let listing = fs::read_dir(dir).map_err(|source| LoggingError::Retention {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut rotated: Vec<(SystemTime, PathBuf)> = listing
        .flatten()
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(file_stem))
        .filter_map(|entry| Some((entry.metadata().ok()?.modified().ok()?, entry.path())))
        .collect();
    if rotated.len() <= keep {
        return Ok(());
    }

    rotated.sort();
    let excess = rotated.len() - keep;
    for (_, path) in rotated.into_iter().take(excess) {
        if let Err(source) = fs::remove_file(&path) {
            return Err(LoggingError::Retention { path, source });
        }
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse log filter {level}: {source}")]
    ParseLevel {
        level: String,
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("failed to install tracing subscriber: {0}")]
    SubscriberInstall(Box<dyn std::error::Error + Send + Sync>),
    #[error("log retention failed at {path}: {source}")]
    Retention {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn filter_directive_is_lowercase() {
        assert_eq!(LogLevel::Warn.as_filter_directive(), "warn");
    }

    #[test]
    fn pruning_keeps_newest_files() {
        let dir = tempfile::tempdir().unwrap();
        for idx in 0..4 {
            let path = dir.path().join(format!("{DEFAULT_LOG_FILE}.2026-01-0{idx}"));
            fs::write(&path, "line").unwrap();
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        fs::write(dir.path().join("unrelated.txt"), "keep").unwrap();

        prune_logs(dir.path(), DEFAULT_LOG_FILE, 2).unwrap();

        let mut remaining: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        remaining.sort();
        assert_eq!(
            remaining,
            vec![
                format!("{DEFAULT_LOG_FILE}.2026-01-02"),
                format!("{DEFAULT_LOG_FILE}.2026-01-03"),
                "unrelated.txt".to_string(),
            ]
        );
    }
}
