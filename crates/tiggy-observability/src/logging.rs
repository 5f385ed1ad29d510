//! Structured logging
//!
//! `tracing` subscriber setup with a reloadable filter and either a stderr or
//! a file sink.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tiggy_config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::error::{ObservabilityError, Result};

type ReloadHandle = Handle<EnvFilter, Registry>;

/// Where log records go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Stderr,
    /// Append to a file. Required when stdout/stderr belong to a terminal UI.
    File(PathBuf),
}

pub struct LogManager {
    config: LoggingConfig,
    reload_handle: Option<Arc<RwLock<ReloadHandle>>>,
    _guard: Option<WorkerGuard>,
}

impl std::fmt::Debug for LogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogManager")
            .field("config", &self.config)
            .field("initialized", &self.reload_handle.is_some())
            .finish()
    }
}

impl LogManager {
    /// Install the global subscriber
    ///
    /// If another subscriber is already installed the manager is returned
    /// without a reload handle and records keep going to the existing one.
    pub fn init(config: &LoggingConfig, sink: LogSink) -> Result<Self> {
        let filter = build_filter(config)?;
        let (filter, reload_handle) = reload::Layer::new(filter);
        let registry = tracing_subscriber::registry().with(filter);

        let (writer, guard) = match &sink {
            LogSink::Stderr => tracing_appender::non_blocking(std::io::stderr()),
            LogSink::File(path) => {
                let (dir, file_name) = split_log_path(path)?;
                std::fs::create_dir_all(&dir)?;
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name))
            }
        };
        let ansi = matches!(sink, LogSink::Stderr);

        let installed = if config.json_format {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_line_number(true)
                .with_writer(writer)
                .with_ansi(false);
            registry.with(layer).try_init().is_ok()
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_writer(writer)
                .with_ansi(ansi);
            registry.with(layer).try_init().is_ok()
        };

        if installed {
            tracing::info!(
                target: "tiggy_observability",
                "Log manager initialized with level: {}",
                config.level
            );
        }

        Ok(Self {
            config: config.clone(),
            reload_handle: installed.then(|| Arc::new(RwLock::new(reload_handle))),
            _guard: Some(guard),
        })
    }

    /// Change the filter at runtime
    pub fn update_level(&mut self, level: &str) -> Result<()> {
        let new_filter = EnvFilter::try_new(level)
            .map_err(|e| ObservabilityError::logging(format!("Invalid log level: {}", e)))?;

        let Some(handle) = self.reload_handle.as_ref() else {
            return Err(ObservabilityError::logging("Log manager not initialized"));
        };

        handle
            .write()
            .modify(|filter| *filter = new_filter)
            .map_err(|e| ObservabilityError::logging(format!("Failed to update log level: {}", e)))?;

        self.config.level = level.to_string();
        tracing::info!(target: "tiggy_observability", "Log level updated to: {}", level);
        Ok(())
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| ObservabilityError::logging(format!("Invalid log level: {}", e)))?;

    for (module, level) in &config.module_levels {
        filter = filter.add_directive(
            format!("{}={}", module, level)
                .parse()
                .map_err(|e| ObservabilityError::logging(format!("Invalid directive: {}", e)))?,
        );
    }

    Ok(filter)
}

fn split_log_path(path: &Path) -> Result<(PathBuf, String)> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ObservabilityError::logging(format!("Invalid log file: {:?}", path)))?;
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((dir, file_name))
}

/// Span for work on one thread
pub fn thread_span(thread_id: &str) -> tracing::Span {
    tracing::info_span!("thread", thread_id = %thread_id)
}

/// Span for one backend request
pub fn request_span(method: &str, path: &str) -> tracing::Span {
    tracing::debug_span!("request", method = %method, path = %path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_with_module_levels() {
        let mut config = LoggingConfig::default();
        config.level = "warn".to_string();
        config
            .module_levels
            .insert("tiggy_client".to_string(), "debug".to_string());
        assert!(build_filter(&config).is_ok());

        config.level = "not a [valid filter".to_string();
        assert!(build_filter(&config).is_err());
    }

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("/var/log/tiggy/tiggy.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log/tiggy"));
        assert_eq!(name, "tiggy.log");
    }

    #[test]
    fn test_init_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("tiggy.log");
        let manager = LogManager::init(&LoggingConfig::default(), LogSink::File(path));
        assert!(manager.is_ok());
        assert!(dir.path().join("logs").exists());
    }

    #[test]
    fn test_create_spans() {
        let span = thread_span("66f1c0ffee");
        if let Some(metadata) = span.metadata() {
            assert_eq!(metadata.name(), "thread");
        }
    }
}
