//! Logging setup for hosts embedding the compositor core.
//!
//! The core itself only emits `tracing` events and spans. This module installs
//! a subscriber for them: console output plus an optional daily-rolling log
//! file, in text or JSON format.

use crate::config::LoggingConfig;
use crate::error::CoreError;

use once_cell::sync::Lazy;
use std::io::{stdout, IsTerminal};
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Keeps the file writer's worker alive so buffered lines are flushed.
static LOG_WORKER_GUARD: Lazy<Mutex<Option<WorkerGuard>>> = Lazy::new(|| Mutex::new(None));

/// Installs a minimal `stderr` subscriber filtered by `RUST_LOG` (default "info").
///
/// Meant for tests and early startup. Does nothing if a subscriber is already set.
pub fn init_minimal_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    let _ = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();
}

fn level_filter(level: &str) -> Result<Level, CoreError> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        invalid => Err(CoreError::LoggingInitialization(format!("Invalid log level in config: {}", invalid))),
    }
}

/// Creates a daily-rolling file layer and the guard of its writer thread.
fn create_file_layer(log_path: &Path, format: &str) -> Result<(BoxedLayer, WorkerGuard), CoreError> {
    let directory = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(directory)?;

    let file_name = log_path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("compositor-core.log"));
    let file_appender = tracing_appender::rolling::daily(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let layer = match format.to_lowercase().as_str() {
        "json" => fmt::layer().json().with_writer(writer).with_ansi(false).boxed(),
        _ => fmt::layer().with_writer(writer).with_ansi(false).boxed(),
    };
    Ok((layer, guard))
}

/// Installs the global subscriber described by `config`.
///
/// # Arguments
///
/// * `config`: level, format and optional file path.
/// * `is_reload`: when true, an already installed subscriber is not an error;
///   the file guard is still replaced so a new log file takes effect on restart.
///
/// # Errors
///
/// [`CoreError::LoggingInitialization`] for an invalid level or, on first
/// setup, when a global subscriber already exists. [`CoreError::Io`] if the
/// log directory cannot be created.
pub fn init_logging(config: &LoggingConfig, is_reload: bool) -> Result<(), CoreError> {
    let level = level_filter(&config.level)?;

    let console_filter = EnvFilter::new(level.to_string());
    let console_layer = match config.format.to_lowercase().as_str() {
        "json" => fmt::layer().json().with_writer(stdout).with_ansi(false).with_filter(console_filter).boxed(),
        _ => fmt::layer()
            .with_writer(stdout)
            .with_ansi(std::io::stdout().is_terminal())
            .with_filter(console_filter)
            .boxed(),
    };

    let mut layers: Vec<BoxedLayer> = vec![console_layer];
    let mut new_guard = None;
    if let Some(log_path) = &config.file_path {
        let (file_layer, guard) = create_file_layer(log_path, &config.format)?;
        layers.push(file_layer.with_filter(EnvFilter::new(level.to_string())).boxed());
        new_guard = Some(guard);
    }

    let result = Registry::default().with(layers).try_init();

    match LOG_WORKER_GUARD.lock() {
        Ok(mut slot) => *slot = new_guard,
        Err(e) => eprintln!("[ERROR] Failed to lock LOG_WORKER_GUARD: {}. Log flushing may be affected.", e),
    }

    match result {
        Ok(()) => Ok(()),
        Err(e) if is_reload => {
            eprintln!("[INFO] Logging re-initialization attempted, previous subscriber stays active: {}", e);
            Ok(())
        }
        Err(e) => Err(CoreError::LoggingInitialization(format!(
            "Failed to set global tracing subscriber. Was it already initialized? Error: {}",
            e
        ))),
    }
}
