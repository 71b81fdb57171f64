use std::{fs::File, path::Path, str::FromStr, sync::Arc};

use thiserror::Error;
use tracing_subscriber::{
    filter::{self, LevelFilter},
    fmt::writer::BoxMakeWriter,
    prelude::*,
    util::TryInitError,
};

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Failed to open the log file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to install the logger: {0}")]
    Init(#[from] TryInitError),
    #[error("Invalid LOG_LEVEL: {0}")]
    Level(String),
}

/// Dependencies logging at debug level would drown ours.
const NOISY_TARGETS: [&str; 6] = ["hyper", "hyper_util", "reqwest", "rustls", "tokio", "mio"];

/// Logs to stderr, and to `log_file` too if given. Stdout is left to the
/// terminal prompts.
pub fn setup_logger(log_level: LevelFilter, log_file: Option<&Path>) -> Result<(), LoggerError> {
    let file_log = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(BoxMakeWriter::new(Arc::new(file)))
                    .with_ansi(false)
                    .with_file(false),
            )
        }
        None => None,
    };

    let stderr_log = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(false);

    tracing_subscriber::registry()
        .with(
            stderr_log
                .and_then(file_log)
                .with_filter(log_level)
                .with_filter(filter::filter_fn(|metadata| {
                    !NOISY_TARGETS
                        .iter()
                        .any(|target| metadata.target().starts_with(target))
                })),
        )
        .try_init()?;

    Ok(())
}

/// Parse LOG_LEVEL environment variable.
pub fn parse_log_level() -> Result<Option<LevelFilter>, LoggerError> {
    if let Ok(l) = std::env::var("LOG_LEVEL") {
        LevelFilter::from_str(&l)
            .map(Some)
            .map_err(|e| LoggerError::Level(e.to_string()))
    } else {
        Ok(None)
    }
}
