pub mod catalog;
pub mod config;
pub mod db;
pub mod decoder;
pub mod errors;
pub mod export;
pub mod locator;
pub mod models;
pub mod splitter;

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub use crate::catalog::{build_individual_notes, filter_notes, scan, sort_notes, ScanReport};
pub use crate::config::ExtractorConfig;
pub use crate::db::StateDatabase;
pub use crate::errors::{AppError, AppResult};
pub use crate::locator::NoteLocator;
pub use crate::splitter::parse_notes;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

const DEFAULT_LOG_FILTER: &str = "notepad_extractor_lib=info,notepad_extractor=info,warn";

/// Installs the global subscriber. With a log directory, events go to a daily-rolling JSON file;
/// otherwise to stderr.
pub fn init_tracing(log_dir: Option<&Path>) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    match log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
            let file_appender = tracing_appender::rolling::daily(log_dir, "notepad-extractor.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = LOG_GUARD.set(guard);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_writer(non_blocking)
                .try_init()
                .map_err(|error| error.to_string())
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|error| error.to_string()),
    }
}
