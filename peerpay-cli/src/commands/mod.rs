//! CLI command implementations

pub mod balance;
pub mod history;
pub mod logs;
pub mod open;
pub mod pay;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use peerpay_core::services::{EntryPoint, LogEvent, LoggingService};
use peerpay_core::PeerpayContext;

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<Arc<LoggingService>> {
    let data_dir = get_data_dir().ok()?;
    std::fs::create_dir_all(&data_dir).ok()?;
    match LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")) {
        Ok(service) => Some(Arc::new(service)),
        Err(e) => {
            tracing::debug!(error = %e, "event log unavailable");
            None
        }
    }
}

/// Log an event, ignoring any errors
pub fn log_event(logger: &Option<Arc<LoggingService>>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

pub fn log_command(logger: &Option<Arc<LoggingService>>, command: &str) {
    log_event(logger, LogEvent::new("command_executed").with_command(command));
}

/// Get the data directory from PEERPAY_DIR or default to ~/.peerpay
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("PEERPAY_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".peerpay"))
        .context("Could not find home directory; set PEERPAY_DIR")
}

/// Open the ledger in the data directory
pub fn get_context() -> Result<PeerpayContext> {
    let data_dir = get_data_dir()?;

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    PeerpayContext::new(&data_dir).context("Failed to open the ledger")
}
