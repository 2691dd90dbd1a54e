//! Tracing setup for the studysql binary
//!
//! The TUI owns stdout, so log lines go to a file instead of the console.
//!
//! Usage:
//!   studysql --debug                     # Debug logging
//!   studysql --log-file /tmp/studysql.log
//!   RUST_LOG=studysql_core=trace studysql
//!
//! Environment variables:
//!   RUST_LOG                             # Log filter (default: info)

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

/// Default log file, relative to the working directory
pub const DEFAULT_LOG_FILE: &str = "studysql.log";

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Enable debug logging (sets RUST_LOG=debug if not already set)
    pub debug: bool,
    /// File receiving every log line
    pub log_file: PathBuf,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

fn env_filter(debug: bool) -> EnvFilter {
    let fallback = if debug { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Initialize tracing, appending to `config.log_file`
pub fn init(config: &TracingConfig) -> Result<()> {
    let file = open_log_file(&config.log_file)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config.debug))
        .with_target(config.debug) // Show targets in debug mode
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}
