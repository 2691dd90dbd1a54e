//! studysql - browse and edit a documents table on SQLite or PostgreSQL
//!
//! Connection settings come from the environment (optionally a `.env` file
//! in the working directory):
//!   SQLITE_DB_PATH                      # relative to --root
//!   POSTGRES_USER, POSTGRES_PASSWORD, POSTGRES_HOST, POSTGRES_PORT, POSTGRES_DB_NAME

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use studysql_core::DatabaseHandler;
use tracing::info;

mod tracing_setup;
mod tui;

use tracing_setup::{TracingConfig, DEFAULT_LOG_FILE};

#[derive(Parser, Debug)]
#[command(
    name = "studysql",
    author,
    version,
    about = "Terminal UI for a documents table on SQLite or PostgreSQL",
    long_about = "Browse, create, edit and delete documents, and run ad-hoc SQL, against an \
                  embedded SQLite file or a PostgreSQL server chosen at connect time."
)]
struct Cli {
    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Write logs to this file (the TUI owns the terminal)
    #[arg(long, value_name = "PATH", env = "STUDYSQL_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// Application root; a relative SQLITE_DB_PATH is resolved against it
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Preselect PostgreSQL on the connection screen
    #[arg(long)]
    postgres: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env first so clap's env-backed flags see its values. A missing
    // file is fine; values may come from the real environment.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_setup::init(&TracingConfig {
        debug: cli.debug,
        log_file: cli.log_file.clone(),
    })?;

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("Could not determine current directory")?,
    };
    info!(root = %root.display(), postgres = cli.postgres, "starting studysql");

    let app = tui::App::new(DatabaseHandler::from_env(root), cli.postgres);
    tui::run(app).await
}
