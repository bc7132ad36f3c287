//! CLI module for the Users API
//!
//! Provides subcommands:
//! - `serve`: run the HTTP API
//! - `import`: bulk-import a CSV file without going through HTTP

pub mod import;
pub mod serve;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Users API - CRUD, soft delete and bulk CSV import for user records
#[derive(Parser)]
#[command(name = "users-api")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve,

    /// Import users from a CSV file and print the counts
    Import(import::ImportArgs),
}

/// Load `.env` and layered configuration, then install logging
pub(crate) fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    Ok(config)
}
