//! Main entry point for the Parley backend CLI.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use shared::config::Config;
use std::error::Error;
use std::path::PathBuf;

mod app_state;
mod db;
mod handlers;
mod http;
mod realtime;
mod routes;
mod server;
mod services;
mod store;

/// Main CLI structure for the Parley server.
#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Backend server for Parley chat rooms", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for the Parley CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Start the backend server.
    Serve {
        /// Port number to bind the server to. Overrides the configuration
        /// file and environment.
        #[arg(long, short)]
        port: Option<u16>,

        /// Path to the configuration file (`.toml` or `.json`). Defaults are
        /// used when not provided.
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

/// Initializes environment variables and returns the parsed CLI.
#[must_use]
pub fn initialize_cli() -> Cli {
    dotenv().ok();
    Cli::parse()
}

/// Handles the serve command by loading configuration and starting the server.
///
/// # Errors
/// Returns an error if configuration loading or server startup fails.
pub async fn handle_serve(
    port: Option<u16>,
    config_path: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let config = Config::load_config(config_path, port)?;
    let level = server::initialize_tracing(&config);
    tracing::info!(level, "starting parley server");

    server::run(config).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = initialize_cli();

    match cli.command {
        Commands::Serve { port, config } => handle_serve(port, config).await,
    }
}
