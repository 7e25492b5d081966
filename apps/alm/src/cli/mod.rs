//! # ALM CLI Module
//!
//! This module implements the CLI interface for ALM.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database with the stock catalog
//! - `seed` - Insert the stock catalog if it is empty
//! - `create-user` - Create a user account
//! - `portfolio` - Show a portfolio with live market metrics
//! - `forecast` - Run a SARIMA forecast for a ticker

mod commands;

use alm_core::AlmError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// ALM - Asset Liability Management Service
///
/// Portfolio analytics, market data and price forecasts over a REST API.
#[derive(Parser, Debug)]
#[command(name = "alm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the redb database
    #[arg(short = 'D', long, global = true, default_value = "alm.redb")]
    pub database: PathBuf,

    /// Storage backend: "redb" (ACID database) or "memory" (volatile)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// TOML configuration file
    #[arg(short = 'c', long, global = true, env = "ALM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (default from config: 0.0.0.0)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (default from config: 8000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new database and seed the stock catalog
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Insert the stock catalog when it is empty
    Seed,

    /// Create a user account
    CreateUser {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        password: String,

        /// Grant the admin role
        #[arg(long)]
        admin: bool,
    },

    /// Show a portfolio with market metrics
    Portfolio {
        /// User ID; every catalog stock with mock allocations when omitted
        #[arg(short, long)]
        user: Option<u64>,
    },

    /// Forecast the closing price of a ticker
    Forecast {
        #[arg(short, long)]
        ticker: String,

        /// Number of days to forecast
        #[arg(short, long, default_value = "7")]
        steps: usize,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AlmError> {
    let backend = cli.backend.as_str();
    let json_mode = cli.json_mode;
    let config = crate::config::AppConfig::load(cli.config.as_deref())?;

    if cli.verbose {
        tracing::info!(database = %cli.database.display(), backend, "Configuration loaded");
    }

    match cli.command {
        Some(Commands::Server { host, port }) => {
            cmd_server(&cli.database, backend, config, host, port).await
        }
        Some(Commands::Init { force }) => cmd_init(&cli.database, backend, force),
        Some(Commands::Seed) => cmd_seed(&cli.database, backend, json_mode),
        Some(Commands::CreateUser {
            email,
            name,
            password,
            admin,
        }) => cmd_create_user(
            &cli.database,
            backend,
            json_mode,
            &email,
            &name,
            &password,
            admin,
        ),
        Some(Commands::Portfolio { user }) => {
            cmd_portfolio(&cli.database, backend, config, json_mode, user).await
        }
        Some(Commands::Forecast { ticker, steps }) => {
            cmd_forecast(config, json_mode, &ticker, steps).await
        }
        None => {
            // No subcommand - start the server with configured defaults
            cmd_server(&cli.database, backend, config, None, None).await
        }
    }
}
