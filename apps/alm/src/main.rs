//! # ALM - Asset Liability Management Service
//!
//! The main binary of the ALM platform backend.
//!
//! This application provides:
//! - HTTP REST API server (axum-based) with Swagger UI at `/docs`
//! - CLI interface for store administration and offline forecasts
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       apps/alm (THE BINARY)                     │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐    │
//! │  │   CLI       │    │   HTTP API  │    │   Market Data    │    │
//! │  │  (clap)     │    │   (axum)    │    │    (reqwest)     │    │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘    │
//! │         │                  │                    │               │
//! │         └──────────────────┼────────────────────┘               │
//! │                            ▼                                    │
//! │                    ┌───────────────┐                            │
//! │                    │   alm-core    │                            │
//! │                    │  (THE LOGIC)  │                            │
//! │                    └───────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! alm server --host 0.0.0.0 --port 8000
//!
//! # CLI operations
//! alm init
//! alm create-user --email demo@alm.com --name Demo --password secret123
//! alm forecast --ticker PETR4.SA --steps 7
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // ALM_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("ALM_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "alm=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = alm::cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = alm::cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the ALM startup banner.
fn print_banner() {
    println!(
        r#"
   █████╗ ██╗     ███╗   ███╗
  ██╔══██╗██║     ████╗ ████║
  ███████║██║     ██╔████╔██║
  ██╔══██║██║     ██║╚██╔╝██║
  ██║  ██║███████╗██║ ╚═╝ ██║
  ╚═╝  ╚═╝╚══════╝╚═╝     ╚═╝

  Asset Liability Management Service v{}

  Portfolios • Market Data • Forecasts
"#,
        env!("CARGO_PKG_VERSION")
    );
}
