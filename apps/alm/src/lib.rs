//! # ALM Service Library
//!
//! Everything the `alm` binary runs, exposed for integration tests.
//!
//! - [`api`]: axum router, handlers, JWT auth, rate limiting, docs
//! - [`market`]: Brapi / CoinGecko clients behind the `MarketData` trait
//! - [`config`]: layered TOML + environment configuration
//! - [`cli`]: clap commands

pub mod api;
pub mod cli;
pub mod config;
pub mod market;
