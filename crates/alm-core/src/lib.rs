//! # alm-core
//!
//! The synchronous domain engine of the ALM platform.
//!
//! This crate owns every rule that does not need a network or a runtime:
//! the user/stock/portfolio store, password credentials, annualized
//! portfolio analytics and the SARIMA price forecaster. The `alm` binary
//! wraps it with HTTP, market data providers and the CLI.
//!
//! ## Architectural Constraints
//!
//! - Has NO async, NO network dependencies (pure Rust)
//! - All persistence goes through the `AlmStore` trait
//! - Randomness is injected by the caller (`rand::Rng`)

// =============================================================================
// MODULES
// =============================================================================

pub mod analytics;
pub mod cache;
pub mod credentials;
pub mod forecast;
pub mod primitives;
pub mod rate_window;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AlmError, Holding, HoldingView, PriceHistory, PricePoint, PublicUser, Role, Stock, User,
    UserId,
};

// =============================================================================
// RE-EXPORTS: Store
// =============================================================================

pub use store::{AlmStore, Database, MemoryStore, NewUser, RedbStore};

// =============================================================================
// RE-EXPORTS: Analytics & Forecasting
// =============================================================================

pub use analytics::{
    AnnualizedStats, PortfolioItem, PortfolioSummary, mock_allocation, returns_and_volatility,
    total_allocation,
};
pub use forecast::{
    ForecastMethod, ForecastMetrics, ForecastOutcome, SarimaModel, SarimaOrder, SeasonalOrder,
    forecast_dates, forecast_series, moving_average_forecast, validate_orders, validate_steps,
};

// =============================================================================
// RE-EXPORTS: Infrastructure helpers
// =============================================================================

pub use cache::TtlCache;
pub use credentials::{hash_password, validate_password, validate_registration, verify_password};
pub use rate_window::SlidingWindowLimiter;
