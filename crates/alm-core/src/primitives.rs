//! # Platform Primitives
//!
//! Fixed constants of the ALM platform: the seed catalog, the default
//! portfolio, annualization factors and input limits.
//!
//! These values are compiled into the binary and are immutable at runtime.

// =============================================================================
// SEED DATA
// =============================================================================

/// Stocks inserted when the catalog is empty: `(ticker, name, sector)`.
pub const INITIAL_STOCKS: [(&str, &str, &str); 5] = [
    ("PETR4.SA", "Petrobras PN", "Petróleo e Gás"),
    ("VALE3.SA", "Vale ON", "Mineração"),
    ("ITUB4.SA", "Itaú Unibanco PN", "Bancos"),
    ("WEGE3.SA", "Weg ON", "Energia"),
    ("BTC-USD", "Bitcoin", "Criptomoedas"),
];

/// Portfolio created for a user on first login: `(ticker, allocation)`.
pub const DEFAULT_PORTFOLIO: [(&str, f64); 5] = [
    ("PETR4.SA", 0.40),
    ("VALE3.SA", 0.30),
    ("ITUB4.SA", 0.20),
    ("WEGE3.SA", 0.05),
    ("BTC-USD", 0.05),
];

/// Allocations used when market data is requested without a user.
///
/// Tickers missing from this table get allocation 0.
pub const MOCK_ALLOCATIONS: [(&str, f64); 4] = [
    ("PETR4.SA", 0.40),
    ("VALE3.SA", 0.30),
    ("ITUB4.SA", 0.20),
    ("BTC-USD", 0.10),
];

/// The only ticker served by the crypto feed.
pub const CRYPTO_TICKER: &str = "BTC-USD";

// =============================================================================
// ANALYTICS
// =============================================================================

/// Trading days used to annualize daily statistics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Multiplier applied to the historical return to get the forecast return.
pub const FORECAST_RETURN_FACTOR: f64 = 1.05;

/// Multiplier applied to the historical volatility to get the forecast volatility.
pub const FORECAST_VOLATILITY_FACTOR: f64 = 0.95;

/// A portfolio counts as fully allocated within this distance of 1.0.
pub const FULL_ALLOCATION_TOLERANCE: f64 = 0.01;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Minimum password length accepted at registration and login.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Inclusive bounds for display names.
pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_NAME_LENGTH: usize = 100;

/// Inclusive bounds for the number of forecast steps.
pub const MIN_FORECAST_STEPS: usize = 1;
pub const MAX_FORECAST_STEPS: usize = 30;

/// Inclusive bounds for the training window in days.
pub const MIN_TRAINING_DAYS: usize = 30;
pub const MAX_TRAINING_DAYS: usize = 730;

/// Window of the moving-average fallback forecast.
pub const MOVING_AVERAGE_WINDOW: usize = 7;

/// Largest accepted component of a SARIMA order, `p d q` and `P D Q` alike.
pub const MAX_ORDER_COMPONENT: usize = 5;

/// Largest accepted seasonal period.
pub const MAX_SEASONAL_PERIOD: usize = MAX_TRAINING_DAYS;
