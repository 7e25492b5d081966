//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API. Field names
//! follow the frontend contract, including its mixed casing
//! (`createdAt` next to `refresh_token`).

use alm_core::{
    AlmError, ForecastMetrics, PortfolioItem, SarimaOrder, SeasonalOrder, User,
    primitives::{MAX_TRAINING_DAYS, MIN_TRAINING_DAYS},
    validate_orders, validate_steps,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// SERVICE RESPONSES
// =============================================================================

/// `GET /` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
}

impl Default for RootResponse {
    fn default() -> Self {
        Self {
            message: "Welcome to ALM xLSTM Inference Service".to_string(),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// AUTH
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// User as returned by login and `/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserJson {
    /// Decimal string of the numeric id.
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
}

impl From<&User> for UserJson {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            created_at: Some(user.created_at.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserJson,
    pub token: String,
    pub refresh_token: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: u64,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub token: String,
}

// =============================================================================
// PORTFOLIO
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioResponse {
    pub user_id: u64,
    pub portfolio: Vec<PortfolioItem>,
    pub total_allocation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationUpdate {
    pub stock_ticker: String,
    pub allocation: f64,
}

impl AllocationUpdate {
    /// Allocation must lie in `[0, 1]`.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.allocation) {
            return Err(format!(
                "allocation must be between 0 and 1, got {}",
                self.allocation
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResponse {
    pub message: String,
    pub user_id: u64,
    pub stock_ticker: String,
    pub new_allocation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveStockResponse {
    pub message: String,
    pub user_id: u64,
    pub stock_ticker: String,
}

// =============================================================================
// FORECAST
// =============================================================================

const fn default_steps() -> usize {
    7
}

const fn default_days() -> usize {
    365
}

/// SARIMA forecast request. Omitted orders use `(2,1,2)×(1,1,1,5)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub ticker: String,
    #[serde(default = "default_steps")]
    pub n_steps: usize,
    #[serde(default)]
    pub order: Option<(usize, usize, usize)>,
    #[serde(default)]
    pub seasonal_order: Option<(usize, usize, usize, usize)>,
    #[serde(default = "default_days")]
    pub days: usize,
}

impl ForecastRequest {
    /// Check ticker, step, order and training-window bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.ticker.trim().is_empty() {
            return Err("ticker must not be empty".to_string());
        }
        validate_steps(self.n_steps).map_err(detail)?;
        validate_orders(self.sarima_order(), self.seasonal()).map_err(detail)?;
        if !(MIN_TRAINING_DAYS..=MAX_TRAINING_DAYS).contains(&self.days) {
            return Err(format!(
                "days must be between {MIN_TRAINING_DAYS} and {MAX_TRAINING_DAYS}"
            ));
        }
        Ok(())
    }

    /// Requested non-seasonal order, `(2,1,2)` when omitted.
    pub fn sarima_order(&self) -> SarimaOrder {
        self.order.map(Into::into).unwrap_or_default()
    }

    /// Requested seasonal order, `(1,1,1,5)` when omitted.
    pub fn seasonal(&self) -> SeasonalOrder {
        self.seasonal_order.map(Into::into).unwrap_or_default()
    }
}

/// Detail text of a validation error, without the variant prefix.
fn detail(err: AlmError) -> String {
    match err {
        AlmError::InvalidInput(msg) => msg,
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub ticker: String,
    pub forecast_dates: Vec<String>,
    pub forecast_values: Vec<f64>,
    /// Always `null`; charts are rendered by the frontend.
    pub plot_base64: Option<String>,
    pub metrics: Option<ForecastMetrics>,
}
