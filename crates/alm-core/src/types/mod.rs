//! # Core Type Definitions
//!
//! This module contains all core types for the ALM platform:
//! - Identifiers and roles (`UserId`, `Role`)
//! - Persisted records (`User`, `Stock`, `Holding`)
//! - Joined views (`PublicUser`, `HoldingView`)
//! - Market series (`PricePoint`, `PriceHistory`)
//! - Error types (`AlmError`)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier for a registered user.
///
/// Identifiers are assigned sequentially starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account. Every self-registered user gets this role.
    #[default]
    User,
    /// Administrative account, only created from the CLI.
    Admin,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = AlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(AlmError::InvalidInput(format!("Unknown role: {other}"))),
        }
    }
}

// =============================================================================
// USERS
// =============================================================================

/// A stored user account, including the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    /// Lowercase hex SHA-256 of the password.
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Strip the credential fields.
    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// A user as exposed outside the store (no password hash).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// STOCKS & HOLDINGS
// =============================================================================

/// A tradable asset known to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    /// Market ticker, e.g. `PETR4.SA` or `BTC-USD`.
    pub ticker: String,
    pub name: String,
    pub sector: String,
}

impl Stock {
    /// Create a new stock record.
    #[must_use]
    pub fn new(
        ticker: impl Into<String>,
        name: impl Into<String>,
        sector: impl Into<String>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            name: name.into(),
            sector: sector.into(),
        }
    }
}

/// One position in a user's portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    /// Target weight in `[0.0, 1.0]`.
    pub allocation: f64,
    pub quantity: Option<f64>,
    pub purchase_price: Option<f64>,
    pub purchase_date: Option<NaiveDate>,
}

impl Holding {
    /// A holding with only a target allocation.
    #[must_use]
    pub fn with_allocation(ticker: impl Into<String>, allocation: f64) -> Self {
        Self {
            ticker: ticker.into(),
            allocation,
            quantity: None,
            purchase_price: None,
            purchase_date: None,
        }
    }
}

/// A holding joined with its stock record.
///
/// `stock_name` and `sector` are `None` when the ticker is no longer
/// present in the stock catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingView {
    pub holding: Holding,
    pub stock_name: Option<String>,
    pub sector: Option<String>,
}

// =============================================================================
// MARKET DATA
// =============================================================================

/// A single daily bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PricePoint {
    /// A bar where every price equals `close` (crypto feeds only report closes).
    #[must_use]
    pub const fn close_only(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }
}

/// Daily price history of one ticker, ordered by ascending date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub ticker: String,
    pub points: Vec<PricePoint>,
}

impl PriceHistory {
    /// Build a history, sorting the points by date.
    #[must_use]
    pub fn new(ticker: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        Self {
            ticker: ticker.into(),
            points,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Closing prices in chronological order.
    #[must_use]
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    #[must_use]
    pub fn last_close(&self) -> Option<f64> {
        self.points.last().map(|p| p.close)
    }

    #[must_use]
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Keep only the most recent `n` points.
    #[must_use]
    pub fn tail(&self, n: usize) -> Self {
        let start = self.points.len().saturating_sub(n);
        Self {
            ticker: self.ticker.clone(),
            points: self.points[start..].to_vec(),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the ALM core.
///
/// Every variant carries a human-readable detail that the HTTP layer
/// forwards to clients.
#[derive(Debug, Error)]
pub enum AlmError {
    /// The requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The input violates a validation rule.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The record already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Credentials or tokens were rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A model needs more observations than were supplied.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A numerical routine failed (singular system, non-finite output).
    #[error("Numerical error: {0}")]
    Numerical(String),

    /// An upstream market data provider failed.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// TESTS
// =============================================================================
