//! # Store Module
//!
//! Persistence for users, the stock catalog and portfolios.
//!
//! ## Storage Backends
//!
//! `Database` supports two storage backends:
//! - `InMemory`: Uses `MemoryStore` (fast, volatile)
//! - `Persistent`: Uses `RedbStore` for disk-backed ACID storage
//!
//! Backends implement only the primitive record operations of `AlmStore`.
//! Portfolio rules (seeding, default portfolio, upsert, join with the
//! catalog) are provided methods shared by both.

mod redb_store;

pub use redb_store::RedbStore;

use crate::primitives::{DEFAULT_PORTFOLIO, INITIAL_STOCKS};
use crate::{AlmError, Holding, HoldingView, Role, Stock, User, UserId};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// NEW USER
// =============================================================================

/// Fields required to create a user. The store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
}

// =============================================================================
// ALMSTORE TRAIT
// =============================================================================

/// The AlmStore trait defines the record operations of the platform.
///
/// All fallible operations return `Result<T, AlmError>` to support both
/// in-memory and persistent storage backends uniformly.
pub trait AlmStore {
    /// Every stock in the catalog, ordered by ticker.
    fn all_stocks(&self) -> Result<Vec<Stock>, AlmError>;

    /// Lookup a stock by ticker.
    fn stock(&self, ticker: &str) -> Result<Option<Stock>, AlmError>;

    /// Insert a stock. Returns `false` if the ticker already exists.
    fn create_stock(&mut self, stock: Stock) -> Result<bool, AlmError>;

    /// Update name and/or sector. Returns `false` if nothing was changed.
    fn update_stock(
        &mut self,
        ticker: &str,
        name: Option<&str>,
        sector: Option<&str>,
    ) -> Result<bool, AlmError>;

    /// Delete a stock. Returns `true` if a record was removed.
    fn delete_stock(&mut self, ticker: &str) -> Result<bool, AlmError>;

    /// Lookup a user by id.
    fn user_by_id(&self, id: UserId) -> Result<Option<User>, AlmError>;

    /// Lookup a user by exact email.
    fn user_by_email(&self, email: &str) -> Result<Option<User>, AlmError>;

    /// Create a user. Fails with `Conflict` if the email is taken.
    fn create_user(&mut self, user: NewUser) -> Result<UserId, AlmError>;

    /// Raw holdings of a user, in insertion order.
    fn holdings(&self, user: UserId) -> Result<Vec<Holding>, AlmError>;

    /// Replace all holdings of a user.
    fn put_holdings(&mut self, user: UserId, holdings: Vec<Holding>) -> Result<(), AlmError>;

    // -------------------------------------------------------------------------
    // Provided operations
    // -------------------------------------------------------------------------

    /// Seed the catalog when it is empty. Returns the number of stocks inserted.
    fn initialize_stocks(&mut self) -> Result<usize, AlmError> {
        if !self.all_stocks()?.is_empty() {
            return Ok(0);
        }
        let mut inserted = 0;
        for (ticker, name, sector) in INITIAL_STOCKS {
            if self.create_stock(Stock::new(ticker, name, sector))? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Holdings of a user joined with the catalog, highest allocation first.
    fn user_portfolio(&self, user: UserId) -> Result<Vec<HoldingView>, AlmError> {
        let mut views = Vec::new();
        for holding in self.holdings(user)? {
            let stock = self.stock(&holding.ticker)?;
            views.push(HoldingView {
                stock_name: stock.as_ref().map(|s| s.name.clone()),
                sector: stock.map(|s| s.sector),
                holding,
            });
        }
        views.sort_by(|a, b| {
            b.holding
                .allocation
                .total_cmp(&a.holding.allocation)
                .then_with(|| a.holding.ticker.cmp(&b.holding.ticker))
        });
        Ok(views)
    }

    /// Give a user the default portfolio, replacing anything held.
    fn create_default_portfolio(&mut self, user: UserId) -> Result<(), AlmError> {
        let holdings = DEFAULT_PORTFOLIO
            .iter()
            .map(|(ticker, allocation)| Holding::with_allocation(*ticker, *allocation))
            .collect();
        self.put_holdings(user, holdings)
    }

    /// Set the allocation of a ticker, inserting the holding if needed.
    fn update_allocation(
        &mut self,
        user: UserId,
        ticker: &str,
        allocation: f64,
    ) -> Result<(), AlmError> {
        if !(0.0..=1.0).contains(&allocation) {
            return Err(AlmError::InvalidInput(format!(
                "allocation {allocation} outside [0, 1]"
            )));
        }
        let mut holdings = self.holdings(user)?;
        match holdings.iter_mut().find(|h| h.ticker == ticker) {
            Some(existing) => existing.allocation = allocation,
            None => holdings.push(Holding::with_allocation(ticker, allocation)),
        }
        self.put_holdings(user, holdings)
    }

    /// Remove a ticker from a portfolio. Returns `true` if it was held.
    fn remove_from_portfolio(&mut self, user: UserId, ticker: &str) -> Result<bool, AlmError> {
        let mut holdings = self.holdings(user)?;
        let before = holdings.len();
        holdings.retain(|h| h.ticker != ticker);
        if holdings.len() == before {
            return Ok(false);
        }
        self.put_holdings(user, holdings)?;
        Ok(true)
    }
}

// =============================================================================
// IN-MEMORY BACKEND
// =============================================================================

/// Volatile store backed by ordered maps.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    stocks: BTreeMap<String, Stock>,
    users: BTreeMap<UserId, User>,
    holdings: BTreeMap<UserId, Vec<Holding>>,
    next_user_id: u64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlmStore for MemoryStore {
    fn all_stocks(&self) -> Result<Vec<Stock>, AlmError> {
        Ok(self.stocks.values().cloned().collect())
    }

    fn stock(&self, ticker: &str) -> Result<Option<Stock>, AlmError> {
        Ok(self.stocks.get(ticker).cloned())
    }

    fn create_stock(&mut self, stock: Stock) -> Result<bool, AlmError> {
        if self.stocks.contains_key(&stock.ticker) {
            return Ok(false);
        }
        self.stocks.insert(stock.ticker.clone(), stock);
        Ok(true)
    }

    fn update_stock(
        &mut self,
        ticker: &str,
        name: Option<&str>,
        sector: Option<&str>,
    ) -> Result<bool, AlmError> {
        if name.is_none() && sector.is_none() {
            return Ok(false);
        }
        let Some(stock) = self.stocks.get_mut(ticker) else {
            return Ok(false);
        };
        if let Some(name) = name {
            stock.name = name.to_string();
        }
        if let Some(sector) = sector {
            stock.sector = sector.to_string();
        }
        Ok(true)
    }

    fn delete_stock(&mut self, ticker: &str) -> Result<bool, AlmError> {
        Ok(self.stocks.remove(ticker).is_some())
    }

    fn user_by_id(&self, id: UserId) -> Result<Option<User>, AlmError> {
        Ok(self.users.get(&id).cloned())
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, AlmError> {
        Ok(self.users.values().find(|u| u.email == email).cloned())
    }

    fn create_user(&mut self, user: NewUser) -> Result<UserId, AlmError> {
        if self.users.values().any(|u| u.email == user.email) {
            return Err(AlmError::Conflict(format!("email {} already registered", user.email)));
        }
        self.next_user_id = self.next_user_id.saturating_add(1);
        let id = UserId(self.next_user_id);
        self.users.insert(
            id,
            User {
                id,
                email: user.email,
                name: user.name,
                password_hash: user.password_hash,
                role: user.role,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    fn holdings(&self, user: UserId) -> Result<Vec<Holding>, AlmError> {
        Ok(self.holdings.get(&user).cloned().unwrap_or_default())
    }

    fn put_holdings(&mut self, user: UserId, holdings: Vec<Holding>) -> Result<(), AlmError> {
        if holdings.is_empty() {
            self.holdings.remove(&user);
        } else {
            self.holdings.insert(user, holdings);
        }
        Ok(())
    }
}

// =============================================================================
// DATABASE (backend selector)
// =============================================================================

/// Storage backend selected at startup.
#[derive(Debug)]
pub enum Database {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for Database {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl Database {
    /// Create an empty in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open or create a redb database at `path`.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, AlmError> {
        Ok(Self::Persistent(RedbStore::open(path)?))
    }

    /// Check if this database persists to disk.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }

    fn inner(&self) -> &dyn AlmStore {
        match self {
            Self::InMemory(s) => s,
            Self::Persistent(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn AlmStore {
        match self {
            Self::InMemory(s) => s,
            Self::Persistent(s) => s,
        }
    }
}

impl AlmStore for Database {
    fn all_stocks(&self) -> Result<Vec<Stock>, AlmError> {
        self.inner().all_stocks()
    }

    fn stock(&self, ticker: &str) -> Result<Option<Stock>, AlmError> {
        self.inner().stock(ticker)
    }

    fn create_stock(&mut self, stock: Stock) -> Result<bool, AlmError> {
        self.inner_mut().create_stock(stock)
    }

    fn update_stock(
        &mut self,
        ticker: &str,
        name: Option<&str>,
        sector: Option<&str>,
    ) -> Result<bool, AlmError> {
        self.inner_mut().update_stock(ticker, name, sector)
    }

    fn delete_stock(&mut self, ticker: &str) -> Result<bool, AlmError> {
        self.inner_mut().delete_stock(ticker)
    }

    fn user_by_id(&self, id: UserId) -> Result<Option<User>, AlmError> {
        self.inner().user_by_id(id)
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, AlmError> {
        self.inner().user_by_email(email)
    }

    fn create_user(&mut self, user: NewUser) -> Result<UserId, AlmError> {
        self.inner_mut().create_user(user)
    }

    fn holdings(&self, user: UserId) -> Result<Vec<Holding>, AlmError> {
        self.inner().holdings(user)
    }

    fn put_holdings(&mut self, user: UserId, holdings: Vec<Holding>) -> Result<(), AlmError> {
        self.inner_mut().put_holdings(user, holdings)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Demo".to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
        }
    }

    #[test]
    fn initialize_stocks_seeds_only_once() {
        let mut db = Database::in_memory();
        assert_eq!(db.initialize_stocks().ok(), Some(5));
        assert_eq!(db.initialize_stocks().ok(), Some(0));
        assert_eq!(db.all_stocks().map(|s| s.len()).ok(), Some(5));
    }

    #[test]
    fn user_ids_start_at_one_and_emails_are_unique() {
        let mut db = Database::in_memory();
        assert_eq!(db.create_user(new_user("a@alm.com")).ok(), Some(UserId(1)));
        assert_eq!(db.create_user(new_user("b@alm.com")).ok(), Some(UserId(2)));
        assert!(matches!(
            db.create_user(new_user("a@alm.com")),
            Err(AlmError::Conflict(_))
        ));
    }

    #[test]
    fn portfolio_is_sorted_by_allocation_descending() {
        let mut db = Database::in_memory();
        db.initialize_stocks().ok();
        db.create_default_portfolio(UserId(1)).ok();

        let portfolio = db.user_portfolio(UserId(1)).unwrap_or_default();
        let tickers: Vec<&str> = portfolio.iter().map(|v| v.holding.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["PETR4.SA", "VALE3.SA", "ITUB4.SA", "BTC-USD", "WEGE3.SA"]);
        assert_eq!(portfolio[0].stock_name.as_deref(), Some("Petrobras PN"));
    }

    #[test]
    fn update_allocation_upserts() {
        let mut db = Database::in_memory();
        db.update_allocation(UserId(1), "PETR4.SA", 0.5).ok();
        db.update_allocation(UserId(1), "PETR4.SA", 0.35).ok();
        db.update_allocation(UserId(1), "VALE3.SA", 0.65).ok();

        let holdings = db.holdings(UserId(1)).unwrap_or_default();
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].allocation, 0.35);
        assert!(db.update_allocation(UserId(1), "VALE3.SA", 1.5).is_err());
    }

    #[test]
    fn removed_ticker_has_no_catalog_join() {
        let mut db = Database::in_memory();
        db.update_allocation(UserId(3), "XPTO3.SA", 0.2).ok();

        let portfolio = db.user_portfolio(UserId(3)).unwrap_or_default();
        assert_eq!(portfolio.len(), 1);
        assert!(portfolio[0].stock_name.is_none());

        assert_eq!(db.remove_from_portfolio(UserId(3), "XPTO3.SA").ok(), Some(true));
        assert_eq!(db.remove_from_portfolio(UserId(3), "XPTO3.SA").ok(), Some(false));
    }

    #[test]
    fn update_stock_requires_a_field() {
        let mut db = Database::in_memory();
        db.initialize_stocks().ok();
        assert_eq!(db.update_stock("WEGE3.SA", None, None).ok(), Some(false));
        assert_eq!(db.update_stock("WEGE3.SA", None, Some("Indústria")).ok(), Some(true));
        assert_eq!(
            db.stock("WEGE3.SA").ok().flatten().map(|s| s.sector),
            Some("Indústria".to_string())
        );
        assert_eq!(db.update_stock("NOPE3.SA", Some("x"), None).ok(), Some(false));
    }
}
