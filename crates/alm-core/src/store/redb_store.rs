//! # redb-backed Store
//!
//! A disk-backed store using the redb embedded database, providing:
//! - ACID transactions (one write transaction per mutation)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Records are encoded with postcard.

use super::{AlmStore, NewUser};
use crate::{AlmError, Holding, Stock, User, UserId};
use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

/// Table for users: UserId(u64) -> serialized User bytes
const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

/// Table for the email index: email -> UserId(u64)
const USER_EMAILS: TableDefinition<&str, u64> = TableDefinition::new("user_emails");

/// Table for the catalog: ticker -> serialized Stock bytes
const STOCKS: TableDefinition<&str, &[u8]> = TableDefinition::new("stocks");

/// Table for portfolios: UserId(u64) -> serialized Vec<Holding> bytes
const HOLDINGS: TableDefinition<u64, &[u8]> = TableDefinition::new("holdings");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

fn storage_err(e: impl std::fmt::Display) -> AlmError {
    AlmError::Storage(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, AlmError> {
    postcard::to_allocvec(value).map_err(|e| AlmError::Serialization(e.to_string()))
}

fn decode<'a, T: serde::Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, AlmError> {
    postcard::from_bytes(bytes).map_err(|e| AlmError::Serialization(e.to_string()))
}

/// A disk-backed store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AlmError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(storage_err)?;
            let _ = write_txn.open_table(USERS).map_err(storage_err)?;
            let _ = write_txn.open_table(USER_EMAILS).map_err(storage_err)?;
            let _ = write_txn.open_table(STOCKS).map_err(storage_err)?;
            let _ = write_txn.open_table(HOLDINGS).map_err(storage_err)?;
            let _ = write_txn.open_table(METADATA).map_err(storage_err)?;
            write_txn.commit().map_err(storage_err)?;
        }

        Ok(Self { db })
    }
}

impl AlmStore for RedbStore {
    fn all_stocks(&self) -> Result<Vec<Stock>, AlmError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(STOCKS).map_err(storage_err)?;

        let mut stocks = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            stocks.push(decode::<Stock>(value.value())?);
        }
        Ok(stocks)
    }

    fn stock(&self, ticker: &str) -> Result<Option<Stock>, AlmError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(STOCKS).map_err(storage_err)?;

        match table.get(ticker).map_err(storage_err)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    fn create_stock(&mut self, stock: Stock) -> Result<bool, AlmError> {
        let bytes = encode(&stock)?;
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let inserted = {
            let mut table = write_txn.open_table(STOCKS).map_err(storage_err)?;
            let exists = table.get(stock.ticker.as_str()).map_err(storage_err)?.is_some();
            if !exists {
                table
                    .insert(stock.ticker.as_str(), bytes.as_slice())
                    .map_err(storage_err)?;
            }
            !exists
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(inserted)
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

        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let updated = {
            let mut table = write_txn.open_table(STOCKS).map_err(storage_err)?;
            let current: Option<Stock> = match table.get(ticker).map_err(storage_err)? {
                Some(data) => Some(decode(data.value())?),
                None => None,
            };
            match current {
                Some(mut stock) => {
                    if let Some(name) = name {
                        stock.name = name.to_string();
                    }
                    if let Some(sector) = sector {
                        stock.sector = sector.to_string();
                    }
                    let bytes = encode(&stock)?;
                    table.insert(ticker, bytes.as_slice()).map_err(storage_err)?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(updated)
    }

    fn delete_stock(&mut self, ticker: &str) -> Result<bool, AlmError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let removed = {
            let mut table = write_txn.open_table(STOCKS).map_err(storage_err)?;
            table.remove(ticker).map_err(storage_err)?.is_some()
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(removed)
    }

    fn user_by_id(&self, id: UserId) -> Result<Option<User>, AlmError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(USERS).map_err(storage_err)?;

        match table.get(id.0).map_err(storage_err)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, AlmError> {
        let id = {
            let read_txn = self.db.begin_read().map_err(storage_err)?;
            let index = read_txn.open_table(USER_EMAILS).map_err(storage_err)?;
            index.get(email).map_err(storage_err)?.map(|v| v.value())
        };
        match id {
            Some(id) => self.user_by_id(UserId(id)),
            None => Ok(None),
        }
    }

    fn create_user(&mut self, user: NewUser) -> Result<UserId, AlmError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let id = {
            let mut index = write_txn.open_table(USER_EMAILS).map_err(storage_err)?;
            if index.get(user.email.as_str()).map_err(storage_err)?.is_some() {
                return Err(AlmError::Conflict(format!(
                    "email {} already registered",
                    user.email
                )));
            }

            let mut meta = write_txn.open_table(METADATA).map_err(storage_err)?;
            let last = meta
                .get("last_user_id")
                .map_err(storage_err)?
                .map(|v| v.value())
                .unwrap_or(0);
            let id = UserId(last.saturating_add(1));

            let record = User {
                id,
                email: user.email,
                name: user.name,
                password_hash: user.password_hash,
                role: user.role,
                created_at: Utc::now(),
            };
            let bytes = encode(&record)?;

            let mut users = write_txn.open_table(USERS).map_err(storage_err)?;
            users.insert(id.0, bytes.as_slice()).map_err(storage_err)?;
            index
                .insert(record.email.as_str(), id.0)
                .map_err(storage_err)?;
            meta.insert("last_user_id", id.0).map_err(storage_err)?;
            id
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(id)
    }

    fn holdings(&self, user: UserId) -> Result<Vec<Holding>, AlmError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(HOLDINGS).map_err(storage_err)?;

        match table.get(user.0).map_err(storage_err)? {
            Some(data) => decode(data.value()),
            None => Ok(Vec::new()),
        }
    }

    fn put_holdings(&mut self, user: UserId, holdings: Vec<Holding>) -> Result<(), AlmError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(HOLDINGS).map_err(storage_err)?;
            if holdings.is_empty() {
                table.remove(user.0).map_err(storage_err)?;
            } else {
                let bytes = encode(&holdings)?;
                table.insert(user.0, bytes.as_slice()).map_err(storage_err)?;
            }
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }
}
