//! Persistent table storage.
//!
//! Tables are named rectangular datasets; the store is a flat namespace
//! with whole-table reads and replace-writes only. `SqliteStore` is the
//! production backend; tests use an in-memory fixture behind the same
//! trait.

mod sqlite;

pub use sqlite::SqliteStore;

use std::collections::BTreeMap;

use polars::prelude::{DataFrame, PolarsError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table '{name}' does not exist")]
    TableNotFound { name: String },

    #[error("invalid table name '{name}'")]
    InvalidTableName { name: String },

    #[error("unsupported column type {dtype} for column '{column}' in table '{table}'")]
    UnsupportedColumnType {
        table: String,
        column: String,
        dtype: String,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("dataframe operation failed: {0}")]
    Frame(#[from] PolarsError),
}

pub trait TableStore {
    /// Fetch one table. Fails with `TableNotFound` if absent.
    fn get(&self, name: &str) -> Result<DataFrame, StoreError>;

    /// Replace (or create) a table. The replace appears atomic to readers
    /// of this store handle.
    fn put(&self, name: &str, frame: &DataFrame) -> Result<(), StoreError>;

    /// Append rows to a table, creating it if absent.
    fn append(&self, name: &str, frame: &DataFrame) -> Result<(), StoreError>;

    /// Remove a table. Fails with `TableNotFound` if absent. Operator
    /// confirmation is the caller's concern, not the store's.
    fn drop_table(&self, name: &str) -> Result<(), StoreError>;

    fn exists(&self, name: &str) -> Result<bool, StoreError>;

    /// User table names, internal tables excluded.
    fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Fetch several tables, all-or-nothing: every name is validated
    /// before any data is read.
    fn get_many(&self, names: &[&str]) -> Result<BTreeMap<String, DataFrame>, StoreError> {
        for name in names {
            if !self.exists(name)? {
                return Err(StoreError::TableNotFound {
                    name: (*name).to_string(),
                });
            }
        }
        let mut tables = BTreeMap::new();
        for name in names {
            tables.insert((*name).to_string(), self.get(name)?);
        }
        Ok(tables)
    }
}
