#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;

use polars::prelude::DataFrame;
use ventisca_core::audit::{AuditSink, UnmatchedJoin};
use ventisca_core::store::{StoreError, TableStore};

/// Map-backed store for engine tests; same contract as `SqliteStore`.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RefCell<BTreeMap<String, DataFrame>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: &str, frame: DataFrame) -> Self {
        self.tables.borrow_mut().insert(name.to_string(), frame);
        self
    }
}

impl TableStore for InMemoryStore {
    fn get(&self, name: &str) -> Result<DataFrame, StoreError> {
        self.tables
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::TableNotFound {
                name: name.to_string(),
            })
    }

    fn put(&self, name: &str, frame: &DataFrame) -> Result<(), StoreError> {
        self.tables
            .borrow_mut()
            .insert(name.to_string(), frame.clone());
        Ok(())
    }

    fn append(&self, name: &str, frame: &DataFrame) -> Result<(), StoreError> {
        let mut tables = self.tables.borrow_mut();
        match tables.get_mut(name) {
            Some(existing) => {
                existing.vstack_mut(frame)?;
            }
            None => {
                tables.insert(name.to_string(), frame.clone());
            }
        }
        Ok(())
    }

    fn drop_table(&self, name: &str) -> Result<(), StoreError> {
        self.tables
            .borrow_mut()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::TableNotFound {
                name: name.to_string(),
            })
    }

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.tables.borrow().contains_key(name))
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.tables.borrow().keys().cloned().collect())
    }
}

/// Audit sink that remembers every entry for assertions.
#[derive(Default)]
pub struct RecordingAudit {
    pub entries: RefCell<Vec<UnmatchedJoin>>,
}

impl RecordingAudit {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl AuditSink for RecordingAudit {
    fn unmatched_join(&self, entry: &UnmatchedJoin) {
        self.entries.borrow_mut().push(entry.clone());
    }
}
