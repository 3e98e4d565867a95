use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::row::Row;
use crate::value::Value;

/// Row-wise derivation: pure function from a row view to a new cell.
pub type DeriveFn = Arc<dyn Fn(&Row<'_>) -> anyhow::Result<Value> + Send + Sync>;

/// Left-outer lookup from the enriched table into a reference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupDef {
    /// Reference table holding the values to bring in.
    pub source_table: String,
    /// Key column in the reference table.
    pub join_on: String,
    /// Key column in the enriched table; defaults to `join_on`.
    #[serde(default)]
    pub join_target: Option<String>,
    /// Value column in the reference table; defaults to the new column's
    /// name.
    #[serde(default)]
    pub source_column: Option<String>,
}

impl LookupDef {
    pub fn new(source_table: impl Into<String>, join_on: impl Into<String>) -> Self {
        Self {
            source_table: source_table.into(),
            join_on: join_on.into(),
            join_target: None,
            source_column: None,
        }
    }

    pub fn target(mut self, join_target: impl Into<String>) -> Self {
        self.join_target = Some(join_target.into());
        self
    }

    pub fn column(mut self, source_column: impl Into<String>) -> Self {
        self.source_column = Some(source_column.into());
        self
    }

    pub fn join_target(&self) -> &str {
        self.join_target.as_deref().unwrap_or(&self.join_on)
    }

    pub fn source_column<'a>(&'a self, new_column: &'a str) -> &'a str {
        self.source_column.as_deref().unwrap_or(new_column)
    }
}

/// One column definition, discriminated explicitly.
#[derive(Clone)]
pub enum ColumnDef {
    /// Formula over existing columns, evaluated per row.
    Expression(String),
    /// Left-outer lookup into a reference table.
    Lookup(LookupDef),
    /// Row-wise derivation function.
    Derived(DeriveFn),
}

impl fmt::Debug for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnDef::Expression(source) => f.debug_tuple("Expression").field(source).finish(),
            ColumnDef::Lookup(lookup) => f.debug_tuple("Lookup").field(lookup).finish(),
            ColumnDef::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// Ordered set of column definitions for one enrichment call.
///
/// Insertion order is preserved; if two definitions target the same column
/// name, the later one wins.
#[derive(Debug, Clone, Default)]
pub struct ColumnSpec {
    definitions: Vec<(String, ColumnDef)>,
}

impl ColumnSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(mut self, column: impl Into<String>, definition: ColumnDef) -> Self {
        self.definitions.push((column.into(), definition));
        self
    }

    pub fn expression(self, column: impl Into<String>, source: impl Into<String>) -> Self {
        self.define(column, ColumnDef::Expression(source.into()))
    }

    pub fn lookup(self, column: impl Into<String>, lookup: LookupDef) -> Self {
        self.define(column, ColumnDef::Lookup(lookup))
    }

    pub fn derived<F>(self, column: impl Into<String>, function: F) -> Self
    where
        F: Fn(&Row<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.define(column, ColumnDef::Derived(Arc::new(function)))
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, ColumnDef)> {
        self.definitions.iter()
    }
}
