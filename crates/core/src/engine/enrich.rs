//! Column-enrichment engine.
//!
//! One call applies a batch of column definitions to a base table:
//! expressions first, then row-wise derivations, then lookup joins grouped
//! by reference table. Expressions and derivations only ever see columns
//! that existed before the batch's lookups ran; lookups are chained and
//! each one sees everything added before it, including earlier lookups of
//! the same group. Nothing is persisted unless the whole batch succeeds.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use polars::prelude::*;
use tracing::debug;

use crate::audit::AuditSink;
use crate::engine::definition::{ColumnDef, ColumnSpec, DeriveFn, LookupDef};
use crate::engine::error::EnrichError;
use crate::engine::expression::compile_expression;
use crate::engine::lookup::{execute_lookup, validate_lookup_group};
use crate::engine::row::RowSet;
use crate::store::{StoreError, TableStore};
use crate::value::series_from_values;

/// Apply `spec` to `base_table` and return the enriched frame.
///
/// When `base` is `None` the table is loaded from the store. Source tables
/// for lookups come from `source_overrides` first, then the store. With
/// `persist` the stored table is replaced with the result in one write.
pub fn enrich<S, A>(
    store: &S,
    audit: &A,
    base_table: &str,
    base: Option<DataFrame>,
    spec: &ColumnSpec,
    source_overrides: &HashMap<String, DataFrame>,
    persist: bool,
) -> Result<DataFrame, EnrichError>
where
    S: TableStore,
    A: AuditSink,
{
    let mut frame = match base {
        Some(frame) => frame,
        None => load_table(store, base_table)?,
    };

    let mut expressions: Vec<(&str, &str)> = Vec::new();
    let mut derivations: Vec<(&str, &DeriveFn)> = Vec::new();
    let mut lookup_groups: Vec<(&str, Vec<(&str, &LookupDef)>)> = Vec::new();
    for (column, definition) in spec.iter() {
        match definition {
            ColumnDef::Expression(source) => expressions.push((column.as_str(), source.as_str())),
            ColumnDef::Derived(function) => derivations.push((column.as_str(), function)),
            ColumnDef::Lookup(lookup) => {
                match lookup_groups
                    .iter_mut()
                    .find(|(table, _)| *table == lookup.source_table)
                {
                    Some((_, tasks)) => tasks.push((column.as_str(), lookup)),
                    None => lookup_groups
                        .push((lookup.source_table.as_str(), vec![(column.as_str(), lookup)])),
                }
            }
        }
    }

    for (column, source) in expressions {
        let started = Instant::now();
        let known = column_names(&frame);
        let expression = compile_expression(source, &known).map_err(|error| {
            EnrichError::Evaluation {
                expression: source.to_string(),
                detail: error.to_string(),
            }
        })?;
        frame = frame
            .lazy()
            .with_columns([expression.alias(column)])
            .collect()
            .map_err(|error| EnrichError::Evaluation {
                expression: source.to_string(),
                detail: error.to_string(),
            })?;
        debug!(
            column,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "expression column applied"
        );
    }

    for (column, function) in derivations {
        let started = Instant::now();
        let rows = RowSet::from_frame(&frame);
        let mut values = Vec::with_capacity(rows.height());
        for index in 0..rows.height() {
            let value = function(&rows.row(index)).map_err(|source| EnrichError::Function {
                column: column.to_string(),
                source,
            })?;
            values.push(value);
        }
        let series = series_from_values(column, &values)?;
        frame.with_column(series)?;
        debug!(
            column,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "derived column applied"
        );
    }

    for (source_table, tasks) in lookup_groups {
        let source = match source_overrides.get(source_table) {
            Some(frame) => frame.clone(),
            None => load_table(store, source_table)?,
        };
        validate_lookup_group(source_table, &source, &tasks)?;

        for (column, lookup) in tasks {
            let started = Instant::now();
            let (joined, unmatched) = execute_lookup(frame, &source, column, lookup, base_table)?;
            frame = joined;
            if let Some(entry) = unmatched {
                debug!(
                    column,
                    unmatched_rows = entry.unmatched_rows,
                    "lookup left unmatched rows"
                );
                audit.unmatched_join(&entry);
            }
            debug!(
                column,
                source_table,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "lookup column applied"
            );
        }
    }

    if persist {
        store
            .put(base_table, &frame)
            .map_err(EnrichError::Store)?;
        debug!(table = base_table, "enriched table persisted");
    }

    Ok(frame)
}

fn load_table<S: TableStore>(store: &S, name: &str) -> Result<DataFrame, EnrichError> {
    store.get(name).map_err(|error| match error {
        StoreError::TableNotFound { name } => EnrichError::TableNotFound { name },
        other => EnrichError::Store(other),
    })
}

fn column_names(frame: &DataFrame) -> HashSet<String> {
    frame
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}
