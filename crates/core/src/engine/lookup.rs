//! Lookup-join execution.
//!
//! Each lookup left-joins the enriched frame against the deduplicated
//! `(join_on, source_column)` projection of its reference table. A key
//! mapped to several distinct values stays duplicated and multiplies the
//! matching base rows.

use std::collections::HashSet;

use polars::prelude::*;

use crate::audit::UnmatchedJoin;
use crate::engine::definition::LookupDef;
use crate::engine::error::EnrichError;
use crate::value::Value;

/// Internal alias for the projected join key; dropped again after the join.
const LOOKUP_KEY: &str = "__lookup_key";

/// Validate every `join_on` / `source_column` of a merge-task group against
/// the source schema before any join in the group runs.
pub(crate) fn validate_lookup_group(
    source_table: &str,
    source: &DataFrame,
    tasks: &[(&str, &LookupDef)],
) -> Result<(), EnrichError> {
    let columns: HashSet<&str> = source
        .get_column_names()
        .iter()
        .map(|name| name.as_str())
        .collect();
    for (column, lookup) in tasks {
        if !columns.contains(lookup.join_on.as_str()) {
            return Err(EnrichError::MissingColumn {
                table: source_table.to_string(),
                column: lookup.join_on.clone(),
            });
        }
        let source_column = lookup.source_column(column);
        if !columns.contains(source_column) {
            return Err(EnrichError::MissingColumn {
                table: source_table.to_string(),
                column: source_column.to_string(),
            });
        }
    }
    Ok(())
}

/// Run one lookup against the current frame. Returns the joined frame and,
/// when any base row found no match, the audit record for it.
pub(crate) fn execute_lookup(
    frame: DataFrame,
    source: &DataFrame,
    column: &str,
    lookup: &LookupDef,
    target_table: &str,
) -> Result<(DataFrame, Option<UnmatchedJoin>), EnrichError> {
    let join_target = lookup.join_target();
    let source_column = lookup.source_column(column);

    if !frame
        .get_column_names()
        .iter()
        .any(|name| name.as_str() == join_target)
    {
        return Err(EnrichError::MissingColumn {
            table: target_table.to_string(),
            column: join_target.to_string(),
        });
    }

    // Distinct (join_on, source_column) pairs, via a key-only group-by.
    let projection = source
        .clone()
        .lazy()
        .select([
            col(lookup.join_on.as_str()).alias(LOOKUP_KEY),
            col(source_column).alias(column),
        ])
        .group_by([col(LOOKUP_KEY), col(column)])
        .agg([len().alias("__pair_count")])
        .select([col(LOOKUP_KEY), col(column)]);

    // Last write wins: an existing column of the same name is replaced.
    let base = if frame
        .get_column_names()
        .iter()
        .any(|name| name.as_str() == column)
    {
        frame.drop(column)?
    } else {
        frame
    };

    let mut joined = base
        .lazy()
        .join(
            projection,
            [col(join_target)],
            [col(LOOKUP_KEY)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;
    if joined
        .get_column_names()
        .iter()
        .any(|name| name.as_str() == LOOKUP_KEY)
    {
        joined = joined.drop(LOOKUP_KEY)?;
    }

    let unmatched = collect_unmatched(&joined, column, join_target, lookup, target_table)?;
    Ok((joined, unmatched))
}

fn collect_unmatched(
    frame: &DataFrame,
    column: &str,
    join_target: &str,
    lookup: &LookupDef,
    target_table: &str,
) -> Result<Option<UnmatchedJoin>, EnrichError> {
    let new_column = frame.column(column)?.as_materialized_series();
    let keys = frame.column(join_target)?.as_materialized_series();

    let mut seen = HashSet::new();
    let mut distinct = Vec::new();
    let mut unmatched_rows = 0usize;
    for index in 0..frame.height() {
        if !matches!(new_column.get(index)?, AnyValue::Null) {
            continue;
        }
        unmatched_rows += 1;
        let key = Value::from(keys.get(index)?).to_string();
        if seen.insert(key.clone()) {
            distinct.push(key);
        }
    }

    if unmatched_rows == 0 {
        return Ok(None);
    }
    Ok(Some(UnmatchedJoin {
        table: target_table.to_string(),
        column: column.to_string(),
        source_table: lookup.source_table.clone(),
        join_key: join_target.to_string(),
        unmatched_rows,
        unmatched_keys: distinct,
    }))
}
