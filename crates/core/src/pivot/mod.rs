//! Cross-tabulation of a flat table.
//!
//! Groups rows by the row-key columns, spreads the distinct column-key
//! combinations into one output column per `(value, combination)` pair and
//! aggregates the value columns into the cells. The output is a plain
//! rectangular frame: no hierarchical headers, empty cells filled with
//! zero.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::store::{StoreError, TableStore};
use crate::value::{series_from_values, Value};

#[derive(Debug, Error)]
pub enum PivotError {
    #[error("table '{name}' not found")]
    TableNotFound { name: String },

    #[error("column '{column}' not found in pivot input")]
    ColumnNotFound { column: String },

    #[error("unknown aggregator '{0}'")]
    UnknownAggregator(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("dataframe operation failed: {0}")]
    Frame(#[from] PolarsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregator {
    #[default]
    Sum,
    Count,
    Mean,
    Min,
    Max,
}

impl Aggregator {
    fn expr(&self, column: &str) -> Expr {
        match self {
            Aggregator::Sum => col(column).sum(),
            Aggregator::Count => col(column).count().cast(DataType::Int64),
            Aggregator::Mean => col(column).mean(),
            Aggregator::Min => col(column).min(),
            Aggregator::Max => col(column).max(),
        }
    }
}

impl FromStr for Aggregator {
    type Err = PivotError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "sum" => Ok(Aggregator::Sum),
            "count" => Ok(Aggregator::Count),
            "mean" | "avg" => Ok(Aggregator::Mean),
            "min" => Ok(Aggregator::Min),
            "max" => Ok(Aggregator::Max),
            other => Err(PivotError::UnknownAggregator(other.to_string())),
        }
    }
}

/// Declarative pivot request; deserializable so manual pivots can be driven
/// from a YAML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PivotSpec {
    /// Row-key columns of the cross-tabulation.
    pub rows: Vec<String>,
    /// Column-key columns; their distinct value combinations become output
    /// columns. May be empty, in which case the pivot is a plain group-by.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Value columns to aggregate into the cells.
    pub values: Vec<String>,
    /// Row filters applied before aggregation: column -> allowed values.
    #[serde(default)]
    pub filters: BTreeMap<String, Vec<Value>>,
    #[serde(default)]
    pub aggregator: Aggregator,
}

/// Cross-tabulate `frame` according to `spec`.
pub fn pivot(frame: &DataFrame, spec: &PivotSpec) -> Result<DataFrame, PivotError> {
    let present: BTreeSet<&str> = frame
        .get_column_names()
        .iter()
        .map(|name| name.as_str())
        .collect();
    for column in spec
        .rows
        .iter()
        .chain(spec.columns.iter())
        .chain(spec.values.iter())
        .chain(spec.filters.keys())
    {
        if !present.contains(column.as_str()) {
            return Err(PivotError::ColumnNotFound {
                column: column.clone(),
            });
        }
    }

    let mut lazy = frame.clone().lazy();
    for (column, allowed) in &spec.filters {
        let Some(filter) = allowed
            .iter()
            .map(|value| filter_term(column, value))
            .reduce(|left, right| left.or(right))
        else {
            continue;
        };
        lazy = lazy.filter(filter);
    }

    let group_keys: Vec<Expr> = spec
        .rows
        .iter()
        .chain(spec.columns.iter())
        .map(|column| col(column.as_str()))
        .collect();
    let aggregations: Vec<Expr> = spec
        .values
        .iter()
        .map(|value| spec.aggregator.expr(value))
        .collect();
    let flat = lazy.group_by(group_keys).agg(aggregations).collect()?;

    reshape(&flat, spec)
}

/// Pivot a stored table and persist the result under `output_name`.
pub fn pivot_to_store<S: TableStore>(
    store: &S,
    table: &str,
    spec: &PivotSpec,
    output_name: &str,
) -> Result<DataFrame, PivotError> {
    let frame = store.get(table).map_err(|error| match error {
        StoreError::TableNotFound { name } => PivotError::TableNotFound { name },
        other => PivotError::Store(other),
    })?;
    let pivoted = pivot(&frame, spec)?;
    store.put(output_name, &pivoted)?;
    debug!(
        table,
        output = output_name,
        rows = pivoted.height(),
        "pivot persisted"
    );
    Ok(pivoted)
}

fn filter_term(column: &str, value: &Value) -> Expr {
    match value {
        Value::Null => col(column).is_null(),
        Value::Bool(v) => col(column).eq(lit(*v)),
        Value::Int(v) => col(column).eq(lit(*v)),
        Value::Float(v) => col(column).eq(lit(*v)),
        Value::Str(v) => col(column).eq(lit(v.as_str())),
    }
}

fn reshape(flat: &DataFrame, spec: &PivotSpec) -> Result<DataFrame, PivotError> {
    let row_series = materialize(flat, &spec.rows)?;
    let column_series = materialize(flat, &spec.columns)?;
    let value_series = materialize(flat, &spec.values)?;

    // Composite row key -> its key cell values, sorted by the composite so
    // the output ordering is deterministic.
    let mut rows_by_key: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    let mut combos: BTreeSet<String> = BTreeSet::new();
    let mut cells: HashMap<(String, String, usize), f64> = HashMap::new();

    for index in 0..flat.height() {
        let key_values = row_values(&row_series, index)?;
        let composite = key_values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\u{1f}");
        let combo = row_values(&column_series, index)?
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("_");

        rows_by_key.entry(composite.clone()).or_insert(key_values);
        combos.insert(combo.clone());
        for (value_index, series) in value_series.iter().enumerate() {
            let cell = cell_number(series.get(index)?);
            cells.insert((composite.clone(), combo.clone(), value_index), cell);
        }
    }

    let mut output: Vec<Column> = Vec::new();
    for (index, name) in spec.rows.iter().enumerate() {
        let values: Vec<Value> = rows_by_key
            .values()
            .map(|key_values| key_values[index].clone())
            .collect();
        output.push(series_from_values(name, &values)?.into());
    }
    for (value_index, value_name) in spec.values.iter().enumerate() {
        for combo in &combos {
            let column_name = if combo.is_empty() {
                value_name.clone()
            } else {
                format!("{value_name}_{combo}")
            };
            let numbers: Vec<f64> = rows_by_key
                .keys()
                .map(|composite| {
                    cells
                        .get(&(composite.clone(), combo.clone(), value_index))
                        .copied()
                        .unwrap_or(0.0)
                })
                .collect();
            output.push(Series::new(column_name.as_str().into(), numbers).into());
        }
    }

    Ok(DataFrame::new(output)?)
}

fn materialize<'a>(
    frame: &'a DataFrame,
    columns: &[String],
) -> Result<Vec<&'a Series>, PivotError> {
    columns
        .iter()
        .map(|name| Ok(frame.column(name.as_str())?.as_materialized_series()))
        .collect()
}

fn row_values(series: &[&Series], index: usize) -> Result<Vec<Value>, PivotError> {
    series
        .iter()
        .map(|column| Ok(Value::from(column.get(index)?)))
        .collect()
}

fn cell_number(value: AnyValue) -> f64 {
    match value {
        AnyValue::Int8(v) => v as f64,
        AnyValue::Int16(v) => v as f64,
        AnyValue::Int32(v) => v as f64,
        AnyValue::Int64(v) => v as f64,
        AnyValue::UInt8(v) => v as f64,
        AnyValue::UInt16(v) => v as f64,
        AnyValue::UInt32(v) => v as f64,
        AnyValue::UInt64(v) => v as f64,
        AnyValue::Float32(v) => v as f64,
        AnyValue::Float64(v) => v,
        AnyValue::Boolean(v) => v as u8 as f64,
        _ => 0.0,
    }
}
