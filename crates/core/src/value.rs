use std::fmt;

use polars::prelude::{AnyValue, PolarsResult, Series};
use serde::{Deserialize, Serialize};

/// Owned scalar cell value.
///
/// Bridges polars `AnyValue` rows, SQLite storage classes, derivation
/// function results and pivot filter literals. Untagged so YAML filter
/// lists read as plain scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view; `None` for nulls, booleans and text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub(crate) fn to_any_value(&self) -> AnyValue<'static> {
        match self {
            Value::Null => AnyValue::Null,
            Value::Bool(value) => AnyValue::Boolean(*value),
            Value::Int(value) => AnyValue::Int64(*value),
            Value::Float(value) => AnyValue::Float64(*value),
            Value::Str(value) => AnyValue::StringOwned(value.as_str().into()),
        }
    }
}

impl fmt::Display for Value {
    /// Nulls render empty; everything else renders as the bare scalar.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Str(value) => write!(f, "{value}"),
        }
    }
}

impl From<AnyValue<'_>> for Value {
    fn from(value: AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => Value::Null,
            AnyValue::Boolean(v) => Value::Bool(v),
            AnyValue::Int8(v) => Value::Int(v as i64),
            AnyValue::Int16(v) => Value::Int(v as i64),
            AnyValue::Int32(v) => Value::Int(v as i64),
            AnyValue::Int64(v) => Value::Int(v),
            AnyValue::UInt8(v) => Value::Int(v as i64),
            AnyValue::UInt16(v) => Value::Int(v as i64),
            AnyValue::UInt32(v) => Value::Int(v as i64),
            AnyValue::UInt64(v) => Value::Int(v as i64),
            AnyValue::Float32(v) => Value::Float(v as f64),
            AnyValue::Float64(v) => Value::Float(v),
            AnyValue::String(v) => Value::Str(v.to_string()),
            AnyValue::StringOwned(v) => Value::Str(v.to_string()),
            other => Value::Str(other.to_string()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

/// Build a Series from owned scalars, letting polars unify the dtype
/// (mixed int/float widens to float, anything mixed with text becomes text).
pub(crate) fn series_from_values(name: &str, values: &[Value]) -> PolarsResult<Series> {
    let any_values: Vec<AnyValue> = values.iter().map(Value::to_any_value).collect();
    Series::from_any_values(name.into(), &any_values, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_nulls_empty() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Str("G601".to_string()).to_string(), "G601");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(2024.0).to_string(), "2024");
    }

    #[test]
    fn any_value_round_trip() {
        let value = Value::from(AnyValue::Int32(7));
        assert_eq!(value, Value::Int(7));
        assert_eq!(value.to_any_value(), AnyValue::Int64(7));
    }

    #[test]
    fn series_unifies_int_and_float() {
        let series = series_from_values(
            "mixed",
            &[Value::Int(1), Value::Float(2.5), Value::Null],
        )
        .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.dtype(), &polars::prelude::DataType::Float64);
    }
}
