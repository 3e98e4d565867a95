use polars::prelude::{DataFrame, Series};

use crate::value::Value;

/// Column snapshot of a frame for row-wise iteration.
pub(crate) struct RowSet {
    columns: Vec<(String, Series)>,
    height: usize,
}

impl RowSet {
    pub fn from_frame(frame: &DataFrame) -> Self {
        Self {
            columns: frame
                .get_columns()
                .iter()
                .map(|column| {
                    (
                        column.name().to_string(),
                        column.as_materialized_series().clone(),
                    )
                })
                .collect(),
            height: frame.height(),
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn row(&self, index: usize) -> Row<'_> {
        Row {
            columns: &self.columns,
            index,
        }
    }
}

/// Read-only view of one row, handed to derivation functions.
pub struct Row<'a> {
    columns: &'a [(String, Series)],
    index: usize,
}

impl Row<'_> {
    /// Cell value; `None` when the column does not exist.
    pub fn get(&self, column: &str) -> Option<Value> {
        let (_, series) = self.columns.iter().find(|(name, _)| name == column)?;
        series.get(self.index).ok().map(Value::from)
    }

    /// Cell rendered as text; nulls and missing columns render empty.
    pub fn text(&self, column: &str) -> String {
        self.get(column).unwrap_or(Value::Null).to_string()
    }

    /// Numeric cell; nulls, text and missing columns count as zero.
    pub fn number(&self, column: &str) -> f64 {
        self.get(column)
            .and_then(|value| value.as_f64())
            .unwrap_or(0.0)
    }

    /// True when the column is absent or the cell is null.
    pub fn is_null(&self, column: &str) -> bool {
        self.get(column).map_or(true, |value| value.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::df;

    #[test]
    fn row_accessors() {
        let frame = df!(
            "Articulo" => &["10074A", "2001"],
            "qty" => &[Some(3.5f64), None],
        )
        .unwrap();
        let rows = RowSet::from_frame(&frame);
        assert_eq!(rows.height(), 2);

        let first = rows.row(0);
        assert_eq!(first.text("Articulo"), "10074A");
        assert_eq!(first.number("qty"), 3.5);
        assert!(!first.is_null("qty"));

        let second = rows.row(1);
        assert!(second.is_null("qty"));
        assert_eq!(second.number("qty"), 0.0);
        assert_eq!(second.text("missing"), "");
        assert!(second.get("missing").is_none());
    }
}
