use std::path::Path;
use std::sync::LazyLock;

use polars::prelude::{AnyValue, Column, DataFrame, DataType, Series};
use regex::Regex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use tracing::debug;

use crate::store::{StoreError, TableStore};

/// Names we are willing to splice into SQL identifiers.
static TABLE_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("invalid table-name regex"));

/// Embedded SQLite table store.
///
/// Owns its connection: opened once at construction, closed when the store
/// is dropped. Single-writer by assumption; there is no cross-process
/// locking beyond what SQLite itself provides.
pub struct SqliteStore {
    connection: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let connection = Connection::open(path)?;
        connection.execute_batch("PRAGMA journal_mode = WAL;")?;
        Ok(Self { connection })
    }

    /// Private throwaway database, handy in tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            connection: Connection::open_in_memory()?,
        })
    }

    fn ensure_valid_name(name: &str) -> Result<(), StoreError> {
        if TABLE_NAME_PATTERN.is_match(name) {
            Ok(())
        } else {
            Err(StoreError::InvalidTableName {
                name: name.to_string(),
            })
        }
    }
}

impl TableStore for SqliteStore {
    fn get(&self, name: &str) -> Result<DataFrame, StoreError> {
        Self::ensure_valid_name(name)?;
        if !self.exists(name)? {
            return Err(StoreError::TableNotFound {
                name: name.to_string(),
            });
        }

        let mut statement = self.connection.prepare(&format!("SELECT * FROM \"{name}\""))?;
        let column_names: Vec<String> = statement
            .column_names()
            .iter()
            .map(|column| column.to_string())
            .collect();
        let mut columns: Vec<Vec<AnyValue<'static>>> = vec![Vec::new(); column_names.len()];

        let mut rows = statement.query([])?;
        while let Some(row) = rows.next()? {
            for (index, values) in columns.iter_mut().enumerate() {
                values.push(match row.get_ref(index)? {
                    ValueRef::Null => AnyValue::Null,
                    ValueRef::Integer(value) => AnyValue::Int64(value),
                    ValueRef::Real(value) => AnyValue::Float64(value),
                    ValueRef::Text(text) => {
                        AnyValue::StringOwned(String::from_utf8_lossy(text).into_owned().into())
                    }
                    ValueRef::Blob(_) => {
                        return Err(StoreError::UnsupportedColumnType {
                            table: name.to_string(),
                            column: column_names[index].clone(),
                            dtype: "BLOB".to_string(),
                        })
                    }
                });
            }
        }

        let series = column_names
            .iter()
            .zip(&columns)
            .map(|(column, values)| Series::from_any_values(column.as_str().into(), values, false))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DataFrame::new(series.into_iter().map(Column::from).collect())?)
    }

    fn put(&self, name: &str, frame: &DataFrame) -> Result<(), StoreError> {
        Self::ensure_valid_name(name)?;
        let transaction = self.connection.unchecked_transaction()?;
        transaction.execute_batch(&format!("DROP TABLE IF EXISTS \"{name}\""))?;
        create_table(&transaction, name, frame)?;
        insert_rows(&transaction, name, frame)?;
        transaction.commit()?;
        debug!(table = name, rows = frame.height(), "table replaced");
        Ok(())
    }

    fn append(&self, name: &str, frame: &DataFrame) -> Result<(), StoreError> {
        Self::ensure_valid_name(name)?;
        if !self.exists(name)? {
            return self.put(name, frame);
        }
        let transaction = self.connection.unchecked_transaction()?;
        insert_rows(&transaction, name, frame)?;
        transaction.commit()?;
        debug!(table = name, rows = frame.height(), "rows appended");
        Ok(())
    }

    fn drop_table(&self, name: &str) -> Result<(), StoreError> {
        Self::ensure_valid_name(name)?;
        if !self.exists(name)? {
            return Err(StoreError::TableNotFound {
                name: name.to_string(),
            });
        }
        self.connection
            .execute_batch(&format!("DROP TABLE \"{name}\""))?;
        debug!(table = name, "table dropped");
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        let found = self
            .connection
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut statement = self.connection.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = statement
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(table: &str, column: &str, dtype: &DataType) -> Result<&'static str, StoreError> {
    match dtype {
        DataType::Boolean
        | DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => Ok("INTEGER"),
        DataType::Float32 | DataType::Float64 => Ok("REAL"),
        // An all-null column has no better storage class than TEXT.
        DataType::String | DataType::Null => Ok("TEXT"),
        other => Err(StoreError::UnsupportedColumnType {
            table: table.to_string(),
            column: column.to_string(),
            dtype: format!("{other:?}"),
        }),
    }
}

fn create_table(connection: &Connection, name: &str, frame: &DataFrame) -> Result<(), StoreError> {
    let columns = frame
        .get_columns()
        .iter()
        .map(|column| {
            let storage = sql_type(name, column.name().as_str(), column.dtype())?;
            Ok(format!(
                "{} {storage}",
                quote_identifier(column.name().as_str())
            ))
        })
        .collect::<Result<Vec<_>, StoreError>>()?
        .join(", ");
    connection.execute_batch(&format!("CREATE TABLE \"{name}\" ({columns})"))?;
    Ok(())
}

fn insert_rows(connection: &Connection, name: &str, frame: &DataFrame) -> Result<(), StoreError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Ok(());
    }

    let column_list = frame
        .get_columns()
        .iter()
        .map(|column| quote_identifier(column.name().as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=frame.width())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut statement = connection.prepare(&format!(
        "INSERT INTO \"{name}\" ({column_list}) VALUES ({placeholders})"
    ))?;

    for row in 0..frame.height() {
        let mut values = Vec::with_capacity(frame.width());
        for column in frame.get_columns() {
            let cell = column.as_materialized_series().get(row)?;
            values.push(sql_value(cell, name, column.name().as_str())?);
        }
        statement.execute(params_from_iter(values))?;
    }
    Ok(())
}

fn sql_value(value: AnyValue, table: &str, column: &str) -> Result<SqlValue, StoreError> {
    Ok(match value {
        AnyValue::Null => SqlValue::Null,
        AnyValue::Boolean(v) => SqlValue::Integer(v as i64),
        AnyValue::Int8(v) => SqlValue::Integer(v as i64),
        AnyValue::Int16(v) => SqlValue::Integer(v as i64),
        AnyValue::Int32(v) => SqlValue::Integer(v as i64),
        AnyValue::Int64(v) => SqlValue::Integer(v),
        AnyValue::UInt8(v) => SqlValue::Integer(v as i64),
        AnyValue::UInt16(v) => SqlValue::Integer(v as i64),
        AnyValue::UInt32(v) => SqlValue::Integer(v as i64),
        AnyValue::UInt64(v) => SqlValue::Integer(v as i64),
        AnyValue::Float32(v) => SqlValue::Real(v as f64),
        AnyValue::Float64(v) => SqlValue::Real(v),
        AnyValue::String(v) => SqlValue::Text(v.to_string()),
        AnyValue::StringOwned(v) => SqlValue::Text(v.to_string()),
        other => {
            return Err(StoreError::UnsupportedColumnType {
                table: table.to_string(),
                column: column.to_string(),
                dtype: format!("{:?}", other.dtype()),
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::df;

    fn sample_frame() -> DataFrame {
        df!(
            "Centro" => &["G601", "ZSER", "G709"],
            "PAIS_2" => &["GUATEMALA", "EL SALVADOR", "HONDURAS"],
            "CENTRO_ID" => &[601i64, 930, 709],
        )
        .unwrap()
    }

    #[test]
    fn put_get_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put("CENTROS", &sample_frame()).unwrap();

        let fetched = store.get("CENTROS").unwrap();
        assert_eq!(fetched.shape(), (3, 3));
        assert_eq!(
            fetched
                .column("PAIS_2")
                .unwrap()
                .str()
                .unwrap()
                .into_no_null_iter()
                .collect::<Vec<_>>(),
            vec!["GUATEMALA", "EL SALVADOR", "HONDURAS"]
        );
        assert_eq!(
            fetched.column("CENTRO_ID").unwrap().dtype(),
            &DataType::Int64
        );
    }

    #[test]
    fn put_replaces_existing_table() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put("CENTROS", &sample_frame()).unwrap();
        let smaller = df!("Centro" => &["G601"]).unwrap();
        store.put("CENTROS", &smaller).unwrap();

        let fetched = store.get("CENTROS").unwrap();
        assert_eq!(fetched.shape(), (1, 1));
    }

    #[test]
    fn get_missing_table_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        match store.get("NOPE") {
            Err(StoreError::TableNotFound { name }) => assert_eq!(name, "NOPE"),
            other => panic!("expected TableNotFound, got {other:?}"),
        }
    }

    #[test]
    fn invalid_table_name_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = store.put("bad name; --", &sample_frame());
        assert!(matches!(result, Err(StoreError::InvalidTableName { .. })));
    }

    #[test]
    fn drop_requires_existing_table() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            store.drop_table("CENTROS"),
            Err(StoreError::TableNotFound { .. })
        ));

        store.put("CENTROS", &sample_frame()).unwrap();
        store.drop_table("CENTROS").unwrap();
        assert!(!store.exists("CENTROS").unwrap());
    }

    #[test]
    fn list_returns_sorted_user_tables() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put("ZETA", &sample_frame()).unwrap();
        store.put("ALFA", &sample_frame()).unwrap();
        assert_eq!(store.list().unwrap(), vec!["ALFA", "ZETA"]);
    }

    #[test]
    fn get_many_is_all_or_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put("CENTROS", &sample_frame()).unwrap();
        let result = store.get_many(&["CENTROS", "MISSING"]);
        match result {
            Err(StoreError::TableNotFound { name }) => assert_eq!(name, "MISSING"),
            other => panic!("expected TableNotFound, got {other:?}"),
        }

        let tables = store.get_many(&["CENTROS"]).unwrap();
        assert_eq!(tables.len(), 1);
    }

    #[test]
    fn append_creates_then_extends() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.append("CENTROS", &sample_frame()).unwrap();
        store.append("CENTROS", &sample_frame()).unwrap();
        assert_eq!(store.get("CENTROS").unwrap().height(), 6);
    }

    #[test]
    fn nulls_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let frame = df!(
            "code" => &[Some("A"), None, Some("C")],
            "qty" => &[Some(1.0f64), Some(2.0), None],
        )
        .unwrap();
        store.put("T", &frame).unwrap();
        let fetched = store.get("T").unwrap();
        assert_eq!(fetched.column("code").unwrap().null_count(), 1);
        assert_eq!(fetched.column("qty").unwrap().null_count(), 1);
    }
}
