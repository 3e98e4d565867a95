use std::path::{Path, PathBuf};

use calamine::{open_workbook, Data, Reader, Xlsx};
use polars::prelude::{AnyValue, Column, DataFrame, PolarsError, Series};
use rust_xlsxwriter::Workbook;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("spreadsheet not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("sheet '{sheet}' not found in {path}")]
    SheetNotFound { sheet: String, path: PathBuf },

    #[error("workbook error: {0}")]
    Workbook(String),

    #[error("workbook write failed: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("dataframe operation failed: {0}")]
    Frame(#[from] PolarsError),
}

/// Read one worksheet into a frame. The first row is the header; each
/// column's type is unified (any text makes the column text, floats beat
/// ints). Defaults to the first sheet when none is named.
pub fn read_sheet(path: &Path, sheet: Option<&str>) -> Result<DataFrame, SheetError> {
    if !path.exists() {
        return Err(SheetError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|error: calamine::XlsxError| SheetError::Workbook(error.to_string()))?;
    let sheet_names = workbook.sheet_names().to_vec();
    let sheet_name = match sheet {
        Some(name) => {
            if !sheet_names.iter().any(|candidate| candidate == name) {
                return Err(SheetError::SheetNotFound {
                    sheet: name.to_string(),
                    path: path.to_path_buf(),
                });
            }
            name.to_string()
        }
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| SheetError::Workbook("workbook contains no sheets".to_string()))?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|error| SheetError::Workbook(error.to_string()))?;
    let frame = frame_from_range(&range)?;
    debug!(
        path = %path.display(),
        sheet = sheet_name,
        rows = frame.height(),
        "sheet imported"
    );
    Ok(frame)
}

/// Write a frame to a single-sheet workbook: header row, then typed cells.
pub fn write_sheet(frame: &DataFrame, path: &Path, sheet_name: &str) -> Result<(), SheetError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    for (index, column) in frame.get_columns().iter().enumerate() {
        worksheet.write_string(0, index as u16, column.name().as_str())?;
    }
    for (column_index, column) in frame.get_columns().iter().enumerate() {
        let series = column.as_materialized_series();
        let position = column_index as u16;
        for row_index in 0..frame.height() {
            let row = (row_index + 1) as u32;
            match series.get(row_index)? {
                AnyValue::Null => {}
                AnyValue::Boolean(value) => {
                    worksheet.write_boolean(row, position, value)?;
                }
                AnyValue::String(value) => {
                    worksheet.write_string(row, position, value)?;
                }
                AnyValue::StringOwned(value) => {
                    worksheet.write_string(row, position, value.as_str())?;
                }
                AnyValue::Int8(value) => {
                    worksheet.write_number(row, position, value as f64)?;
                }
                AnyValue::Int16(value) => {
                    worksheet.write_number(row, position, value as f64)?;
                }
                AnyValue::Int32(value) => {
                    worksheet.write_number(row, position, value as f64)?;
                }
                AnyValue::Int64(value) => {
                    worksheet.write_number(row, position, value as f64)?;
                }
                AnyValue::UInt8(value) => {
                    worksheet.write_number(row, position, value as f64)?;
                }
                AnyValue::UInt16(value) => {
                    worksheet.write_number(row, position, value as f64)?;
                }
                AnyValue::UInt32(value) => {
                    worksheet.write_number(row, position, value as f64)?;
                }
                AnyValue::UInt64(value) => {
                    worksheet.write_number(row, position, value as f64)?;
                }
                AnyValue::Float32(value) => {
                    worksheet.write_number(row, position, value as f64)?;
                }
                AnyValue::Float64(value) => {
                    worksheet.write_number(row, position, value)?;
                }
                other => {
                    worksheet.write_string(row, position, &other.to_string())?;
                }
            }
        }
    }

    workbook.save(path)?;
    debug!(path = %path.display(), sheet = sheet_name, rows = frame.height(), "sheet exported");
    Ok(())
}

fn frame_from_range(range: &calamine::Range<Data>) -> Result<DataFrame, SheetError> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(DataFrame::empty());
    };

    let names: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(index, cell)| match cell {
            Data::String(name) if !name.trim().is_empty() => name.trim().to_string(),
            Data::Empty => format!("column_{index}"),
            other => data_to_text(other),
        })
        .collect();

    let mut columns: Vec<Vec<Data>> = vec![Vec::new(); names.len()];
    for row in rows {
        for (index, cells) in columns.iter_mut().enumerate() {
            cells.push(row.get(index).cloned().unwrap_or(Data::Empty));
        }
    }

    let series = names
        .iter()
        .zip(&columns)
        .map(|(name, cells)| column_series(name, cells))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DataFrame::new(series.into_iter().map(Column::from).collect())?)
}

/// Unify a column's cell types: any text cell (or a boolean mixed with
/// numbers) turns the whole column into text, floats beat ints. Integral
/// floats stringify without the trailing `.0` so article codes survive
/// Excel's habit of storing them as floats.
fn column_series(name: &str, cells: &[Data]) -> Result<Series, SheetError> {
    let mut has_text = false;
    let mut has_float = false;
    let mut has_int = false;
    let mut has_bool = false;
    for cell in cells {
        match cell {
            Data::String(_) | Data::DateTimeIso(_) | Data::DurationIso(_) | Data::Error(_) => {
                has_text = true
            }
            Data::Float(_) | Data::DateTime(_) => has_float = true,
            Data::Int(_) => has_int = true,
            Data::Bool(_) => has_bool = true,
            Data::Empty => {}
        }
    }

    let values: Vec<AnyValue> = if has_text || (has_bool && (has_float || has_int)) {
        cells
            .iter()
            .map(|cell| match cell {
                Data::Empty => AnyValue::Null,
                other => AnyValue::StringOwned(data_to_text(other).into()),
            })
            .collect()
    } else if has_float {
        cells
            .iter()
            .map(|cell| match cell {
                Data::Float(value) => AnyValue::Float64(*value),
                Data::DateTime(value) => AnyValue::Float64(value.as_f64()),
                Data::Int(value) => AnyValue::Float64(*value as f64),
                _ => AnyValue::Null,
            })
            .collect()
    } else if has_int {
        cells
            .iter()
            .map(|cell| match cell {
                Data::Int(value) => AnyValue::Int64(*value),
                _ => AnyValue::Null,
            })
            .collect()
    } else if has_bool {
        cells
            .iter()
            .map(|cell| match cell {
                Data::Bool(value) => AnyValue::Boolean(*value),
                _ => AnyValue::Null,
            })
            .collect()
    } else {
        cells.iter().map(|_| AnyValue::Null).collect()
    };

    Ok(Series::from_any_values(name.into(), &values, false)?)
}

fn data_to_text(cell: &Data) -> String {
    match cell {
        Data::String(value) => value.clone(),
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 => {
            format!("{}", *value as i64)
        }
        Data::Float(value) => value.to_string(),
        Data::Int(value) => value.to_string(),
        Data::Bool(value) => value.to_string(),
        Data::DateTime(value) => value.as_f64().to_string(),
        Data::DateTimeIso(value) | Data::DurationIso(value) => value.clone(),
        Data::Error(error) => format!("{error:?}"),
        Data::Empty => String::new(),
    }
}
