//! Workbook import/export round trips.

use polars::prelude::{df, DataType};
use tempfile::TempDir;
use ventisca_core::{read_sheet, write_sheet, SheetError};

#[test]
fn write_then_read_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("centros.xlsx");

    let frame = df!(
        "CENTRO" => &["G601", "ZSER"],
        "CENTRO_ID" => &[601.0f64, 930.0],
        "ACTIVO" => &[true, false],
    )
    .unwrap();
    write_sheet(&frame, &path, "CENTROS").unwrap();

    let loaded = read_sheet(&path, Some("CENTROS")).unwrap();
    assert_eq!(loaded.shape(), (2, 3));
    assert_eq!(
        loaded
            .column("CENTRO")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect::<Vec<_>>(),
        vec!["G601", "ZSER"]
    );
    assert_eq!(loaded.column("CENTRO_ID").unwrap().dtype(), &DataType::Float64);
    assert_eq!(loaded.column("ACTIVO").unwrap().dtype(), &DataType::Boolean);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let error = read_sheet(&dir.path().join("nope.xlsx"), None).unwrap_err();
    assert!(matches!(error, SheetError::FileNotFound { .. }));
}

#[test]
fn missing_sheet_is_reported_by_name() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wb.xlsx");
    write_sheet(&df!("a" => &[1i64]).unwrap(), &path, "Sheet1").unwrap();

    let error = read_sheet(&path, Some("NOPE")).unwrap_err();
    match error {
        SheetError::SheetNotFound { sheet, .. } => assert_eq!(sheet, "NOPE"),
        other => panic!("expected SheetNotFound, got {other:?}"),
    }
}
