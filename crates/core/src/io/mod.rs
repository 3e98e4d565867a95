//! Spreadsheet import and export.

mod xlsx;

pub use xlsx::{read_sheet, write_sheet, SheetError};
