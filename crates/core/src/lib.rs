pub mod audit;
pub mod engine;
pub mod io;
pub mod pivot;
pub mod store;
pub mod value;

pub use audit::{AuditLog, AuditSink, NullAudit, UnmatchedJoin};
pub use engine::{enrich, ColumnDef, ColumnSpec, EnrichError, LookupDef, Row};
pub use io::{read_sheet, write_sheet, SheetError};
pub use pivot::{pivot, pivot_to_store, Aggregator, PivotError, PivotSpec};
pub use store::{SqliteStore, StoreError, TableStore};
pub use value::Value;
