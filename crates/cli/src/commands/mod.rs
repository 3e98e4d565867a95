mod complete;
mod concat;
mod load;
mod pivot;
mod report;
mod tables;

pub use complete::CompleteCommand;
pub use concat::ConcatCommand;
pub use load::LoadCommand;
pub use pivot::PivotCommand;
pub use report::ReportCommand;
pub use tables::{ColumnsCommand, DropCommand, ExportCommand, ShowCommand, TablesCommand};
