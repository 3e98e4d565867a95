use polars::prelude::PolarsError;
use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the enrichment engine. All of them indicate an
/// authoring problem in the column definitions or a broken reference
/// table; none are retriable and none are swallowed.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("table '{name}' not found")]
    TableNotFound { name: String },

    #[error("column '{column}' not found in table '{table}'")]
    MissingColumn { table: String, column: String },

    #[error("could not evaluate expression '{expression}': {detail}")]
    Evaluation { expression: String, detail: String },

    #[error("derived column '{column}' failed: {source}")]
    Function {
        column: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Store(StoreError),

    #[error("dataframe operation failed: {0}")]
    Frame(#[from] PolarsError),
}
