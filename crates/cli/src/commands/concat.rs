use anyhow::{bail, Context, Result};
use clap::Parser;
use polars::prelude::{concat, IntoLazy, UnionArgs};
use ventisca_core::TableStore;

use crate::commands::load::{sales_workbooks, table_name_for};
use crate::config::Config;

/// Concatenate the monthly sales tables into the consolidated table
#[derive(Debug, Parser)]
pub struct ConcatCommand {
    /// Output table name; defaults to the configured sales table
    #[arg(long)]
    pub output: Option<String>,
}

impl ConcatCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        let store = config.open_store()?;

        let tables: Vec<String> = sales_workbooks(&config.sales_dir)?
            .iter()
            .map(|path| table_name_for(path))
            .collect();
        if tables.is_empty() {
            bail!(
                "no sales workbooks found in {}; run 'ventisca load' first",
                config.sales_dir.display()
            );
        }

        let mut frames = Vec::with_capacity(tables.len());
        for table in &tables {
            let frame = store
                .get(table)
                .with_context(|| format!("sales table '{table}' is not loaded"))?;
            frames.push(frame.lazy());
        }
        let combined = concat(frames, UnionArgs::default())?.collect()?;

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| config.sales_table.clone());
        store.put(&output, &combined)?;
        println!(
            "{output}: {} rows from {} monthly tables",
            combined.height(),
            tables.len()
        );
        Ok(())
    }
}
