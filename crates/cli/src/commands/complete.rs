use anyhow::Result;
use clap::Parser;

use crate::config::Config;
use crate::rules::complete_sales_table;

/// Run the business ruleset over the consolidated sales table
#[derive(Debug, Parser)]
pub struct CompleteCommand {
    /// Consolidated table override
    #[arg(long)]
    pub table: Option<String>,
}

impl CompleteCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        let store = config.open_store()?;
        let audit = config.audit();
        let table = self.table.as_deref().unwrap_or(&config.sales_table);

        let frame = complete_sales_table(&store, &audit, table)?;
        println!(
            "{table}: {} rows, {} columns (unmatched joins logged to {})",
            frame.height(),
            frame.width(),
            audit.path().display()
        );
        Ok(())
    }
}
