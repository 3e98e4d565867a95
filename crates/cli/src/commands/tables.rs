use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use ventisca_core::{write_sheet, TableStore};

use crate::config::Config;

/// List stored tables
#[derive(Debug, Parser)]
pub struct TablesCommand {}

impl TablesCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        let store = config.open_store()?;
        for name in store.list()? {
            println!("{name}");
        }
        Ok(())
    }
}

/// Show a table's columns
#[derive(Debug, Parser)]
pub struct ColumnsCommand {
    /// Table to inspect
    pub table: String,
}

impl ColumnsCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        let store = config.open_store()?;
        let frame = store.get(&self.table)?;
        println!("columns in '{}':", self.table);
        for (index, name) in frame.get_column_names().iter().enumerate() {
            println!("    {}. {name}", index + 1);
        }
        Ok(())
    }
}

/// Print a table's first rows
#[derive(Debug, Parser)]
pub struct ShowCommand {
    /// Table to print
    pub table: String,

    /// Number of rows to print
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

impl ShowCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        let store = config.open_store()?;
        let frame = store.get(&self.table)?;
        println!("{}", frame.head(Some(self.limit)));
        Ok(())
    }
}

/// Drop a table
#[derive(Debug, Parser)]
pub struct DropCommand {
    /// Table to drop
    pub table: String,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

impl DropCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        if !self.yes && !confirm(&format!("Drop table '{}'? [y/N]: ", self.table))? {
            println!("drop cancelled");
            return Ok(());
        }
        let store = config.open_store()?;
        store.drop_table(&self.table)?;
        println!("table '{}' dropped", self.table);
        Ok(())
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

/// Export a table to a workbook
#[derive(Debug, Parser)]
pub struct ExportCommand {
    /// Table to export
    pub table: String,

    /// Output workbook path; defaults to <table>.xlsx
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Worksheet name
    #[arg(long, default_value = "Sheet1")]
    pub sheet: String,
}

impl ExportCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        let store = config.open_store()?;
        let frame = store.get(&self.table)?;
        let path = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.xlsx", self.table)));
        write_sheet(&frame, &path, &self.sheet)?;
        println!(
            "table '{}' ({} rows) exported to {}",
            self.table,
            frame.height(),
            path.display()
        );
        Ok(())
    }
}
