use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use polars::prelude::DataFrame;
use ventisca_core::{read_sheet, SqliteStore, TableStore};
use walkdir::WalkDir;

use crate::config::Config;
use crate::rules::REFERENCE_SHEETS;

/// Import the reference workbook and the sales history directory
#[derive(Debug, Parser)]
pub struct LoadCommand {
    /// Import only the reference workbook
    #[arg(long)]
    pub reference_only: bool,

    /// Import only the sales directory
    #[arg(long)]
    pub sales_only: bool,

    /// Append to existing tables instead of replacing them
    #[arg(long)]
    pub append: bool,
}

impl LoadCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        let store = config.open_store()?;
        if !self.sales_only {
            self.load_reference(config, &store)?;
        }
        if !self.reference_only {
            self.load_sales(config, &store)?;
        }
        Ok(())
    }

    fn load_reference(&self, config: &Config, store: &SqliteStore) -> Result<()> {
        for sheet in REFERENCE_SHEETS {
            let frame = read_sheet(&config.reference_workbook, Some(sheet)).with_context(|| {
                format!(
                    "failed to import sheet '{sheet}' from {}",
                    config.reference_workbook.display()
                )
            })?;
            self.write(store, sheet, &frame)?;
            println!("loaded {sheet} ({} rows)", frame.height());
        }
        Ok(())
    }

    fn load_sales(&self, config: &Config, store: &SqliteStore) -> Result<()> {
        let mut imported = 0usize;
        for path in sales_workbooks(&config.sales_dir)? {
            let table = table_name_for(&path);
            let frame = read_sheet(&path, None)
                .with_context(|| format!("failed to import {}", path.display()))?;
            self.write(store, &table, &frame)?;
            println!("loaded {table} ({} rows)", frame.height());
            imported += 1;
        }
        if imported == 0 {
            println!(
                "no workbooks found in {}",
                config.sales_dir.display()
            );
        }
        Ok(())
    }

    fn write(&self, store: &SqliteStore, table: &str, frame: &DataFrame) -> Result<()> {
        if self.append {
            store.append(table, frame)?;
        } else {
            store.put(table, frame)?;
        }
        Ok(())
    }
}

/// Workbook files directly under the sales directory, sorted by name.
pub fn sales_workbooks(directory: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(directory).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to scan {}", directory.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_workbook = entry
            .path()
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| extension.eq_ignore_ascii_case("xlsx"));
        if is_workbook {
            paths.push(entry.path().to_path_buf());
        }
    }
    Ok(paths)
}

/// Workbook file name to table identifier: extension dropped, anything
/// outside `[A-Za-z0-9_]` replaced with `_`, leading digit prefixed so the
/// name stays a valid identifier.
pub fn table_name_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("tabla");
    let mut name: String = stem
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if name
        .chars()
        .next()
        .map_or(true, |first| first.is_ascii_digit())
    {
        name.insert(0, '_');
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_are_sanitized() {
        assert_eq!(table_name_for(Path::new("VENTA-2023.XLSX")), "VENTA_2023");
        assert_eq!(table_name_for(Path::new("2023-01.xlsx")), "_2023_01");
        assert_eq!(table_name_for(Path::new("año 2024.xlsx")), "a_o_2024");
    }
}
