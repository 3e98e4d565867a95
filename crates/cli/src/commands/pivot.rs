use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ventisca_core::{pivot_to_store, write_sheet, PivotSpec};

use crate::config::Config;

/// Run a pivot described by a YAML spec file
#[derive(Debug, Parser)]
pub struct PivotCommand {
    /// Table to pivot
    pub table: String,

    /// YAML pivot spec (rows / columns / values / filters / aggregator)
    #[arg(long)]
    pub spec: PathBuf,

    /// Output table name; defaults to <table>_pivot
    #[arg(long)]
    pub output_table: Option<String>,

    /// Also export the result to this workbook
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Worksheet name for the export
    #[arg(long, default_value = "Sheet1")]
    pub sheet: String,
}

impl PivotCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        let spec = parse_spec(&self.spec)?;
        let store = config.open_store()?;
        let output_table = self
            .output_table
            .clone()
            .unwrap_or_else(|| format!("{}_pivot", self.table));

        let pivoted = pivot_to_store(&store, &self.table, &spec, &output_table)?;
        println!("{output_table}: {} rows", pivoted.height());

        if let Some(path) = &self.export {
            write_sheet(&pivoted, path, &self.sheet)?;
            println!("exported to {}", path.display());
        }
        Ok(())
    }
}

fn parse_spec(path: &PathBuf) -> Result<PivotSpec> {
    if !path.exists() {
        anyhow::bail!("pivot spec file not found: {}", path.display());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read pivot spec: {}", path.display()))?;
    let deserializer = serde_yaml::Deserializer::from_str(&content);
    serde_path_to_error::deserialize(deserializer)
        .with_context(|| format!("failed to parse pivot spec from: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use ventisca_core::{Aggregator, Value};

    #[test]
    fn parses_a_full_spec() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spec.yaml");
        fs::write(
            &path,
            "rows: [PAIS]\ncolumns: [PERIODO]\nvalues: [MONTO]\nfilters:\n  FILTRO3: [SI]\naggregator: sum\n",
        )
        .unwrap();

        let spec = parse_spec(&path).unwrap();
        assert_eq!(spec.rows, vec!["PAIS".to_string()]);
        assert_eq!(spec.aggregator, Aggregator::Sum);
        assert_eq!(
            spec.filters.get("FILTRO3"),
            Some(&vec![Value::Str("SI".to_string())])
        );
    }

    #[test]
    fn reports_the_failing_field() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spec.yaml");
        fs::write(&path, "rows: [PAIS]\nvalues: [MONTO]\naggregator: sideways\n").unwrap();

        let error = format!("{:#}", parse_spec(&path).unwrap_err());
        assert!(error.contains("aggregator"));
    }
}
