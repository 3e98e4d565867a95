use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use ventisca_core::{pivot_to_store, write_sheet};

use crate::config::Config;
use crate::rules::report_pivot_spec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    /// Only rows that passed every filter (FILTRO3 = SI)
    Gross,
    /// All rows
    Net,
}

/// Build, persist and export a classification report
#[derive(Debug, Parser)]
pub struct ReportCommand {
    /// Which report to build
    #[arg(value_enum)]
    pub kind: ReportKind,

    /// Workbook to export to; defaults to <output table>.xlsx
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Worksheet name
    #[arg(long, default_value = "Sheet01")]
    pub sheet: String,
}

impl ReportCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        let store = config.open_store()?;
        let (spec, output_table) = match self.kind {
            ReportKind::Gross => (report_pivot_spec(true), "pivot_result_BRUTA"),
            ReportKind::Net => (report_pivot_spec(false), "pivot_result_NETA"),
        };

        let pivoted = pivot_to_store(&store, &config.sales_table, &spec, output_table)?;
        let path = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{output_table}.xlsx")));
        write_sheet(&pivoted, &path, &self.sheet)?;
        println!(
            "{output_table}: {} rows exported to {}",
            pivoted.height(),
            path.display()
        );
        Ok(())
    }
}
