mod commands;
mod config;
mod rules;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{
    ColumnsCommand, CompleteCommand, ConcatCommand, DropCommand, ExportCommand, LoadCommand,
    PivotCommand, ReportCommand, ShowCommand, TablesCommand,
};
use config::Config;

/// Ventisca - sales history consolidation and reporting tool
#[derive(Debug, Parser)]
#[command(
    name = "ventisca",
    version,
    about = "Sales history consolidation and reporting tool"
)]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file override
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Import the reference workbook and the sales history directory
    Load(LoadCommand),
    /// Concatenate the monthly sales tables into the consolidated table
    Concat(ConcatCommand),
    /// Run the business ruleset over the consolidated sales table
    Complete(CompleteCommand),
    /// Build, persist and export a classification report
    Report(ReportCommand),
    /// Run a pivot described by a YAML spec file
    Pivot(PivotCommand),
    /// List stored tables
    Tables(TablesCommand),
    /// Show a table's columns
    Columns(ColumnsCommand),
    /// Print a table's first rows
    Show(ShowCommand),
    /// Drop a table
    Drop(DropCommand),
    /// Export a table to a workbook
    Export(ExportCommand),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref(), cli.database.as_deref())?;

    match cli.command {
        Commands::Load(cmd) => cmd.execute(&config),
        Commands::Concat(cmd) => cmd.execute(&config),
        Commands::Complete(cmd) => cmd.execute(&config),
        Commands::Report(cmd) => cmd.execute(&config),
        Commands::Pivot(cmd) => cmd.execute(&config),
        Commands::Tables(cmd) => cmd.execute(&config),
        Commands::Columns(cmd) => cmd.execute(&config),
        Commands::Show(cmd) => cmd.execute(&config),
        Commands::Drop(cmd) => cmd.execute(&config),
        Commands::Export(cmd) => cmd.execute(&config),
    }
}
