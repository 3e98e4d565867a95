use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use ventisca_core::{AuditLog, SqliteStore};

/// Tool configuration. Every field has a default, so running without a
/// config file works against the current directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file.
    pub database: PathBuf,
    /// Unmatched-join audit log.
    pub audit_log: PathBuf,
    /// Directory of monthly sales workbooks.
    pub sales_dir: PathBuf,
    /// Reference workbook with one sheet per reference table.
    pub reference_workbook: PathBuf,
    /// Name of the consolidated sales table.
    pub sales_table: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("ventisca.db"),
            audit_log: PathBuf::from("merge_warnings.log"),
            sales_dir: PathBuf::from("Historial_de_Venta"),
            reference_workbook: PathBuf::from("Background.xlsx"),
            sales_table: "VentaHistoricaTOTAL".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>, database_override: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("configuration file not found: {}", path.display());
                }
                let content = std::fs::read_to_string(path).with_context(|| {
                    format!("failed to read configuration file: {}", path.display())
                })?;
                let deserializer = serde_yaml::Deserializer::from_str(&content);
                serde_path_to_error::deserialize(deserializer).with_context(|| {
                    format!("failed to parse configuration from: {}", path.display())
                })?
            }
            None => Self::default(),
        };
        if let Some(database) = database_override {
            config.database = database.to_path_buf();
        }
        Ok(config)
    }

    pub fn open_store(&self) -> Result<SqliteStore> {
        SqliteStore::open(&self.database)
            .with_context(|| format!("failed to open database {}", self.database.display()))
    }

    pub fn audit(&self) -> AuditLog {
        AuditLog::new(&self.audit_log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_no_file_given() {
        let config = Config::load(None, None).unwrap();
        assert_eq!(config.sales_table, "VentaHistoricaTOTAL");
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "database: ventas/historia.db\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.database, PathBuf::from("ventas/historia.db"));
        assert_eq!(config.sales_table, "VentaHistoricaTOTAL");
    }

    #[test]
    fn database_override_wins() {
        let config = Config::load(None, Some(Path::new("override.db"))).unwrap();
        assert_eq!(config.database, PathBuf::from("override.db"));
    }

    #[test]
    fn missing_config_file_is_reported() {
        let error = Config::load(Some(Path::new("no/such/config.yaml")), None).unwrap_err();
        assert!(error.to_string().contains("configuration file not found"));
    }
}
