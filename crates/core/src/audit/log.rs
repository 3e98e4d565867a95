use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::warn;

use crate::audit::{AuditSink, UnmatchedJoin};

/// Append-only plain-text audit file.
///
/// Entries are timestamped human-readable blocks; repeated runs append
/// repeated entries, nothing is ever deduplicated or read back.
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, entry: &UnmatchedJoin) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(
            file,
            "[{}] table={} column={} source={} key={} unmatched_rows={}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            entry.table,
            entry.column,
            entry.source_table,
            entry.join_key,
            entry.unmatched_rows,
        )?;
        for key in &entry.unmatched_keys {
            writeln!(file, "    {key}")?;
        }
        Ok(())
    }
}

impl AuditSink for AuditLog {
    fn unmatched_join(&self, entry: &UnmatchedJoin) {
        if let Err(error) = self.append(entry) {
            warn!(
                path = %self.path.display(),
                %error,
                "failed to append unmatched-join audit entry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> UnmatchedJoin {
        UnmatchedJoin {
            table: "sales".to_string(),
            column: "PAIS".to_string(),
            source_table: "CENTROS".to_string(),
            join_key: "Centro".to_string(),
            unmatched_rows: 2,
            unmatched_keys: vec!["G601".to_string(), "G999".to_string()],
        }
    }

    #[test]
    fn appends_human_readable_block() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        let log = AuditLog::new(&path);

        log.unmatched_join(&sample_entry());
        log.unmatched_join(&sample_entry());

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content
                .lines()
                .filter(|line| line.contains("column=PAIS"))
                .count(),
            2
        );
        assert!(content.contains("    G601"));
        assert!(content.contains("unmatched_rows=2"));
    }

    #[test]
    fn write_failure_is_swallowed() {
        // Point at a directory; the open fails but the sink must not panic.
        let dir = tempfile::TempDir::new().unwrap();
        let log = AuditLog::new(dir.path());
        log.unmatched_join(&sample_entry());
    }
}
