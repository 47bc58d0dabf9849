use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowReport {
    pub row: usize,
    pub status: RowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k11: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k33: Option<f64>,
    pub finished_at: DateTime<Utc>,
}

/// Summary of one batch invocation, written next to the state table on request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: u32,
    pub table: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub jobs: usize,
    pub skipped: usize,
    pub rows: Vec<RowReport>,
}

impl RunReport {
    pub fn new(table: impl Into<String>, jobs: usize) -> Self {
        Self {
            schema_version: 1,
            table: table.into(),
            started_at: Utc::now(),
            finished_at: None,
            jobs,
            skipped: 0,
            rows: Vec::new(),
        }
    }

    pub fn count(&self, status: RowStatus) -> usize {
        self.rows.iter().filter(|row| row.status == status).count()
    }

    pub fn finish(&mut self) {
        self.rows.sort_by_key(|row| row.row);
        self.finished_at = Some(Utc::now());
    }
}

pub fn save_report(path: impl AsRef<Path>, report: &RunReport) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let bytes = serde_json::to_vec_pretty(report)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    fs::write(path, bytes)
}

pub fn load_report(path: impl AsRef<Path>) -> io::Result<RunReport> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(row: usize, status: RowStatus) -> RowReport {
        RowReport {
            row,
            status,
            stage: None,
            message: None,
            k11: None,
            k33: None,
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn report_roundtrip_preserves_rows() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("reports").join("run.json");

        let mut report = RunReport::new("samples.csv", 2);
        report.skipped = 3;
        report.rows.push(RowReport {
            stage: Some("second-solve".to_string()),
            message: Some("exited with status 1".to_string()),
            ..row(4, RowStatus::Failed)
        });
        report.rows.push(RowReport {
            k11: Some(1.5),
            k33: Some(0.25),
            ..row(1, RowStatus::Succeeded)
        });
        report.finish();

        save_report(&path, &report).expect("save should succeed");
        let loaded = load_report(&path).expect("load should succeed");
        assert_eq!(loaded, report);
        assert_eq!(loaded.rows[0].row, 1);
        assert_eq!(loaded.count(RowStatus::Failed), 1);
    }

    #[test]
    fn load_report_fails_for_invalid_payload() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("bad.json");
        fs::write(&path, "{invalid json").expect("write invalid payload");
        let err = load_report(&path).expect_err("invalid JSON should fail");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
