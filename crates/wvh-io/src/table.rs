//! Batch state table (CSV) holding the sampled parameters and the results.
//!
//! The table is the only persistent state of a batch. Columns the pipeline does
//! not know about are carried through unchanged; `k11`/`k33` are appended when
//! the sampler did not write them.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

pub const COL_VOLUME_FRACTION: &str = "Vf";
pub const COL_WIDTH_RATIO: &str = "Width to Spacing";
pub const COL_THICKNESS_RATIO: &str = "Thickness to Spacing";
pub const COL_K11: &str = "k11";
pub const COL_K33: &str = "k33";

#[derive(Error, Debug)]
pub enum TableError {
    #[error("failed to read sample table {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("sample table {path} has no '{column}' column")]
    MissingColumn { path: String, column: &'static str },

    #[error("row {row}: {message}")]
    Row { row: usize, message: String },

    #[error("row {row} is out of range ({len} rows)")]
    RowOutOfRange { row: usize, len: usize },

    #[error("failed to write sample table: {0}")]
    Write(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to replace sample table: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// One sampled parameter set and its homogenized result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "Vf")]
    pub volume_fraction: f64,
    #[serde(rename = "Width to Spacing")]
    pub width_ratio: f64,
    #[serde(rename = "Thickness to Spacing")]
    pub thickness_ratio: f64,
    #[serde(default)]
    pub k11: Option<f64>,
    #[serde(default)]
    pub k33: Option<f64>,
}

impl Sample {
    pub fn new(volume_fraction: f64, width_ratio: f64, thickness_ratio: f64) -> Self {
        Self {
            volume_fraction,
            width_ratio,
            thickness_ratio,
            k11: None,
            k33: None,
        }
    }

    /// Both results are present
    pub fn is_complete(&self) -> bool {
        self.k11.is_some() && self.k33.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    k11: usize,
    k33: usize,
}

/// In-memory copy of the state table
#[derive(Debug, Clone)]
pub struct SampleTable {
    path: PathBuf,
    headers: StringRecord,
    rows: Vec<StringRecord>,
    columns: Columns,
}

impl SampleTable {
    /// Read the table; a missing or unreadable file is an error
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref();
        let read_err = |source| TableError::Read {
            path: path.display().to_string(),
            source,
        };

        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(read_err)?;
        let mut headers = reader.headers().map_err(read_err)?.clone();

        for column in [COL_VOLUME_FRACTION, COL_WIDTH_RATIO, COL_THICKNESS_RATIO] {
            if position(&headers, column).is_none() {
                return Err(TableError::MissingColumn {
                    path: path.display().to_string(),
                    column,
                });
            }
        }

        let k11 = ensure_column(&mut headers, COL_K11);
        let k33 = ensure_column(&mut headers, COL_K33);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(read_err)?;
            rows.push(pad(record, headers.len()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            rows,
            columns: Columns { k11, k33 },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Decode one row
    pub fn sample(&self, row: usize) -> Result<Sample, TableError> {
        let record = self.record(row)?;
        record
            .deserialize::<Sample>(Some(&self.headers))
            .map_err(|err| TableError::Row {
                row,
                message: err.to_string(),
            })
    }

    /// Rows whose results are not both set, in table order
    ///
    /// Rows that fail to decode are pending too, so the batch reports them.
    pub fn pending_rows(&self) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|&row| !self.sample(row).is_ok_and(|sample| sample.is_complete()))
            .collect()
    }

    /// Store the results of a finished row
    pub fn set_result(&mut self, row: usize, k11: f64, k33: f64) -> Result<(), TableError> {
        let columns = self.columns;
        let len = self.rows.len();
        let record = self
            .rows
            .get_mut(row)
            .ok_or(TableError::RowOutOfRange { row, len })?;

        let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
        fields[columns.k11] = k11.to_string();
        fields[columns.k33] = k33.to_string();
        *record = StringRecord::from(fields);
        Ok(())
    }

    /// Rewrite the whole table at its original path
    ///
    /// The new content goes to a temporary file in the same directory which
    /// then replaces the table, so readers never see a partial file.
    pub fn save(&self) -> Result<(), TableError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = WriterBuilder::new().from_writer(tmp.as_file_mut());
            writer.write_record(&self.headers)?;
            for record in &self.rows {
                writer.write_record(record)?;
            }
            writer.flush()?;
        }
        tmp.as_file_mut().flush()?;
        tmp.persist(&self.path)?;
        Ok(())
    }

    fn record(&self, row: usize) -> Result<&StringRecord, TableError> {
        self.rows.get(row).ok_or(TableError::RowOutOfRange {
            row,
            len: self.rows.len(),
        })
    }
}

fn position(headers: &StringRecord, column: &str) -> Option<usize> {
    headers.iter().position(|header| header == column)
}

fn ensure_column(headers: &mut StringRecord, column: &str) -> usize {
    match position(headers, column) {
        Some(index) => index,
        None => {
            headers.push_field(column);
            headers.len() - 1
        }
    }
}

fn pad(record: StringRecord, len: usize) -> StringRecord {
    if record.len() >= len {
        return record;
    }
    let mut record = record;
    while record.len() < len {
        record.push_field("");
    }
    record
}
