//! Typed CSV records for DQM exports.
//!
//! Readers check the header for required columns up front, then stream
//! rows lazily so large exports never sit in memory as a whole.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{DqmError, Result};
use crate::model::{LsNumber, LumisectionKey, RunNumber};

/// A row type that can be decoded from a headed CSV file
pub trait CsvRecord: DeserializeOwned {
    /// Header columns that must be present for the file to be accepted
    const REQUIRED_COLUMNS: &'static [&'static str];
}

/// One histogram of one lumisection, as exported from DQMIO files
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoRecord {
    #[serde(rename = "fromrun")]
    pub run_number: i32,
    #[serde(rename = "fromlumi")]
    pub ls_number: i32,
    #[serde(rename = "hname")]
    pub title: String,
    #[serde(default)]
    pub entries: Option<f64>,
    #[serde(default)]
    pub histo: Option<String>,
}

impl CsvRecord for HistoRecord {
    const REQUIRED_COLUMNS: &'static [&'static str] = &["fromrun", "fromlumi", "hname"];
}

impl HistoRecord {
    pub fn run(&self) -> RunNumber {
        RunNumber(self.run_number)
    }

    pub fn key(&self) -> LumisectionKey {
        LumisectionKey::new(RunNumber(self.run_number), LsNumber(self.ls_number))
    }

    /// Entry count; exports store it as a float column.
    pub fn entries_count(&self) -> i64 {
        self.entries.map(|e| e.round() as i64).unwrap_or(0)
    }

    /// Bin contents decoded from the `histo` column, if present.
    pub fn payload(&self) -> Result<Option<serde_json::Value>> {
        match self.histo.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => serde_json::from_str(raw).map(Some).map_err(|err| {
                DqmError::validation(format!(
                    "histogram '{}' of {} has a malformed payload: {}",
                    self.title,
                    self.key(),
                    err
                ))
            }),
        }
    }
}

/// One lumisection flagged bad by an ML model
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BadLumiRecord {
    pub model_name: String,
    pub dataset_id: i64,
    #[serde(default)]
    pub file_id: Option<i64>,
    pub run_number: i32,
    pub ls_number: i32,
    pub me_id: i32,
}

impl CsvRecord for BadLumiRecord {
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "model_name",
        "dataset_id",
        "file_id",
        "run_number",
        "ls_number",
        "me_id",
    ];
}

/// Streaming reader yielding typed records
pub struct RecordReader<R: Read, T> {
    source: PathBuf,
    inner: csv::DeserializeRecordsIntoIter<R, T>,
}

impl<T: CsvRecord> RecordReader<File, T> {
    /// Open a CSV file on disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DqmError::path_not_found(path));
        }
        let file = File::open(path)?;
        Self::from_reader(file, path)
    }
}

impl<R: Read, T: CsvRecord> RecordReader<R, T> {
    /// Wrap any reader; `source` is only used in error messages.
    pub fn from_reader(reader: R, source: impl Into<PathBuf>) -> Result<Self> {
        let source = source.into();
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|err| DqmError::csv(&source, err))?
            .clone();
        if headers.is_empty() {
            return Err(DqmError::empty_file(&source));
        }
        for column in T::REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == *column) {
                return Err(DqmError::missing_column(*column, &source));
            }
        }

        Ok(Self {
            source,
            inner: csv_reader.into_deserialize(),
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl<R: Read, T: CsvRecord> Iterator for RecordReader<R, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|row| row.map_err(|err| DqmError::csv(&self.source, err)))
    }
}
