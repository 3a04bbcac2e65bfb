//! Core types for the DQM warehouse tooling: run/lumisection identifiers,
//! typed CSV records of DQM exports, configuration, and errors.

pub mod config;
pub mod error;
pub mod model;
pub mod records;

pub use config::{DatabaseTarget, DqmConfig};
pub use error::{DqmError, Result};
pub use model::{LsNumber, LumisectionKey, RunNumber};
pub use records::{BadLumiRecord, CsvRecord, HistoRecord, RecordReader};
