//! dqm-etl: Postgres side of the DQM warehouse
//!
//! COPY-based bulk loading (plain and conflict-skipping), schema
//! migrations, CSV ingestion pipelines and the histogram filter set.

pub mod db;
pub mod error;
pub mod filters;
pub mod ingest;
pub mod pgsql;

pub use error::{EtlError, EtlResult};
pub use filters::LumisectionHistos2DFilter;
pub use pgsql::{copy_expert, copy_expert_onconflict_skip, CopyOutcome, CopyValue, TableRef};

/// Embedded schema migrations, applied by `dqmctl migrate up`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../migrations");
