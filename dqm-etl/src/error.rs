//! Error types for dqm-etl

use dqm_core::DqmError;
use thiserror::Error;

pub type EtlResult<T> = Result<T, EtlError>;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    Validation(String),

    #[error("cannot return ids of column '{column}' with type {type_name}")]
    UnsupportedKeyType { column: String, type_name: String },

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error(transparent)]
    Core(#[from] DqmError),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl EtlError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }
}
