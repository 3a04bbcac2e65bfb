//! Loading of ML bad-lumisection exports.

use std::io::Read;
use std::path::Path;

use dqm_core::{BadLumiRecord, RecordReader};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, instrument};

use crate::db::repos::bad_lumis;
use crate::error::EtlResult;
use crate::pgsql::DEFAULT_CHUNK_BYTES;

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub dry_run: bool,
    pub chunk_bytes: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub rows_read: u64,
    pub inserted: u64,
    /// Rows whose key was already present
    pub skipped: u64,
}

/// Parse every record, stopping at the first malformed row.
pub fn scan_bad_lumis<R: Read>(
    reader: RecordReader<R, BadLumiRecord>,
) -> dqm_core::Result<Vec<BadLumiRecord>> {
    reader.collect()
}

/// Parse a bad-lumisection export on the blocking pool.
pub async fn read_bad_lumi_file(path: impl AsRef<Path>) -> EtlResult<Vec<BadLumiRecord>> {
    let owned = path.as_ref().to_path_buf();
    let records = tokio::task::spawn_blocking(move || {
        let reader = RecordReader::<_, BadLumiRecord>::open(&owned)?;
        scan_bad_lumis(reader)
    })
    .await??;
    Ok(records)
}

/// Load `path` into `fact_ml_bad_lumis`, skipping facts already recorded.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub async fn load_ml_bad_lumis(
    pool: &PgPool,
    path: impl AsRef<Path>,
    opts: &LoadOptions,
) -> EtlResult<LoadReport> {
    let records = read_bad_lumi_file(path).await?;

    let rows_read = records.len() as u64;
    info!(rows_read, "scanned bad lumisection file");
    if opts.dry_run || records.is_empty() {
        return Ok(LoadReport {
            rows_read,
            ..LoadReport::default()
        });
    }

    let mut conn = pool.acquire().await?;
    let inserted = bad_lumis::load(&mut *conn, records, opts.chunk_bytes)
        .await?
        .inserted();

    let report = LoadReport {
        rows_read,
        inserted,
        skipped: rows_read.saturating_sub(inserted),
    };
    info!(
        inserted = report.inserted,
        skipped = report.skipped,
        "bad lumisections loaded"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MIGRATOR;
    use dqm_core::DqmError;
    use std::io::Write;

    const EXPORT: &str = "\
model_name,dataset_id,file_id,run_number,ls_number,me_id
autoencoder-v1,12,301,297057,10,88
autoencoder-v1,12,,297057,11,88
autoencoder-v1,12,301,297057,12,91
";

    fn reader(text: &'static str) -> RecordReader<&'static [u8], BadLumiRecord> {
        RecordReader::from_reader(text.as_bytes(), "bad_lumis.csv").unwrap()
    }

    #[test]
    fn scan_reads_optional_file_id() {
        let records = scan_bad_lumis(reader(EXPORT)).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].file_id, Some(301));
        assert_eq!(records[1].file_id, None);
        assert_eq!(records[2].me_id, 91);
    }

    #[test]
    fn scan_stops_at_malformed_row() {
        let text = "model_name,dataset_id,file_id,run_number,ls_number,me_id\n\
                    ae,12,301,297057,10,88\n\
                    ae,twelve,301,297057,11,88\n";
        let err = scan_bad_lumis(reader(text)).unwrap_err();
        match err {
            DqmError::Csv { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_column_is_rejected_up_front() {
        let text = "model_name,dataset_id,run_number,ls_number,me_id\nae,1,2,3,4\n";
        let err = RecordReader::<_, BadLumiRecord>::from_reader(text.as_bytes(), "x.csv")
            .err()
            .unwrap();
        assert!(err.to_string().contains("file_id"));
    }

    fn export_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXPORT.as_bytes()).unwrap();
        file
    }

    #[sqlx::test(migrator = "MIGRATOR")]
    #[ignore = "requires database"]
    async fn reloading_a_file_inserts_nothing(pool: PgPool) -> EtlResult<()> {
        let file = export_file();
        let opts = LoadOptions::default();

        let first = load_ml_bad_lumis(&pool, file.path(), &opts).await?;
        assert_eq!(
            first,
            LoadReport {
                rows_read: 3,
                inserted: 3,
                skipped: 0
            }
        );

        let second = load_ml_bad_lumis(&pool, file.path(), &opts).await?;
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 3);
        Ok(())
    }

    #[sqlx::test(migrator = "MIGRATOR")]
    #[ignore = "requires database"]
    async fn dry_run_only_counts(pool: PgPool) -> EtlResult<()> {
        let file = export_file();
        let opts = LoadOptions {
            dry_run: true,
            ..LoadOptions::default()
        };
        let report = load_ml_bad_lumis(&pool, file.path(), &opts).await?;
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.inserted, 0);
        assert_eq!(bad_lumis::BadLumiRepo::new(&pool).count(None).await?, 0);
        Ok(())
    }
}
