//! ML bad-lumisection fact table
//!
//! Facts are keyed by (model, dataset, run, lumisection, monitoring
//! element); reloading an overlapping export only adds the new keys.

use dqm_core::BadLumiRecord;
use sqlx::{PgConnection, PgPool};

use crate::error::EtlResult;
use crate::pgsql::{BulkCopy, CopyOutcome, CopyValue, TableRef, ToCopyRow};

pub const BAD_LUMI_COLUMNS: &[&str] = &[
    "model_name",
    "dataset_id",
    "file_id",
    "run_number",
    "ls_number",
    "me_id",
];

pub fn bad_lumis_table() -> TableRef {
    TableRef::new("fact_ml_bad_lumis")
}

impl ToCopyRow for BadLumiRecord {
    fn into_copy_values(self) -> Vec<CopyValue> {
        vec![
            self.model_name.into(),
            self.dataset_id.into(),
            self.file_id.into(),
            self.run_number.into(),
            self.ls_number.into(),
            self.me_id.into(),
        ]
    }
}

/// Fact table repository
pub struct BadLumiRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> BadLumiRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Number of facts recorded for `model_name`, or for every model.
    pub async fn count(&self, model_name: Option<&str>) -> EtlResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM fact_ml_bad_lumis WHERE $1::TEXT IS NULL OR model_name = $1",
        )
        .bind(model_name)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}

/// Load facts, skipping keys that are already present.
pub async fn load<I>(conn: &mut PgConnection, rows: I, chunk_bytes: usize) -> EtlResult<CopyOutcome>
where
    I: IntoIterator<Item = BadLumiRecord>,
{
    BulkCopy::new(bad_lumis_table(), BAD_LUMI_COLUMNS)
        .chunk_bytes(chunk_bytes)
        .copy_expert_onconflict_skip(conn, rows, false, None)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use crate::pgsql::{copy_expert, copy_expert_onconflict_skip};
    use crate::MIGRATOR;

    fn fact(ls: i32, me_id: i32) -> BadLumiRecord {
        BadLumiRecord {
            model_name: "autoencoder-v1".into(),
            dataset_id: 12,
            file_id: Some(301),
            run_number: 297057,
            ls_number: ls,
            me_id,
        }
    }

    async fn staging_exists(conn: &mut PgConnection) -> EtlResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass('fact_ml_bad_lumis_tmp') IS NOT NULL")
            .fetch_one(&mut *conn)
            .await?;
        Ok(exists)
    }

    async fn contents(pool: &PgPool) -> EtlResult<Vec<(String, i64, Option<i64>, i32, i32, i32)>> {
        let rows = sqlx::query_as(
            "SELECT model_name, dataset_id, file_id, run_number, ls_number, me_id \
             FROM fact_ml_bad_lumis ORDER BY ls_number, me_id",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    #[test]
    fn record_row_matches_columns() {
        let values = fact(4, 88).into_copy_values();
        assert_eq!(values.len(), BAD_LUMI_COLUMNS.len());
        assert_eq!(values[0], CopyValue::Text("autoencoder-v1".into()));
    }

    #[sqlx::test(migrator = "MIGRATOR")]
    #[ignore = "requires database"]
    async fn reload_inserts_only_new_keys(pool: PgPool) -> EtlResult<()> {
        let mut conn = pool.acquire().await?;

        let first = load(&mut conn, vec![fact(1, 88), fact(2, 88)], 64).await?;
        assert_eq!(first, CopyOutcome::Rows(2));

        let mut changed = fact(2, 88);
        changed.file_id = Some(999);
        let second = load(&mut conn, vec![changed, fact(3, 88)], 64).await?;
        assert_eq!(second, CopyOutcome::Rows(1));

        let rows = contents(&pool).await?;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].2, Some(301), "existing row must be left unchanged");
        assert!(!staging_exists(&mut conn).await?);
        assert_eq!(BadLumiRepo::new(&pool).count(Some("autoencoder-v1")).await?, 3);
        Ok(())
    }

    #[sqlx::test(migrator = "MIGRATOR")]
    #[ignore = "requires database"]
    async fn plain_copy_and_skip_copy_agree_without_conflicts(pool: PgPool) -> EtlResult<()> {
        let rows: Vec<_> = (1..=50).map(|ls| fact(ls, 7)).collect();
        let table = bad_lumis_table();

        let mut conn = pool.acquire().await?;
        let copied = copy_expert(&table, &mut conn, BAD_LUMI_COLUMNS, rows.clone()).await?;
        assert_eq!(copied, 50);
        let via_copy = contents(&pool).await?;

        sqlx::query("TRUNCATE fact_ml_bad_lumis").execute(&pool).await?;
        let outcome =
            copy_expert_onconflict_skip(&table, &mut conn, BAD_LUMI_COLUMNS, rows, false, None)
                .await?;
        assert_eq!(outcome.inserted(), 50);

        assert_eq!(contents(&pool).await?, via_copy);
        Ok(())
    }

    #[sqlx::test(migrator = "MIGRATOR")]
    #[ignore = "requires database"]
    async fn plain_copy_fails_on_conflict(pool: PgPool) -> EtlResult<()> {
        let table = bad_lumis_table();
        let mut conn = pool.acquire().await?;
        copy_expert(&table, &mut conn, BAD_LUMI_COLUMNS, vec![fact(1, 1)]).await?;

        let err = copy_expert(&table, &mut conn, BAD_LUMI_COLUMNS, vec![fact(1, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::Database(_)));
        Ok(())
    }

    #[sqlx::test(migrator = "MIGRATOR")]
    #[ignore = "requires database"]
    async fn failed_skip_copy_leaves_no_staging_table(pool: PgPool) -> EtlResult<()> {
        let table = bad_lumis_table();
        let mut conn = pool.acquire().await?;

        let err = copy_expert_onconflict_skip(
            &table,
            &mut conn,
            &["model_name", "dataset_id", "no_such_column"],
            vec![("m", 1i64, 2i64)],
            false,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EtlError::Database(_)));
        assert!(!staging_exists(&mut conn).await?);
        Ok(())
    }

    #[sqlx::test(migrator = "MIGRATOR")]
    #[ignore = "requires database"]
    async fn returning_ids_requires_pk(pool: PgPool) -> EtlResult<()> {
        let table = bad_lumis_table();
        let mut conn = pool.acquire().await?;

        let err = copy_expert_onconflict_skip(
            &table,
            &mut conn,
            BAD_LUMI_COLUMNS,
            vec![fact(1, 1)],
            true,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EtlError::Validation(_)));
        assert_eq!(BadLumiRepo::new(&pool).count(None).await?, 0);
        Ok(())
    }
}
