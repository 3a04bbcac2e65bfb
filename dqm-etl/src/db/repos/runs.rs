//! Run repository
//!
//! Runs are created implicitly by ingestion; nothing else writes them.

use std::collections::BTreeSet;

use dqm_core::RunNumber;
use sqlx::PgConnection;

use super::Resolved;
use crate::error::EtlResult;
use crate::pgsql::{BulkCopy, TableRef};

pub fn runs_table() -> TableRef {
    TableRef::new("runs")
}

/// Get-or-create every run in `runs`, returning their ids.
pub async fn ensure_runs(
    conn: &mut PgConnection,
    runs: &BTreeSet<RunNumber>,
    chunk_bytes: usize,
) -> EtlResult<Resolved<RunNumber>> {
    if runs.is_empty() {
        return Ok(Resolved::default());
    }

    let outcome = BulkCopy::new(runs_table(), &["run_number"])
        .chunk_bytes(chunk_bytes)
        .copy_expert_onconflict_skip(conn, runs.iter().map(|run| (run.get(),)), true, Some("id"))
        .await?;

    let numbers: Vec<i32> = runs.iter().map(|run| run.get()).collect();
    let rows: Vec<(i64, i32)> =
        sqlx::query_as("SELECT id, run_number FROM runs WHERE run_number = ANY($1)")
            .bind(&numbers[..])
            .fetch_all(&mut *conn)
            .await?;

    Ok(Resolved {
        ids: rows
            .into_iter()
            .map(|(id, number)| (RunNumber(number), id))
            .collect(),
        created: outcome.inserted(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MIGRATOR;
    use sqlx::PgPool;

    #[sqlx::test(migrator = "MIGRATOR")]
    #[ignore = "requires database"]
    async fn ensure_runs_is_idempotent(pool: PgPool) -> EtlResult<()> {
        let mut conn = pool.acquire().await?;
        let first: BTreeSet<_> = [RunNumber(297057), RunNumber(297100)].into();
        let resolved = ensure_runs(&mut conn, &first, 1024).await?;
        assert_eq!(resolved.created, 2);
        assert_eq!(resolved.ids.len(), 2);

        let second: BTreeSet<_> = [RunNumber(297057), RunNumber(297101)].into();
        let again = ensure_runs(&mut conn, &second, 1024).await?;
        assert_eq!(again.created, 1);
        assert_eq!(again.get(&RunNumber(297057)), resolved.get(&RunNumber(297057)));
        Ok(())
    }
}
