//! Lumisection repository

use std::collections::BTreeSet;

use dqm_core::LsNumber;
use sqlx::PgConnection;

use super::Resolved;
use crate::error::EtlResult;
use crate::pgsql::{BulkCopy, TableRef};

pub fn lumisections_table() -> TableRef {
    TableRef::new("lumisections")
}

/// Lumisection natural key: database id of its run plus its number
pub type LumisectionRef = (i64, LsNumber);

/// Get-or-create every lumisection in `keys`, returning their ids.
pub async fn ensure_lumisections(
    conn: &mut PgConnection,
    keys: &BTreeSet<LumisectionRef>,
    chunk_bytes: usize,
) -> EtlResult<Resolved<LumisectionRef>> {
    if keys.is_empty() {
        return Ok(Resolved::default());
    }

    let outcome = BulkCopy::new(lumisections_table(), &["run_id", "ls_number"])
        .chunk_bytes(chunk_bytes)
        .copy_expert_onconflict_skip(
            conn,
            keys.iter().map(|(run_id, ls)| (*run_id, ls.get())),
            false,
            None,
        )
        .await?;

    let (run_ids, ls_numbers): (Vec<i64>, Vec<i32>) =
        keys.iter().map(|(run_id, ls)| (*run_id, ls.get())).unzip();
    let rows: Vec<(i64, i64, i32)> = sqlx::query_as(
        r#"
        SELECT l.id, l.run_id, l.ls_number
        FROM lumisections l
        JOIN UNNEST($1::BIGINT[], $2::INT[]) AS k(run_id, ls_number)
          ON k.run_id = l.run_id AND k.ls_number = l.ls_number
        "#,
    )
    .bind(&run_ids[..])
    .bind(&ls_numbers[..])
    .fetch_all(&mut *conn)
    .await?;

    Ok(Resolved {
        ids: rows
            .into_iter()
            .map(|(id, run_id, ls)| ((run_id, LsNumber(ls)), id))
            .collect(),
        created: outcome.inserted(),
    })
}
