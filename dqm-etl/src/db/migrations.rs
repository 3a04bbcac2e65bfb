//! Schema migrations for the warehouse tables
//!
//! Every migration under `migrations/` is reversible, so the fact tables
//! can be downgraded one step at a time.

use serde::Serialize;
use sqlx::migrate::Migrate;
use sqlx::PgPool;
use tracing::info;

use crate::error::EtlResult;
use crate::MIGRATOR;

/// One known migration and whether the database has applied it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub version: i64,
    pub description: String,
    pub applied: bool,
}

/// Apply all pending migrations
pub async fn run(pool: &PgPool) -> EtlResult<()> {
    info!("Running warehouse migrations...");
    MIGRATOR.run(pool).await?;
    Ok(())
}

/// Revert the most recently applied migration, returning its version.
pub async fn revert_last(pool: &PgPool) -> EtlResult<Option<i64>> {
    let mut applied = applied_versions(pool).await?;
    applied.sort_unstable();

    let Some(latest) = applied.pop() else {
        info!("No migrations applied; nothing to revert");
        return Ok(None);
    };
    let target = applied.last().copied().unwrap_or(0);

    info!(version = latest, "Reverting migration");
    MIGRATOR.undo(pool, target).await?;
    Ok(Some(latest))
}

/// List every migration shipped with the binary alongside its state.
pub async fn status(pool: &PgPool) -> EtlResult<Vec<MigrationStatus>> {
    let applied = applied_versions(pool).await?;
    Ok(MIGRATOR
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .map(|m| MigrationStatus {
            version: m.version,
            description: m.description.to_string(),
            applied: applied.contains(&m.version),
        })
        .collect())
}

/// Applied versions; empty when the bookkeeping table does not exist yet.
async fn applied_versions(pool: &PgPool) -> EtlResult<Vec<i64>> {
    let mut conn = pool.acquire().await?;
    let (tracked,): (bool,) =
        sqlx::query_as("SELECT to_regclass('_sqlx_migrations') IS NOT NULL")
            .fetch_one(&mut *conn)
            .await?;
    if !tracked {
        return Ok(Vec::new());
    }
    let applied = conn.list_applied_migrations().await?;
    Ok(applied.into_iter().map(|m| m.version).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_migration_is_reversible() {
        let ups: Vec<i64> = MIGRATOR
            .iter()
            .filter(|m| m.migration_type.is_up_migration())
            .map(|m| m.version)
            .collect();
        let downs: Vec<i64> = MIGRATOR
            .iter()
            .filter(|m| m.migration_type.is_down_migration())
            .map(|m| m.version)
            .collect();

        assert_eq!(ups.len(), 3);
        assert_eq!(ups, downs);
    }

    #[sqlx::test(migrations = false)]
    #[ignore = "requires database"]
    async fn status_on_fresh_database_creates_nothing(pool: PgPool) -> EtlResult<()> {
        let statuses = status(&pool).await?;
        assert_eq!(statuses.len(), 3);
        assert!(statuses.iter().all(|m| !m.applied));
        assert_eq!(revert_last(&pool).await?, None);

        let (tracked,): (bool,) =
            sqlx::query_as("SELECT to_regclass('_sqlx_migrations') IS NOT NULL")
                .fetch_one(&pool)
                .await?;
        assert!(!tracked);
        Ok(())
    }

    #[sqlx::test(migrations = false)]
    #[ignore = "requires database"]
    async fn upgrade_then_downgrade_fact_table(pool: PgPool) -> EtlResult<()> {
        run(&pool).await?;
        assert!(status(&pool).await?.iter().all(|m| m.applied));

        let reverted = revert_last(&pool).await?;
        assert_eq!(reverted, Some(20240326160950));

        let exists: (bool,) = sqlx::query_as("SELECT to_regclass('fact_ml_bad_lumis') IS NOT NULL")
            .fetch_one(&pool)
            .await?;
        assert!(!exists.0);

        let pending: Vec<_> = status(&pool)
            .await?
            .into_iter()
            .filter(|m| !m.applied)
            .map(|m| m.description)
            .collect();
        assert_eq!(pending, vec!["add ml bad lumis".to_string()]);
        Ok(())
    }
}
