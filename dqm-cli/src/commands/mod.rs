//! Command implementations for dqmctl

pub mod histos;
pub mod ingest;
pub mod migrate;

use anyhow::{Context as _, Result};
use clap::ValueEnum;
use dqm_core::{DatabaseTarget, DqmConfig};
use dqm_etl::db::create_pool_with_options;
use sqlx::PgPool;
use tracing::debug;

pub use histos::run_histos;
pub use ingest::{run_extract, run_load_bad_lumis};
pub use migrate::run_migrate;

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub config: DqmConfig,
    /// `--database-url`, which wins over config and environment
    pub database_url: Option<String>,
}

impl Context {
    pub fn database_target(&self) -> Result<DatabaseTarget> {
        let url = self
            .database_url
            .as_deref()
            .or(self.config.database.url.as_deref());
        DatabaseTarget::resolve(url, |key| std::env::var(key).ok())
            .context("No database configured (set DATABASE_URL or DJANGO_DATABASE_NAME)")
    }

    pub async fn pool(&self) -> Result<PgPool> {
        let target = self.database_target()?;
        debug!(max_connections = self.config.database.max_connections, "connecting");
        create_pool_with_options(&target, self.config.database.max_connections)
            .await
            .context("Failed to connect to the database")
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON output (for piping to jq)
    Json,
}

impl OutputFormat {
    /// `--json` is shorthand for `--output json`
    pub fn resolve(self, json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            self
        }
    }
}

pub fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_url_wins_over_config() {
        let mut config = DqmConfig::default();
        config.database.url = Some("postgres://config/dqm".into());
        let ctx = Context {
            config,
            database_url: Some("postgres://flag/dqm".into()),
        };
        assert_eq!(
            ctx.database_target().unwrap(),
            DatabaseTarget::Url("postgres://flag/dqm".into())
        );
    }

    #[test]
    fn config_url_used_without_flag() {
        let mut config = DqmConfig::default();
        config.database.url = Some("postgres://config/dqm".into());
        let ctx = Context {
            config,
            database_url: None,
        };
        assert_eq!(
            ctx.database_target().unwrap(),
            DatabaseTarget::Url("postgres://config/dqm".into())
        );
    }

    #[test]
    fn json_shorthand() {
        assert_eq!(OutputFormat::Human.resolve(true), OutputFormat::Json);
        assert_eq!(OutputFormat::Human.resolve(false), OutputFormat::Human);
    }
}
