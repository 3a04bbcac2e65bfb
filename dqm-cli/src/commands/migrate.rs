//! Migrate command - apply, revert and inspect schema migrations

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use dqm_etl::db::migrations;

use super::{print_json, Context, OutputFormat};
use crate::ui;

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    #[command(subcommand)]
    pub command: MigrateCommand,
}

#[derive(Subcommand, Debug)]
pub enum MigrateCommand {
    /// Apply every pending migration
    Up,
    /// Revert the most recently applied migration
    Down,
    /// List migrations and whether each is applied
    Status {
        /// Output format
        #[arg(long, short, value_enum, default_value = "human")]
        output: OutputFormat,

        /// Shorthand for --output json
        #[arg(long, conflicts_with = "output")]
        json: bool,
    },
}

pub async fn run_migrate(args: MigrateArgs, ctx: &Context) -> Result<()> {
    let pool = ctx.pool().await?;

    match args.command {
        MigrateCommand::Up => {
            ui::with_spinner_async(
                "Applying migrations",
                |_| "Schema is up to date".to_string(),
                migrations::run(&pool),
            )
            .await
            .context("Failed to apply migrations")?;
        }
        MigrateCommand::Down => {
            let reverted = migrations::revert_last(&pool)
                .await
                .context("Failed to revert migration")?;
            match reverted {
                Some(version) => println!("Reverted migration {}", version),
                None => println!("No applied migrations to revert"),
            }
        }
        MigrateCommand::Status { output, json } => {
            let statuses = migrations::status(&pool)
                .await
                .context("Failed to read migration state")?;
            match output.resolve(json) {
                OutputFormat::Json => print_json(&statuses)?,
                OutputFormat::Human => {
                    for m in &statuses {
                        let mark = if m.applied { "applied" } else { "pending" };
                        println!("{:<16} {:<8} {}", m.version, mark, m.description);
                    }
                }
            }
        }
    }
    Ok(())
}
