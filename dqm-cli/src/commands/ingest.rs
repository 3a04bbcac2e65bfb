//! Ingestion commands - histogram extraction and ML bad-lumisection loading
//!
//! ```bash
//! dqmctl extract-lumisections-histos2d exports/ZeroBias_2017B.csv --run 297057
//! dqmctl load-ml-bad-lumis exports/ae_v1_bad_lumis.csv --json | jq .skipped
//! ```

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use dqm_core::RunNumber;
use dqm_etl::ingest::{
    extract_lumisection_histos2d, load_ml_bad_lumis, read_bad_lumi_file, read_histo_file,
    ExtractOptions, ExtractReport, LoadOptions, LoadReport,
};

use super::{print_json, Context, OutputFormat};
use crate::ui;

#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// CSV export with fromrun, fromlumi, hname, entries and histo columns
    pub file_path: PathBuf,

    /// Only extract this run (default: ingest.run_number from config, 297057)
    #[arg(long, conflicts_with = "all_runs")]
    pub run: Option<RunNumber>,

    /// Extract every run in the file
    #[arg(long)]
    pub all_runs: bool,

    /// Parse and count without touching the database
    #[arg(long)]
    pub dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl ExtractArgs {
    fn run_filter(&self, ctx: &Context) -> Option<RunNumber> {
        if self.all_runs {
            None
        } else {
            Some(self.run.unwrap_or(RunNumber(ctx.config.ingest.run_number)))
        }
    }
}

#[derive(Parser, Debug)]
pub struct LoadArgs {
    /// CSV with model_name, dataset_id, file_id, run_number, ls_number, me_id columns
    pub file_path: PathBuf,

    /// Parse and count without touching the database
    #[arg(long)]
    pub dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run_extract(args: ExtractArgs, ctx: &Context) -> Result<()> {
    let run = args.run_filter(ctx);
    let path = args.file_path.display().to_string();

    let report = if args.dry_run {
        let selection = read_histo_file(&args.file_path, run)
            .await
            .with_context(|| format!("Failed to read {}", path))?;
        ExtractReport::scanned(&selection)
    } else {
        let pool = ctx.pool().await?;
        let opts = ExtractOptions {
            run,
            dry_run: false,
            chunk_bytes: ctx.config.ingest.copy_chunk_bytes,
        };
        ui::with_spinner_async(
            format!("Extracting histograms from {}", path),
            |r: &ExtractReport| format!("Added {} histograms", r.histos_added),
            extract_lumisection_histos2d(&pool, &args.file_path, &opts),
        )
        .await
        .with_context(|| format!("Failed to extract histograms from {}", path))?
    };

    if args.json {
        return print_json(&report);
    }
    let scope = run.map_or_else(|| "all runs".to_string(), |r| format!("run {}", r));
    println!(
        "{} rows read, {} selected ({})",
        report.rows_read, report.rows_selected, scope
    );
    if args.dry_run {
        println!("Dry run: nothing written");
    } else {
        println!(
            "Added {} histograms ({} new runs, {} new lumisections)",
            report.histos_added, report.runs_created, report.lumisections_created
        );
    }
    Ok(())
}

pub async fn run_load_bad_lumis(args: LoadArgs, ctx: &Context) -> Result<()> {
    let path = args.file_path.display().to_string();

    let report = if args.dry_run {
        let records = read_bad_lumi_file(&args.file_path)
            .await
            .with_context(|| format!("Failed to read {}", path))?;
        LoadReport {
            rows_read: records.len() as u64,
            ..LoadReport::default()
        }
    } else {
        let pool = ctx.pool().await?;
        let opts = LoadOptions {
            dry_run: false,
            chunk_bytes: ctx.config.ingest.copy_chunk_bytes,
        };
        ui::with_spinner_async(
            format!("Loading bad lumisections from {}", path),
            |r: &LoadReport| format!("Inserted {}, skipped {}", r.inserted, r.skipped),
            load_ml_bad_lumis(&pool, &args.file_path, &opts),
        )
        .await
        .with_context(|| format!("Failed to load {}", path))?
    };

    match OutputFormat::Human.resolve(args.json) {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Human if args.dry_run => {
            println!("{} rows read. Dry run: nothing written", report.rows_read)
        }
        OutputFormat::Human => println!(
            "{} rows read: {} inserted, {} already present",
            report.rows_read, report.inserted, report.skipped
        ),
    }
    Ok(())
}
