//! Extraction of per-lumisection 2D histograms from DQM CSV exports.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use dqm_core::config::DEFAULT_RUN_NUMBER;
use dqm_core::{HistoRecord, LsNumber, LumisectionKey, RecordReader, RunNumber};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use crate::db::repos::{ensure_lumisections, ensure_runs, histos, NewHisto2D};
use crate::error::{EtlError, EtlResult};
use crate::pgsql::DEFAULT_CHUNK_BYTES;

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Keep only rows of this run; `None` keeps every run
    pub run: Option<RunNumber>,
    pub dry_run: bool,
    pub chunk_bytes: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            run: Some(RunNumber(DEFAULT_RUN_NUMBER)),
            dry_run: false,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    pub rows_read: u64,
    pub rows_selected: u64,
    pub runs_created: u64,
    pub lumisections_created: u64,
    pub histos_added: u64,
}

impl ExtractReport {
    /// Counts known before touching the database
    pub fn scanned(selection: &HistoSelection) -> Self {
        Self {
            rows_read: selection.rows_read,
            rows_selected: selection.histos.len() as u64,
            ..Self::default()
        }
    }
}

/// A histogram row that passed the run filter, payload already decoded
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedHisto {
    pub key: LumisectionKey,
    pub title: String,
    pub entries: i64,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Default)]
pub struct HistoSelection {
    pub rows_read: u64,
    pub histos: Vec<SelectedHisto>,
}

impl HistoSelection {
    pub fn runs(&self) -> BTreeSet<RunNumber> {
        self.histos.iter().map(|h| h.key.run).collect()
    }
}

/// Read every record, keeping those of `run` (all runs when `None`).
///
/// Stops at the first malformed row.
pub fn scan_histos<R: Read>(
    reader: RecordReader<R, HistoRecord>,
    run: Option<RunNumber>,
) -> dqm_core::Result<HistoSelection> {
    let mut selection = HistoSelection::default();
    for record in reader {
        let record = record?;
        selection.rows_read += 1;
        if run.is_some_and(|run| record.run() != run) {
            continue;
        }
        let data = record.payload()?;
        selection.histos.push(SelectedHisto {
            key: record.key(),
            entries: record.entries_count(),
            title: record.title,
            data,
        });
    }
    Ok(selection)
}

/// Scan a histogram export on the blocking pool.
pub async fn read_histo_file(
    path: impl AsRef<Path>,
    run: Option<RunNumber>,
) -> EtlResult<HistoSelection> {
    let owned = path.as_ref().to_path_buf();
    let selection = tokio::task::spawn_blocking(move || {
        let reader = RecordReader::<_, HistoRecord>::open(&owned)?;
        scan_histos(reader, run)
    })
    .await??;
    Ok(selection)
}

/// Extract the histograms of `path` into `lumisection_histos2d`.
///
/// Runs and lumisections referenced by the selected rows are created on
/// the fly; histograms themselves are always appended.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub async fn extract_lumisection_histos2d(
    pool: &PgPool,
    path: impl AsRef<Path>,
    opts: &ExtractOptions,
) -> EtlResult<ExtractReport> {
    let selection = read_histo_file(path, opts.run).await?;

    let mut report = ExtractReport::scanned(&selection);
    info!(
        rows_read = report.rows_read,
        rows_selected = report.rows_selected,
        "scanned histogram file"
    );
    if selection.histos.is_empty() {
        if let Some(run) = opts.run {
            warn!(%run, rows_read = report.rows_read, "no rows for run; nothing to extract");
        }
        return Ok(report);
    }
    if opts.dry_run {
        return Ok(report);
    }

    let mut tx = pool.begin().await?;

    let runs = ensure_runs(&mut *tx, &selection.runs(), opts.chunk_bytes).await?;
    report.runs_created = runs.created;

    let mut refs = Vec::with_capacity(selection.histos.len());
    for histo in &selection.histos {
        let run_id = runs.get(&histo.key.run).ok_or_else(|| EtlError::NotFound {
            resource: "run",
            id: histo.key.run.to_string(),
        })?;
        refs.push((run_id, histo.key.ls));
    }
    let unique: BTreeSet<(i64, LsNumber)> = refs.iter().copied().collect();
    let lumis = ensure_lumisections(&mut *tx, &unique, opts.chunk_bytes).await?;
    report.lumisections_created = lumis.created;
    debug!(
        runs = runs.ids.len(),
        lumisections = lumis.ids.len(),
        "resolved lumisection ids"
    );

    let mut rows = Vec::with_capacity(selection.histos.len());
    for (histo, lumi_ref) in selection.histos.into_iter().zip(refs) {
        let lumisection_id = lumis.get(&lumi_ref).ok_or_else(|| EtlError::NotFound {
            resource: "lumisection",
            id: histo.key.to_string(),
        })?;
        rows.push(NewHisto2D {
            lumisection_id,
            title: histo.title,
            entries: histo.entries,
            data: histo.data,
        });
    }
    report.histos_added = histos::bulk_create(&mut *tx, rows, opts.chunk_bytes).await?;

    tx.commit().await?;
    info!(
        histos_added = report.histos_added,
        runs_created = report.runs_created,
        lumisections_created = report.lumisections_created,
        "histograms extracted"
    );
    Ok(report)
}
