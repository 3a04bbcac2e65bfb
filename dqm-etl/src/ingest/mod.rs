//! CSV ingestion into the warehouse tables
//!
//! Files are parsed on a blocking thread, then written inside a single
//! transaction so a failed load leaves nothing behind.

pub mod bad_lumis;
pub mod histos2d;

pub use bad_lumis::{
    load_ml_bad_lumis, read_bad_lumi_file, scan_bad_lumis, LoadOptions, LoadReport,
};
pub use histos2d::{
    extract_lumisection_histos2d, read_histo_file, scan_histos, ExtractOptions, ExtractReport,
    HistoSelection, SelectedHisto,
};
