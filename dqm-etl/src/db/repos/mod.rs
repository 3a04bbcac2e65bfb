//! Repository implementations for database access
//!
//! Each repository follows these patterns:
//! - Bulk writes go through COPY, never row-by-row INSERT
//! - Get-or-create is a conflict-skipping copy plus one lookup (no check-then-insert)
//! - List operations use JOINs and a window count (no N+1)

pub mod bad_lumis;
pub mod histos;
pub mod lumisections;
pub mod runs;

use std::collections::HashMap;
use std::hash::Hash;

pub use bad_lumis::{BadLumiRepo, BAD_LUMI_COLUMNS};
pub use histos::{HistoRepo, LumisectionHisto2D, NewHisto2D, HISTO_COLUMNS};
pub use lumisections::ensure_lumisections;
pub use runs::ensure_runs;

/// Database ids of a batch of natural keys after get-or-create
#[derive(Debug, Clone)]
pub struct Resolved<K> {
    pub ids: HashMap<K, i64>,
    /// How many of the keys did not exist before
    pub created: u64,
}

impl<K: Eq + Hash> Resolved<K> {
    pub fn get(&self, key: &K) -> Option<i64> {
        self.ids.get(key).copied()
    }
}

impl<K> Default for Resolved<K> {
    fn default() -> Self {
        Self {
            ids: HashMap::new(),
            created: 0,
        }
    }
}
