pub mod json;

pub use json::{DirOverrideStore, DirPendingStore, JsonRecordStore};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::{PendingRecord, TranscriptRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Read-only source of transcript records. The timeout/retry policy of the
/// backing store belongs to the implementation, not the matching core.
pub trait RecordStore {
    fn fetch_by_id(&self, id: &str) -> Result<Option<TranscriptRecord>, StoreError>;

    /// Records whose [start, end] interval intersects [lo_ms, hi_ms],
    /// ordered by start ascending.
    fn fetch_overlap_window(
        &self,
        lo_ms: i64,
        hi_ms: i64,
        limit: usize,
    ) -> Result<Vec<TranscriptRecord>, StoreError>;

    /// Records whose start falls inside [lo_ms, hi_ms], optionally filtered
    /// by a case-insensitive title substring, ordered by start ascending.
    fn fetch_start_in_range(
        &self,
        lo_ms: i64,
        hi_ms: i64,
        title_like: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TranscriptRecord>, StoreError>;

    /// Externally curated speaker_id -> name hints for one record.
    fn fetch_speaker_hints(&self, id: &str) -> Result<HashMap<String, String>, StoreError>;
}

/// Storage for pending records awaiting reconciliation.
pub trait PendingStore {
    fn list(&self) -> Result<Vec<PathBuf>, StoreError>;
    fn load(&self, path: &Path) -> Result<PendingRecord, StoreError>;
    fn save(&self, path: &Path, record: &PendingRecord) -> Result<(), StoreError>;
    fn delete(&self, path: &Path) -> Result<(), StoreError>;
}

/// Storage for manual speaker-label overrides, keyed by record id.
/// Read-then-write without locking: overrides are operator-driven and
/// low-frequency, so last writer wins.
pub trait OverrideStore {
    fn load(&self, record_id: &str) -> Result<HashMap<String, String>, StoreError>;
    fn save(&self, record_id: &str, mapping: &HashMap<String, String>) -> Result<(), StoreError>;
}
