use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::models::{PendingRecord, TranscriptRecord};

use super::{OverrideStore, PendingStore, RecordStore, StoreError};

/// Record store backed by a single JSON export file: either a bare array of
/// records, or an envelope `{"records": [...], "speaker_hints": {id: {sid:
/// name}}}`.
#[derive(Debug, Default)]
pub struct JsonRecordStore {
    records: Vec<TranscriptRecord>,
    hints: HashMap<String, HashMap<String, String>>,
}

#[derive(Deserialize)]
struct RecordFile {
    #[serde(default)]
    records: Vec<TranscriptRecord>,
    #[serde(default)]
    speaker_hints: HashMap<String, HashMap<String, String>>,
}

impl JsonRecordStore {
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        if json.trim_start().starts_with('[') {
            let records: Vec<TranscriptRecord> = serde_json::from_str(json)?;
            return Ok(Self {
                records,
                hints: HashMap::new(),
            });
        }
        let file: RecordFile = serde_json::from_str(json)?;
        Ok(Self {
            records: file.records,
            hints: file.speaker_hints,
        })
    }

    pub fn from_records(records: Vec<TranscriptRecord>) -> Self {
        Self {
            records,
            hints: HashMap::new(),
        }
    }

    pub fn with_hints(mut self, id: &str, hints: HashMap<String, String>) -> Self {
        self.hints.insert(id.to_string(), hints);
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for JsonRecordStore {
    fn fetch_by_id(&self, id: &str) -> Result<Option<TranscriptRecord>, StoreError> {
        Ok(self.records.iter().find(|r| r.id == id).cloned())
    }

    fn fetch_overlap_window(
        &self,
        lo_ms: i64,
        hi_ms: i64,
        limit: usize,
    ) -> Result<Vec<TranscriptRecord>, StoreError> {
        let mut out: Vec<TranscriptRecord> = self
            .records
            .iter()
            .filter(|r| {
                let start = r.start_ms.or(r.end_ms);
                let end = r.end_ms.or(r.start_ms);
                match (start, end) {
                    (Some(s), Some(e)) => !(e < lo_ms || s > hi_ms),
                    _ => false,
                }
            })
            .cloned()
            .collect();
        out.sort_by_key(|r| r.start_ms.or(r.end_ms));
        out.truncate(limit);
        Ok(out)
    }

    fn fetch_start_in_range(
        &self,
        lo_ms: i64,
        hi_ms: i64,
        title_like: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TranscriptRecord>, StoreError> {
        let needle = title_like.map(str::to_lowercase);
        let mut out: Vec<TranscriptRecord> = self
            .records
            .iter()
            .filter(|r| {
                r.start_ms
                    .is_some_and(|s| s >= lo_ms && s <= hi_ms)
                    && needle
                        .as_deref()
                        .is_none_or(|n| r.title.to_lowercase().contains(n))
            })
            .cloned()
            .collect();
        out.sort_by_key(|r| r.start_ms);
        out.truncate(limit);
        Ok(out)
    }

    fn fetch_speaker_hints(&self, id: &str) -> Result<HashMap<String, String>, StoreError> {
        Ok(self.hints.get(id).cloned().unwrap_or_default())
    }
}

/// Pending records as `*.pending.json` files under a directory tree.
#[derive(Debug)]
pub struct DirPendingStore {
    root: PathBuf,
}

pub const PENDING_SUFFIX: &str = ".pending.json";

impl DirPendingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, base_name: &str) -> PathBuf {
        self.root.join(format!("{}{}", base_name, PENDING_SUFFIX))
    }

    fn collect(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), StoreError> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                Self::collect(&path, out)?;
            } else if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(PENDING_SUFFIX))
            {
                out.push(path);
            }
        }
        Ok(())
    }
}

impl PendingStore for DirPendingStore {
    fn list(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut out = Vec::new();
        if self.root.exists() {
            Self::collect(&self.root, &mut out)?;
        }
        out.sort();
        Ok(out)
    }

    fn load(&self, path: &Path) -> Result<PendingRecord, StoreError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, path: &Path, record: &PendingRecord) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(record)?)?;
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<(), StoreError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Manual overrides as `<record_id>.labels.json` files in one directory.
#[derive(Debug)]
pub struct DirOverrideStore {
    dir: PathBuf,
}

impl DirOverrideStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, record_id: &str) -> PathBuf {
        self.dir.join(format!("{}.labels.json", record_id))
    }
}

impl OverrideStore for DirOverrideStore {
    fn load(&self, record_id: &str) -> Result<HashMap<String, String>, StoreError> {
        let path = self.path_for(record_id);
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                // A corrupted override file should not block rendering
                warn!("ignoring unreadable override file {:?}: {}", path, e);
                Ok(HashMap::new())
            }
        }
    }

    fn save(&self, record_id: &str, mapping: &HashMap<String, String>) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(
            self.path_for(record_id),
            serde_json::to_string_pretty(mapping)?,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionType;

    fn record(id: &str, start: i64, end: i64) -> TranscriptRecord {
        TranscriptRecord {
            id: id.into(),
            title: format!("Meeting {}", id),
            participants_raw: None,
            speakers_json: None,
            start_ms: Some(start),
            end_ms: Some(end),
            raw_transcript: Some("[]".into()),
        }
    }

    #[test]
    fn test_overlap_window_query() {
        let store = JsonRecordStore::from_records(vec![
            record("a", 0, 100),
            record("b", 150, 250),
            record("c", 400, 500),
        ]);
        let hits = store.fetch_overlap_window(90, 200, 10).unwrap();
        let ids: Vec<&str> = hits.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_start_in_range_with_title_filter() {
        let mut rec = record("a", 100, 200);
        rec.title = "Weekly Sync".into();
        let store = JsonRecordStore::from_records(vec![rec, record("b", 120, 220)]);
        let hits = store.fetch_start_in_range(0, 300, Some("sync"), 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[test]
    fn test_from_json_envelope_and_hints() {
        let json = r#"{
            "records": [{"id": "m1", "title": "T", "audio_transcript": "[]"}],
            "speaker_hints": {"m1": {"1": "Jane Doe"}}
        }"#;
        let store = JsonRecordStore::from_json(json).unwrap();
        assert_eq!(store.len(), 1);
        let hints = store.fetch_speaker_hints("m1").unwrap();
        assert_eq!(hints.get("1").map(String::as_str), Some("Jane Doe"));
        assert!(store.fetch_speaker_hints("other").unwrap().is_empty());
    }

    #[test]
    fn test_pending_store_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirPendingStore::new(tmp.path());
        let pd = PendingRecord {
            meeting_title: "Jane 1:1".into(),
            meeting_date: "2024-03-10".into(),
            session_type: SessionType::OneOnOne,
            participants: vec!["Jane Doe".into()],
            quill_meeting_id: None,
            quill_title: None,
            quill_start_ms: None,
            quill_end_ms: None,
            transcript_snippet: None,
            summary_path: None,
        };
        let path = store.path_for("2024-03-10 Jane 1ː1");
        store.save(&path, &pd).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed, vec![path.clone()]);

        let loaded = store.load(&path).unwrap();
        assert_eq!(loaded.meeting_title, "Jane 1:1");
        assert_eq!(loaded.session_type, SessionType::OneOnOne);

        store.delete(&path).unwrap();
        assert!(store.list().unwrap().is_empty());
        // Deleting twice is fine
        store.delete(&path).unwrap();
    }

    #[test]
    fn test_override_store_roundtrip_and_corruption() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirOverrideStore::new(tmp.path().join("overrides"));
        assert!(store.load("m1").unwrap().is_empty());

        let mut mapping = HashMap::new();
        mapping.insert("id:3".to_string(), "Jane Doe".to_string());
        store.save("m1", &mapping).unwrap();
        assert_eq!(store.load("m1").unwrap(), mapping);

        std::fs::write(tmp.path().join("overrides/m2.labels.json"), "{broken").unwrap();
        assert!(store.load("m2").unwrap().is_empty());
    }
}
