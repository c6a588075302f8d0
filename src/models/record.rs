use serde::{Deserialize, Serialize};

/// Categorical tag controlling which weight/threshold profile applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionType {
    #[serde(rename = "1-on-1")]
    OneOnOne,
    #[serde(rename = "internal-sync")]
    InternalSync,
    #[serde(rename = "external-sync")]
    ExternalSync,
    #[serde(rename = "note-to-self")]
    NoteToSelf,
    #[serde(rename = "default")]
    #[serde(other)]
    Default,
}

impl Default for SessionType {
    fn default() -> Self {
        SessionType::Default
    }
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::OneOnOne => "1-on-1",
            SessionType::InternalSync => "internal-sync",
            SessionType::ExternalSync => "external-sync",
            SessionType::NoteToSelf => "note-to-self",
            SessionType::Default => "default",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "1-on-1" => SessionType::OneOnOne,
            "internal-sync" => SessionType::InternalSync,
            "external-sync" => SessionType::ExternalSync,
            "note-to-self" => SessionType::NoteToSelf,
            _ => SessionType::Default,
        }
    }

    /// Infer the session type from a meeting title when the summary's
    /// frontmatter does not carry one.
    pub fn from_title(title: &str) -> Self {
        let t = title.to_lowercase();
        if t.contains("1:1") || t.contains("1-1") || t.contains("1 on 1") {
            SessionType::OneOnOne
        } else if t.contains("sync") && t.contains("external") {
            SessionType::ExternalSync
        } else if t.contains("sync") {
            SessionType::InternalSync
        } else if t.contains("note") && t.contains("self") {
            SessionType::NoteToSelf
        } else {
            SessionType::Default
        }
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A saved summary awaiting a matched transcript. Created when a summary
/// arrives; deleted once a transcript has been rendered for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRecord {
    pub meeting_title: String,
    /// Local calendar date of the meeting, "YYYY-MM-DD"
    pub meeting_date: String,
    #[serde(default)]
    pub session_type: SessionType,
    /// Desired participants from the summary frontmatter, in order
    #[serde(default)]
    pub participants: Vec<String>,
    /// Explicit candidate id, when the summary source already knows it
    #[serde(default)]
    pub quill_meeting_id: Option<String>,
    /// Title as the recorder knew it, often different from meeting_title
    #[serde(default)]
    pub quill_title: Option<String>,
    #[serde(default)]
    pub quill_start_ms: Option<i64>,
    #[serde(default)]
    pub quill_end_ms: Option<i64>,
    /// Short leading excerpt of the transcript, the strongest match signal
    #[serde(default)]
    pub transcript_snippet: Option<String>,
    /// Path of the summary note this pending record belongs to
    #[serde(default)]
    pub summary_path: Option<String>,
}

impl PendingRecord {
    /// Title to match candidates against: the recorder's title when
    /// available, otherwise the summary's.
    pub fn lookup_title(&self) -> &str {
        self.quill_title.as_deref().unwrap_or(&self.meeting_title)
    }
}

/// An immutable transcript record from the external recorder. Read-only to
/// this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Raw participants string as the recorder stored it
    #[serde(default, alias = "participants")]
    pub participants_raw: Option<String>,
    /// Raw speaker metadata JSON, shape varies by recorder version
    #[serde(default, alias = "speakers")]
    pub speakers_json: Option<String>,
    #[serde(default, alias = "start")]
    pub start_ms: Option<i64>,
    #[serde(default, alias = "end")]
    pub end_ms: Option<i64>,
    /// Raw diarized transcript blob (JSON array or envelope)
    #[serde(default, alias = "audio_transcript")]
    pub raw_transcript: Option<String>,
}

impl TranscriptRecord {
    pub fn has_transcript(&self) -> bool {
        self.raw_transcript
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    pub fn length_min(&self) -> Option<i64> {
        match (self.start_ms, self.end_ms) {
            (Some(a), Some(b)) if b >= a => Some((b - a) / 1000 / 60),
            _ => None,
        }
    }

    /// One-line summary for log output.
    pub fn brief(&self) -> String {
        let length = self
            .length_min()
            .map(|m| format!("{} min", m))
            .unwrap_or_else(|| "unknown length".to_string());
        format!(
            "{} {:?} ({}, transcript: {})",
            self.id,
            self.title,
            length,
            if self.has_transcript() { "yes" } else { "no" }
        )
    }
}
