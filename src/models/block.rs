use serde_json::Value;

/// One diarized audio block, normalized from the recorder's loose JSON.
#[derive(Debug, Clone, Default)]
pub struct TranscriptBlock {
    pub text: String,
    pub speaker_id: Option<String>,
    pub source: Option<String>,
    pub cluster: Option<String>,
    /// Explicit display label carried on the block, if any
    pub label: Option<String>,
    pub start_ms: Option<i64>,
}

/// Stable per-block speaker identity, independent of display name.
/// Resolved once per block through the ordered fallback chain:
/// explicit id, then source tag, then cluster tag, then position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpeakerKey {
    Id(String),
    Source(String),
    Cluster(String),
    Index(usize),
}

impl SpeakerKey {
    pub fn resolve(block: &TranscriptBlock, index: usize) -> Self {
        if let Some(id) = &block.speaker_id {
            return SpeakerKey::Id(id.clone());
        }
        if let Some(src) = &block.source {
            if !src.is_empty() {
                return SpeakerKey::Source(src.clone());
            }
        }
        if let Some(clu) = &block.cluster {
            return SpeakerKey::Cluster(clu.clone());
        }
        SpeakerKey::Index(index)
    }

    pub fn for_id(id: &str) -> Self {
        SpeakerKey::Id(id.to_string())
    }
}

impl std::fmt::Display for SpeakerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeakerKey::Id(v) => write!(f, "id:{}", v),
            SpeakerKey::Source(v) => write!(f, "src:{}", v),
            SpeakerKey::Cluster(v) => write!(f, "clu:{}", v),
            SpeakerKey::Index(v) => write!(f, "idx:{}", v),
        }
    }
}

/// Parse a raw transcript blob into blocks. The blob is either a JSON array
/// of block objects or an envelope `{"blocks": [...], ...}`. Anything
/// malformed yields an empty list; callers treat that as "no transcript".
pub fn parse_blocks(raw: &str) -> Vec<TranscriptBlock> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return vec![];
    }
    let value: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(_) => return vec![],
    };
    let items = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("blocks") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => return vec![],
        },
        _ => return vec![],
    };
    items.iter().filter_map(block_from_value).collect()
}

fn block_from_value(v: &Value) -> Option<TranscriptBlock> {
    let obj = v.as_object()?;
    let text = obj
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let speaker_id = ["speaker_id", "speakerId", "participant_id", "participantId"]
        .iter()
        .find_map(|k| obj.get(*k))
        .and_then(scalar_to_string);
    let source = obj
        .get("source")
        .and_then(scalar_to_string)
        .filter(|s| !s.is_empty());
    let cluster = obj.get("cluster").and_then(scalar_to_string);
    let label = extract_label(obj);
    let start_ms = obj.get("start").and_then(Value::as_i64).or_else(|| {
        obj.get("start")
            .and_then(Value::as_f64)
            .map(|f| f as i64)
    });

    Some(TranscriptBlock {
        text,
        speaker_id,
        source,
        cluster,
        label,
        start_ms,
    })
}

/// Explicit speaker-name label on a block: a string under one of the known
/// keys, or a nested object carrying name/display_name/label.
fn extract_label(obj: &serde_json::Map<String, Value>) -> Option<String> {
    for key in ["speaker_name", "display_name", "name", "label", "speaker"] {
        match obj.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => {
                return Some(s.trim().to_string());
            }
            Some(Value::Object(nested)) => {
                for inner in ["name", "display_name", "label"] {
                    if let Some(Value::String(s)) = nested.get(inner) {
                        if !s.trim().is_empty() {
                            return Some(s.trim().to_string());
                        }
                    }
                }
            }
            _ => {}
        }
    }
    None
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
