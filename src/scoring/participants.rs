use std::collections::HashMap;

use serde_json::Value;

use crate::config::IdentityConfig;
use crate::models::TranscriptRecord;
use crate::text::{
    expand_aliases, fuzzy_name_match, normalize_person, split_participants_string, title_case,
};

/// Fraction of desired participants that fuzzily match at least one
/// candidate participant. Token-level on purpose: different name formats
/// ("Jane" vs "Jane Doe") should still count as a hit.
pub fn participant_overlap_fuzzy(
    desired: &[String],
    candidate: &[String],
    identity: &IdentityConfig,
) -> f64 {
    if desired.is_empty() {
        return 0.0;
    }
    let desired_norm = expand_aliases(desired, identity);
    let hits = desired_norm
        .iter()
        .filter(|w| candidate.iter().any(|h| fuzzy_name_match(w, h, identity)))
        .count();
    hits as f64 / desired_norm.len().max(1) as f64
}

/// Derive display participants for a candidate record, best source first:
/// speaker hints from the store, then the record's speaker metadata, then
/// its raw participants string.
pub fn derive_participants(
    record: &TranscriptRecord,
    hints: Option<&HashMap<String, String>>,
    identity: &IdentityConfig,
) -> Vec<String> {
    if let Some(hints) = hints {
        let parts = normalize_names(hints.values().cloned().collect(), identity);
        if !parts.is_empty() {
            return parts;
        }
    }

    if let Some(sj) = &record.speakers_json {
        let names = names_from_speakers_json(sj);
        let parts = normalize_names(names, identity);
        if !parts.is_empty() {
            return parts;
        }
    }

    record
        .participants_raw
        .as_deref()
        .map(|raw| split_participants_string(raw, identity))
        .unwrap_or_default()
}

fn normalize_names(names: Vec<String>, identity: &IdentityConfig) -> Vec<String> {
    let normalized: Vec<String> = names
        .iter()
        .map(|n| normalize_person(n))
        .filter(|n| !n.is_empty())
        .collect();
    expand_aliases(&normalized, identity)
        .iter()
        .map(|n| title_case(n))
        .filter(|n| !n.is_empty())
        .collect()
}

/// Pull names out of the record's speaker metadata JSON, tolerating the two
/// shapes the recorder has used: a bare list of speaker objects, or an
/// object with a "speakers" list.
fn names_from_speakers_json(speakers_json: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<Value>(speakers_json) else {
        return vec![];
    };
    let items = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("speakers") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => return vec![],
        },
        _ => return vec![],
    };
    items
        .iter()
        .filter_map(|obj| {
            let map = obj.as_object()?;
            map.get("name")
                .or_else(|| map.get("display_name"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> IdentityConfig {
        IdentityConfig::new("Alex Chen", &["me", "alex"])
    }

    #[test]
    fn test_overlap_in_unit_range() {
        let id = identity();
        let desired = vec!["Jane Doe".to_string(), "Bob Smith".to_string()];
        let cand = vec!["jane".to_string()];
        let s = participant_overlap_fuzzy(&desired, &cand, &id);
        assert!((0.0..=1.0).contains(&s));
        assert!((s - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_overlap_full_on_exact_tokens() {
        let id = identity();
        let desired = vec!["Jane Doe".to_string(), "me".to_string()];
        let cand = vec!["Jane Doe".to_string(), "Alex Chen".to_string()];
        assert_eq!(participant_overlap_fuzzy(&desired, &cand, &id), 1.0);
    }

    #[test]
    fn test_overlap_empty_desired_is_zero() {
        let id = identity();
        assert_eq!(
            participant_overlap_fuzzy(&[], &["Jane".to_string()], &id),
            0.0
        );
    }

    #[test]
    fn test_derive_participants_prefers_hints() {
        let id = identity();
        let record = TranscriptRecord {
            id: "m1".into(),
            title: "t".into(),
            participants_raw: Some("Someone Else".into()),
            speakers_json: None,
            start_ms: None,
            end_ms: None,
            raw_transcript: None,
        };
        let mut hints = HashMap::new();
        hints.insert("1".to_string(), "jane doe".to_string());
        let parts = derive_participants(&record, Some(&hints), &id);
        assert_eq!(parts, vec!["Jane Doe"]);
    }

    #[test]
    fn test_derive_participants_speakers_json_fallback() {
        let id = identity();
        let record = TranscriptRecord {
            id: "m1".into(),
            title: "t".into(),
            participants_raw: Some("Raw Name".into()),
            speakers_json: Some(r#"{"speakers": [{"name": "jane doe"}, {"display_name": "me"}]}"#.into()),
            start_ms: None,
            end_ms: None,
            raw_transcript: None,
        };
        let parts = derive_participants(&record, None, &id);
        assert_eq!(parts, vec!["Jane Doe", "Alex Chen"]);
    }

    #[test]
    fn test_derive_participants_raw_string_fallback() {
        let id = identity();
        let record = TranscriptRecord {
            id: "m1".into(),
            title: "t".into(),
            participants_raw: Some("Jane Doe & Bob".into()),
            speakers_json: Some("not json".into()),
            start_ms: None,
            end_ms: None,
            raw_transcript: None,
        };
        let parts = derive_participants(&record, None, &id);
        assert_eq!(parts, vec!["Jane Doe", "Bob"]);
    }
}
