pub mod consolidate;

use std::collections::{BTreeMap, HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::config::{ConsolidationConfig, IdentityConfig};
use crate::models::{SessionType, SpeakerKey, TranscriptBlock};
use crate::text::{
    clean_display_name, is_self_name, norm_key, normalize_person, normalize_title, sequence_ratio,
};

static INLINE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z][A-Za-z .'-]{0,40}?):\s+").expect("valid regex"));

/// Final attribution product: a grouped body with no inline labels, plus the
/// key-to-name map and per-key block counts for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTranscript {
    pub body: String,
    pub speaker_map: BTreeMap<String, String>,
    pub block_counts: BTreeMap<String, usize>,
}

/// Naming context for one rendering: the summary and recorder titles plus
/// the two name rosters that seed the preference list. The titles often
/// disagree ("Weekly catch-up" vs "Jane Doe 1:1"), and either may be the
/// only one that names the counterpart.
#[derive(Debug, Clone, Default)]
pub struct AttributionContext {
    pub meeting_title: String,
    /// Title as the recorder stored it, when a record is in hand
    pub record_title: String,
    pub desired_participants: Vec<String>,
    pub store_participants: Vec<String>,
}

impl AttributionContext {
    fn titles(&self) -> [&str; 2] {
        [self.record_title.as_str(), self.meeting_title.as_str()]
    }
}

/// Assign display names to diarized speaker keys and render the grouped
/// transcript body.
///
/// Binding precedence, earlier steps winning except where noted: local-source
/// anchor, explicit block labels (which may relabel the anchor), saved
/// overrides for still-unbound keys, then an ordered walk over the remaining
/// keys. Externally curated hints are applied last and override everything.
pub fn attribute_and_render(
    blocks: &[TranscriptBlock],
    ctx: &AttributionContext,
    overrides: &HashMap<String, String>,
    hints: &HashMap<String, String>,
    identity: &IdentityConfig,
    ccfg: &ConsolidationConfig,
) -> RenderedTranscript {
    let mut keys: Vec<SpeakerKey> = blocks
        .iter()
        .enumerate()
        .map(|(i, b)| SpeakerKey::resolve(b, i))
        .collect();

    if ccfg.enabled {
        let one_on_one = SessionType::from_title(&ctx.meeting_title) == SessionType::OneOnOne;
        let remap = consolidate::consolidate_speakers(blocks, &keys, identity, ccfg, one_on_one);
        if !remap.is_empty() {
            debug!(merged = remap.len(), "consolidated duplicate speaker keys");
            for key in &mut keys {
                if let Some(target) = remap.get(key) {
                    *key = target.clone();
                }
            }
        }
    }

    let canonical = identity.canonical_name.clone();
    let mut mapping: HashMap<SpeakerKey, String> = HashMap::new();

    let anchor = pick_anchor_key(blocks, &keys, identity);
    if let Some(anchor) = &anchor {
        mapping.insert(anchor.clone(), canonical.clone());
    }

    let mut labeled: HashSet<SpeakerKey> = HashSet::new();
    for (block, key) in blocks.iter().zip(&keys) {
        let Some(label) = block.label.as_deref() else {
            continue;
        };
        if looks_like_title_fragment(label, &ctx.titles()) {
            debug!(%label, "skipping title-fragment speaker label");
            continue;
        }
        if labeled.insert(key.clone()) {
            mapping.insert(key.clone(), clean_display_name(label, identity));
        }
    }

    for (raw_key, name) in overrides {
        let key = parse_speaker_key(raw_key);
        if !mapping.contains_key(&key) {
            mapping.insert(key, clean_display_name(name, identity));
        }
    }

    let preferences = preference_names(ctx, identity);
    let mut placeholders = 0usize;
    for (block, key) in blocks.iter().zip(&keys) {
        if mapping.contains_key(key) {
            continue;
        }
        if block
            .source
            .as_deref()
            .is_some_and(|s| identity.self_sources.contains(&s.to_lowercase()))
        {
            mapping.insert(key.clone(), canonical.clone());
            continue;
        }
        if let Some(name) = inline_name(&block.text) {
            if is_self_name(&name, identity) {
                mapping.insert(key.clone(), canonical.clone());
            } else {
                mapping.insert(key.clone(), clean_display_name(&name, identity));
            }
            continue;
        }
        let used: HashSet<String> = mapping.values().map(|v| norm_key(v)).collect();
        match preferences
            .iter()
            .find(|n| !is_self_name(n, identity) && !used.contains(&norm_key(n)))
        {
            Some(name) => {
                mapping.insert(key.clone(), name.clone());
            }
            None => {
                placeholders += 1;
                mapping.insert(key.clone(), format!("Speaker {}", placeholders));
            }
        }
    }

    for name in mapping.values_mut() {
        if is_self_name(name, identity) {
            *name = canonical.clone();
        }
    }

    for (speaker_id, name) in hints {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if looks_like_title_fragment(name, &ctx.titles()) {
            debug!(%speaker_id, %name, "skipping title-fragment speaker hint");
            continue;
        }
        let mut display = clean_display_name(name, identity);
        if is_self_name(&display, identity) {
            display = canonical.clone();
        }
        mapping.insert(SpeakerKey::for_id(speaker_id), display);
    }
    if let Some(anchor) = anchor {
        mapping.entry(anchor).or_insert_with(|| canonical.clone());
    }

    render_grouped(blocks, &keys, &mapping, identity)
}

/// The key whose blocks most often carry a local-capture source tag; ties go
/// to the key seen first. At most one key is anchored per rendering.
fn pick_anchor_key(
    blocks: &[TranscriptBlock],
    keys: &[SpeakerKey],
    identity: &IdentityConfig,
) -> Option<SpeakerKey> {
    let mut order: Vec<SpeakerKey> = Vec::new();
    let mut counts: HashMap<SpeakerKey, usize> = HashMap::new();
    for (block, key) in blocks.iter().zip(keys) {
        let local = block
            .source
            .as_deref()
            .is_some_and(|s| identity.local_sources.contains(&s.to_lowercase()));
        if local {
            if !counts.contains_key(key) {
                order.push(key.clone());
            }
            *counts.entry(key.clone()).or_insert(0) += 1;
        }
    }
    let mut best: Option<(SpeakerKey, usize)> = None;
    for key in order {
        let count = counts[&key];
        if best.as_ref().is_none_or(|(_, b)| count > *b) {
            best = Some((key, count));
        }
    }
    best.map(|(key, _)| key)
}

/// Labels sometimes carry a meeting title instead of a person: a joined
/// title ("A <> B"), or text that is a prefix, substring, or near-duplicate
/// of either title's leading segment.
fn looks_like_title_fragment(name: &str, titles: &[&str]) -> bool {
    if name.contains("<>") {
        return true;
    }
    let n = normalize_title(name);
    if n.is_empty() {
        return false;
    }
    titles.iter().any(|title| {
        let lead = normalize_title(lead_segment(title));
        !lead.is_empty()
            && (lead.starts_with(&n)
                || lead.contains(&n)
                || n.contains(&lead)
                || sequence_ratio(&n, &lead) >= 0.78)
    })
}

fn lead_segment(title: &str) -> &str {
    title
        .split(['|', '-', ':', '\u{2013}', '\u{2014}'])
        .next()
        .unwrap_or("")
}

/// Ordered candidate names for unbound keys: canonical self first, then
/// people parsed from the titles' lead segments (recorder title first),
/// then the requested roster, then store-derived participants.
/// Deduplicated case-insensitively.
fn preference_names(ctx: &AttributionContext, identity: &IdentityConfig) -> Vec<String> {
    let mut out = vec![identity.canonical_name.clone()];
    let mut seen: HashSet<String> = out.iter().map(|n| norm_key(n)).collect();

    let mut title_people: Vec<String> = Vec::new();
    for title in ctx.titles() {
        for person in lead_segment(title)
            .replace('&', "/")
            .split(['/', ',', ';'])
            .map(normalize_person)
            .filter(|p| !p.is_empty())
        {
            if !title_people.contains(&person) {
                title_people.push(person);
            }
        }
    }

    for raw in title_people
        .iter()
        .chain(ctx.desired_participants.iter())
        .chain(ctx.store_participants.iter())
    {
        let name = clean_display_name(raw, identity);
        if name.is_empty() {
            continue;
        }
        if seen.insert(norm_key(&name)) {
            out.push(name);
        }
    }
    out
}

fn inline_name(text: &str) -> Option<String> {
    INLINE_NAME_RE
        .captures(text.trim_start())
        .map(|c| c[1].trim().to_string())
        .filter(|n| !n.is_empty())
}

/// Parse an override key back into a SpeakerKey. Bare keys with no prefix
/// are treated as explicit speaker ids.
pub fn parse_speaker_key(raw: &str) -> SpeakerKey {
    if let Some(v) = raw.strip_prefix("id:") {
        return SpeakerKey::Id(v.to_string());
    }
    if let Some(v) = raw.strip_prefix("src:") {
        return SpeakerKey::Source(v.to_string());
    }
    if let Some(v) = raw.strip_prefix("clu:") {
        return SpeakerKey::Cluster(v.to_string());
    }
    if let Some(v) = raw.strip_prefix("idx:") {
        if let Ok(i) = v.parse::<usize>() {
            return SpeakerKey::Index(i);
        }
    }
    SpeakerKey::Id(raw.to_string())
}

fn render_grouped(
    blocks: &[TranscriptBlock],
    keys: &[SpeakerKey],
    mapping: &HashMap<SpeakerKey, String>,
    identity: &IdentityConfig,
) -> RenderedTranscript {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut block_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut seen_keys: Vec<SpeakerKey> = Vec::new();

    let mut current: Option<(SpeakerKey, Vec<String>)> = None;
    for (block, key) in blocks.iter().zip(keys) {
        if !seen_keys.contains(key) {
            seen_keys.push(key.clone());
        }
        let text = strip_tokens(&block.text, identity);
        if text.is_empty() {
            continue;
        }
        *block_counts.entry(key.to_string()).or_insert(0) += 1;
        match &mut current {
            Some((k, parts)) if k == key => parts.push(text),
            _ => {
                if let Some((_, parts)) = current.take() {
                    paragraphs.push(parts.join(" "));
                }
                current = Some((key.clone(), vec![text]));
            }
        }
    }
    if let Some((_, parts)) = current {
        paragraphs.push(parts.join(" "));
    }

    let speaker_map: BTreeMap<String, String> = seen_keys
        .iter()
        .filter_map(|k| mapping.get(k).map(|name| (k.to_string(), name.clone())))
        .collect();

    RenderedTranscript {
        body: paragraphs.join("\n\n"),
        speaker_map,
        block_counts,
    }
}

/// Remove configured strip tokens and collapse all whitespace, including
/// internal newlines, to single spaces.
fn strip_tokens(text: &str, identity: &IdentityConfig) -> String {
    let mut out = text.to_string();
    for token in &identity.strip_tokens {
        out = out.replace(token, " ");
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Speaker-id to name hints embedded in a record's own speaker metadata,
/// used when the store carries no curated hints for the record.
pub fn speaker_hints_from_json(speakers_json: &str) -> HashMap<String, String> {
    let Ok(value) = serde_json::from_str::<Value>(speakers_json) else {
        return HashMap::new();
    };
    let items = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("speakers") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => return HashMap::new(),
        },
        _ => return HashMap::new(),
    };
    let mut out = HashMap::new();
    for item in items {
        let Some(obj) = item.as_object() else { continue };
        let id = ["id", "speaker_id", "speakerId"]
            .iter()
            .find_map(|k| obj.get(*k))
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        let name = obj
            .get("name")
            .or_else(|| obj.get("display_name"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let (Some(id), Some(name)) = (id, name) {
            out.insert(id, name.to_string());
        }
    }
    out
}
