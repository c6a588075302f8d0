//! Duplicate-speaker consolidation. Diarization sometimes splits one
//! physical speaker across several ids; this pass merges key pairs whose
//! text, capture source, and turn pattern look like the same person.
//! Disabled by default because it can merge distinct people in larger
//! meetings.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::{ConsolidationConfig, IdentityConfig};
use crate::models::{SpeakerKey, TranscriptBlock};
use crate::text::sequence_ratio;

const TEXT_COMPARE_CHARS: usize = 500;

/// Compute a merge map (duplicate key -> surviving key). Keys earlier in
/// first-appearance order survive. When a local/self key is identifiable and
/// more than two keys exist, non-self pairs are tried first; the
/// unrestricted pass runs only if that merges nothing.
pub fn consolidate_speakers(
    blocks: &[TranscriptBlock],
    keys: &[SpeakerKey],
    identity: &IdentityConfig,
    cfg: &ConsolidationConfig,
    one_on_one: bool,
) -> HashMap<SpeakerKey, SpeakerKey> {
    let mut distinct: Vec<SpeakerKey> = Vec::new();
    for key in keys {
        if !distinct.contains(key) {
            distinct.push(key.clone());
        }
    }
    if distinct.len() < 2 {
        return HashMap::new();
    }

    let threshold = if one_on_one && distinct.len() > 2 {
        cfg.aggressive_threshold
    } else {
        cfg.similarity_threshold
    };

    let self_key = super::pick_anchor_key(blocks, keys, identity);
    let restrict = self_key.is_some() && distinct.len() > 2;

    let mut remap: HashMap<SpeakerKey, SpeakerKey> = HashMap::new();
    merge_pass(
        blocks,
        keys,
        &distinct,
        threshold,
        restrict.then(|| self_key.clone()).flatten().as_ref(),
        &mut remap,
    );
    if restrict && remap.is_empty() {
        merge_pass(blocks, keys, &distinct, threshold, None, &mut remap);
    }
    remap
}

fn merge_pass(
    blocks: &[TranscriptBlock],
    keys: &[SpeakerKey],
    distinct: &[SpeakerKey],
    threshold: f64,
    excluded: Option<&SpeakerKey>,
    remap: &mut HashMap<SpeakerKey, SpeakerKey>,
) {
    for i in 0..distinct.len() {
        for j in (i + 1)..distinct.len() {
            let (a, b) = (&distinct[i], &distinct[j]);
            if remap.contains_key(a) || remap.contains_key(b) {
                continue;
            }
            if excluded.is_some_and(|s| s == a || s == b) {
                continue;
            }
            let sim = speaker_similarity(blocks, keys, a, b);
            if sim >= threshold {
                debug!(from = %b, into = %a, similarity = sim, "merging speaker keys");
                remap.insert(b.clone(), a.clone());
            }
        }
    }
}

/// Pairwise likelihood that two keys are the same physical speaker:
/// 0.4 x text similarity + 0.3 x source-tag Jaccard + 0.3 x turn-alternation
/// frequency over the pair's merged, time-ordered blocks.
pub fn speaker_similarity(
    blocks: &[TranscriptBlock],
    keys: &[SpeakerKey],
    a: &SpeakerKey,
    b: &SpeakerKey,
) -> f64 {
    let text_a = concatenated_text(blocks, keys, a);
    let text_b = concatenated_text(blocks, keys, b);
    let text_score = if text_a.is_empty() || text_b.is_empty() {
        0.0
    } else {
        sequence_ratio(&text_a, &text_b)
    };

    let sources_a = source_set(blocks, keys, a);
    let sources_b = source_set(blocks, keys, b);
    let union = sources_a.union(&sources_b).count();
    let source_score = if union == 0 {
        0.0
    } else {
        sources_a.intersection(&sources_b).count() as f64 / union as f64
    };

    let alternation = alternation_frequency(blocks, keys, a, b);

    0.4 * text_score + 0.3 * source_score + 0.3 * alternation
}

fn concatenated_text(blocks: &[TranscriptBlock], keys: &[SpeakerKey], key: &SpeakerKey) -> String {
    let joined = blocks
        .iter()
        .zip(keys)
        .filter(|(_, k)| *k == key)
        .map(|(b, _)| b.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    joined.chars().take(TEXT_COMPARE_CHARS).collect()
}

fn source_set(
    blocks: &[TranscriptBlock],
    keys: &[SpeakerKey],
    key: &SpeakerKey,
) -> HashSet<String> {
    blocks
        .iter()
        .zip(keys)
        .filter(|(_, k)| *k == key)
        .filter_map(|(b, _)| b.source.as_deref())
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of adjacent transitions that switch speakers when the two keys'
/// blocks are merged and time-sorted.
fn alternation_frequency(
    blocks: &[TranscriptBlock],
    keys: &[SpeakerKey],
    a: &SpeakerKey,
    b: &SpeakerKey,
) -> f64 {
    let mut merged: Vec<(usize, &SpeakerKey, Option<i64>)> = blocks
        .iter()
        .zip(keys)
        .enumerate()
        .filter(|(_, (_, k))| *k == a || *k == b)
        .map(|(i, (block, k))| (i, k, block.start_ms))
        .collect();
    if merged.len() < 2 {
        return 0.0;
    }
    if merged.iter().all(|(_, _, start)| start.is_some()) {
        merged.sort_by_key(|(i, _, start)| (start.unwrap_or(0), *i));
    }
    let switches = merged
        .windows(2)
        .filter(|w| w[0].1 != w[1].1)
        .count();
    switches as f64 / (merged.len() - 1) as f64
}
