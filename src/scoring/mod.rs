pub mod participants;
pub mod snippet;
pub mod time;
pub mod title;

pub use participants::{derive_participants, participant_overlap_fuzzy};
pub use snippet::snippet_similarity;
pub use time::{local_day_bounds_ms, same_local_calendar_day, time_proximity};
pub use title::{extract_components, title_similarity};

use std::collections::{HashMap, HashSet};

use crate::config::{IdentityConfig, MatchConfig};
use crate::models::{parse_blocks, PendingRecord, ScoreBreakdown, SessionType, TranscriptRecord};

/// Inputs shared across all candidates for one pending record.
#[derive(Debug, Clone)]
pub struct ScoreContext<'a> {
    pub session_type: SessionType,
    pub meeting_date: &'a str,
    pub needle_title: &'a str,
    pub desired_participants: &'a [String],
    pub transcript_snippet: Option<&'a str>,
    pub center_ms: i64,
    pub lo_ms: i64,
    pub hi_ms: i64,
}

/// Candidate window and center for a pending record: the configured window
/// around noon UTC of the meeting date, re-centered on the recorder's
/// explicit start/end midpoint when those are known.
pub fn pending_window(pending: &PendingRecord, window_hours: i64) -> Option<(i64, i64, i64)> {
    let explicit_center = match (pending.quill_start_ms, pending.quill_end_ms) {
        (Some(s), Some(e)) => Some((s + e) / 2),
        (Some(s), None) => Some(s),
        (None, Some(e)) => Some(e),
        (None, None) => None,
    };

    if let Some((lo, hi)) = local_day_bounds_ms(&pending.meeting_date, window_hours) {
        let center = explicit_center.unwrap_or((lo + hi) / 2);
        return Some((lo, hi, center));
    }

    // Unparseable date: fall back to the explicit timestamps if we have them
    explicit_center.map(|center| {
        let half = window_hours * 60 * 60 * 1000;
        (center - half, center + half, center)
    })
}

/// Score one candidate. Deterministic pure function of the normalized
/// inputs; all components are retained in the breakdown for diagnostics.
pub fn score_candidate_in_window(
    ctx: &ScoreContext<'_>,
    candidate: &TranscriptRecord,
    candidate_participants: &[String],
    cfg: &MatchConfig,
    identity: &IdentityConfig,
) -> ScoreBreakdown {
    let desired: Vec<String> = ctx
        .desired_participants
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    let overlap = participant_overlap_fuzzy(&desired, candidate_participants, identity);
    let title_score = title_similarity(ctx.needle_title, &candidate.title, &cfg.known_names);
    let time_score = time_proximity(
        candidate.start_ms,
        candidate.end_ms,
        ctx.center_ms,
        ctx.lo_ms,
        ctx.hi_ms,
    );
    let same_day_bonus = if same_local_calendar_day(ctx.meeting_date, candidate.start_ms) {
        0.10
    } else {
        0.0
    };

    let snippet = ctx
        .transcript_snippet
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let transcript_score = match (snippet, candidate.raw_transcript.as_deref()) {
        (Some(s), Some(raw)) => snippet_similarity(s, &parse_blocks(raw)),
        _ => 0.0,
    };

    let (set_bonus, set_penalty) =
        set_adjustments(ctx.session_type, &desired, candidate_participants);

    let group_size_penalty = if ctx.session_type == SessionType::NoteToSelf
        && candidate_participants.len() > 1
    {
        0.15
    } else {
        0.0
    };

    let w = cfg.weights_for(ctx.session_type);
    // Transcript content, when present, is the most trustworthy evidence:
    // it takes 60% of the weight and demotes the noisier roster and title
    // signals.
    let weighted = if snippet.is_some() {
        (w.overlap * 0.2) * overlap
            + (w.title * 0.2) * title_score
            + (w.time * 0.5) * time_score
            + 0.60 * transcript_score
    } else {
        w.overlap * overlap + w.title * title_score + w.time * time_score
    };

    let composite = weighted + same_day_bonus + set_bonus - set_penalty - group_size_penalty;

    ScoreBreakdown {
        overlap,
        title_score,
        time_score,
        transcript_score,
        same_day_bonus,
        set_bonus,
        set_penalty,
        group_size_penalty,
        composite,
        candidate_participants: candidate_participants.to_vec(),
        desired_participants: desired,
    }
}

/// Convenience wrapper that derives the window and candidate participants
/// from the records themselves.
pub fn score_candidate(
    pending: &PendingRecord,
    candidate: &TranscriptRecord,
    hints: Option<&HashMap<String, String>>,
    cfg: &MatchConfig,
    identity: &IdentityConfig,
) -> ScoreBreakdown {
    let (lo_ms, hi_ms, center_ms) =
        pending_window(pending, cfg.window_hours).unwrap_or((0, 1, 0));
    let ctx = ScoreContext {
        session_type: pending.session_type,
        meeting_date: &pending.meeting_date,
        needle_title: pending.lookup_title(),
        desired_participants: &pending.participants,
        transcript_snippet: pending.transcript_snippet.as_deref(),
        center_ms,
        lo_ms,
        hi_ms,
    };
    let candidate_participants = derive_participants(candidate, hints, identity);
    score_candidate_in_window(&ctx, candidate, &candidate_participants, cfg, identity)
}

/// Set-logic adjustments: the desired roster is treated as (mostly) exact.
fn set_adjustments(
    session_type: SessionType,
    desired: &[String],
    candidate: &[String],
) -> (f64, f64) {
    let mut set_bonus = 0.0;
    let mut set_penalty = 0.0;

    if desired.is_empty() {
        return (set_bonus, set_penalty);
    }

    let dset: HashSet<String> = desired.iter().map(|p| p.to_lowercase()).collect();
    let cset: HashSet<String> = candidate.iter().map(|p| p.to_lowercase()).collect();

    if dset == cset {
        set_bonus += 0.25;
    } else {
        if dset.is_subset(&cset) {
            let extras = cset.len().saturating_sub(dset.len());
            set_penalty += (0.04 * extras as f64).min(0.12);
        }
        let missing = dset.difference(&cset).count();
        if missing > 0 {
            set_penalty += (0.18 + 0.10 * (missing as f64 - 1.0)).min(0.35);
        }
    }

    // A 1:1 should be exactly two people
    if session_type == SessionType::OneOnOne {
        if cset.len() == 2 && dset.len() == 2 && dset == cset {
            set_bonus += 0.12;
        } else if cset.len() > 2 {
            set_penalty += 0.10;
        }
    }

    (set_bonus, set_penalty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionType;

    fn identity() -> IdentityConfig {
        IdentityConfig::new("Me", &["me"])
    }

    fn candidate(start_ms: i64, end_ms: i64) -> TranscriptRecord {
        TranscriptRecord {
            id: "m1".into(),
            title: "Jane Doe 1:1".into(),
            participants_raw: Some("Me, Jane Doe".into()),
            speakers_json: None,
            start_ms: Some(start_ms),
            end_ms: Some(end_ms),
            raw_transcript: Some(r#"[{"text": "hello", "speaker_id": "A"}]"#.into()),
        }
    }

    fn pending() -> PendingRecord {
        PendingRecord {
            meeting_title: "Jane 1:1".into(),
            meeting_date: "2024-03-10".into(),
            session_type: SessionType::OneOnOne,
            participants: vec!["Me".into(), "Jane Doe".into()],
            quill_meeting_id: None,
            quill_title: None,
            quill_start_ms: None,
            quill_end_ms: None,
            transcript_snippet: None,
            summary_path: None,
        }
    }

    fn noon_ms(date: &str) -> i64 {
        local_day_bounds_ms(date, 0).unwrap().0
    }

    #[test]
    fn test_matching_one_on_one_clears_threshold() {
        let cfg = MatchConfig::default();
        let id = identity();
        let noon = noon_ms("2024-03-10");
        let bd = score_candidate(&pending(), &candidate(noon, noon + 3_600_000), None, &cfg, &id);
        assert!(
            bd.composite >= 0.45,
            "expected composite above the 1-on-1 threshold, got {}",
            bd.composite
        );
        assert_eq!(bd.overlap, 1.0);
        assert!(bd.set_bonus >= 0.25 + 0.12 - 1e-9);
    }

    #[test]
    fn test_composite_is_order_insensitive() {
        let cfg = MatchConfig::default();
        let id = identity();
        let noon = noon_ms("2024-03-10");
        let cand = candidate(noon, noon + 3_600_000);

        let mut pd = pending();
        let a = score_candidate(&pd, &cand, None, &cfg, &id);
        pd.participants.reverse();
        let b = score_candidate(&pd, &cand, None, &cfg, &id);
        assert_eq!(a.composite, b.composite);
    }

    #[test]
    fn test_snippet_reweights_composite() {
        let cfg = MatchConfig::default();
        let id = identity();
        let noon = noon_ms("2024-03-10");
        let mut cand = candidate(noon, noon + 3_600_000);
        cand.raw_transcript =
            Some(r#"[{"text": "quarterly budget review kickoff", "speaker_id": "A"}]"#.into());

        let mut pd = pending();
        pd.transcript_snippet = Some("quarterly budget review kickoff".into());
        let bd = score_candidate(&pd, &cand, None, &cfg, &id);
        assert!(bd.transcript_score >= 0.9);
        // 0.60 transcript weight dominates the demoted roster/title terms
        assert!(bd.composite > 0.9);
    }

    #[test]
    fn test_note_to_self_group_penalty() {
        let cfg = MatchConfig::default();
        let id = identity();
        let noon = noon_ms("2024-03-10");
        let cand = candidate(noon, noon + 3_600_000);

        let mut pd = pending();
        pd.session_type = SessionType::NoteToSelf;
        pd.participants = vec!["Me".into()];
        let bd = score_candidate(&pd, &cand, None, &cfg, &id);
        assert_eq!(bd.group_size_penalty, 0.15);
    }

    #[test]
    fn test_missing_participant_penalty() {
        let (bonus, penalty) = set_adjustments(
            SessionType::Default,
            &["Jane".into(), "Bob".into(), "Ann".into()],
            &["jane".into()],
        );
        assert_eq!(bonus, 0.0);
        // two missing: 0.18 + 0.10
        assert!((penalty - 0.28).abs() < 1e-9);
    }

    #[test]
    fn test_superset_penalty_capped() {
        let (_, penalty) = set_adjustments(
            SessionType::Default,
            &["Jane".into()],
            &["jane".into(), "a".into(), "b".into(), "c".into(), "d".into()],
        );
        assert!((penalty - 0.12).abs() < 1e-9);
    }

    #[test]
    fn test_scorers_total_on_empty_candidate() {
        let cfg = MatchConfig::default();
        let id = identity();
        let empty = TranscriptRecord {
            id: "x".into(),
            title: String::new(),
            participants_raw: None,
            speakers_json: None,
            start_ms: None,
            end_ms: None,
            raw_transcript: None,
        };
        let bd = score_candidate(&pending(), &empty, None, &cfg, &id);
        assert_eq!(bd.overlap, 0.0);
        assert_eq!(bd.title_score, 0.0);
        assert_eq!(bd.transcript_score, 0.0);
        assert!(bd.composite.is_finite());
    }
}
