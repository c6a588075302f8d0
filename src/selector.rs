use std::cmp::Ordering;

use tracing::{debug, info};

use crate::config::{IdentityConfig, MatchConfig};
use crate::models::{
    CandidateDiagnostics, MatchReason, PendingRecord, ScoreBreakdown, SessionType,
    TranscriptRecord,
};
use crate::scoring::{
    derive_participants, pending_window, score_candidate_in_window, title_similarity, ScoreContext,
};
use crate::store::{RecordStore, StoreError};

/// Candidates fetched per overlap-window query.
const WINDOW_FETCH_LIMIT: usize = 800;
/// Candidates fetched for the title-only fallback scan.
const TITLE_SCAN_LIMIT: usize = 500;
/// Ranked candidates kept for diagnostics.
const DIAGNOSTICS_LIMIT: usize = 25;

/// Outcome of candidate selection. `record` is None when nothing cleared the
/// acceptance rules, which is a normal terminal state, not an error.
#[derive(Debug)]
pub struct Selection {
    pub record: Option<TranscriptRecord>,
    pub reason: Option<MatchReason>,
    pub diagnostics: Vec<CandidateDiagnostics>,
}

impl Selection {
    fn none(diagnostics: Vec<CandidateDiagnostics>) -> Self {
        Self {
            record: None,
            reason: None,
            diagnostics,
        }
    }

    fn accept(
        record: TranscriptRecord,
        reason: MatchReason,
        diagnostics: Vec<CandidateDiagnostics>,
    ) -> Self {
        Self {
            record: Some(record),
            reason: Some(reason),
            diagnostics,
        }
    }
}

struct Ranked {
    record: TranscriptRecord,
    breakdown: ScoreBreakdown,
}

/// Pick the best transcript record for a pending summary, first applicable
/// rule wins:
///
/// 1. explicit record id with transcript content;
/// 2. strong snippet evidence on the top-ranked window candidate;
/// 3. ranked window candidate clearing the session-type threshold;
/// 4. ranked candidate with strong roster or title agreement;
/// 5. title-only scan over records starting inside the window.
///
/// The overlapping accept conditions are intentional: each tier was added to
/// recover a class of real misses, and tightening one tier must not silently
/// change another.
pub fn select_best(
    pending: &PendingRecord,
    store: &dyn RecordStore,
    cfg: &MatchConfig,
    identity: &IdentityConfig,
) -> Result<Selection, StoreError> {
    if let Some(id) = pending
        .quill_meeting_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        if let Some(record) = store.fetch_by_id(id)? {
            if record.has_transcript() {
                info!(record_id = %record.id, "matched by explicit id");
                return Ok(Selection::accept(record, MatchReason::Id, vec![]));
            }
            debug!(record_id = %record.id, "explicit id has no transcript, falling through");
        }
    }

    let Some((lo_ms, hi_ms, center_ms)) = pending_window(pending, cfg.window_hours) else {
        debug!(date = %pending.meeting_date, "no usable candidate window");
        return Ok(Selection::none(vec![]));
    };

    let snippet = pending
        .transcript_snippet
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let ctx = ScoreContext {
        session_type: pending.session_type,
        meeting_date: &pending.meeting_date,
        needle_title: pending.lookup_title(),
        desired_participants: &pending.participants,
        transcript_snippet: snippet,
        center_ms,
        lo_ms,
        hi_ms,
    };

    let candidates = store.fetch_overlap_window(lo_ms, hi_ms, WINDOW_FETCH_LIMIT)?;
    debug!(count = candidates.len(), lo_ms, hi_ms, "fetched window candidates");

    let mut ranked: Vec<Ranked> = Vec::new();
    for candidate in candidates {
        if !candidate.has_transcript() {
            continue;
        }
        let hints = store.fetch_speaker_hints(&candidate.id)?;
        let hints = (!hints.is_empty()).then_some(&hints);
        let participants = derive_participants(&candidate, hints, identity);
        let breakdown = score_candidate_in_window(&ctx, &candidate, &participants, cfg, identity);

        // Rosters are noisy but a total miss on a multi-person meeting is
        // disqualifying, unless snippet evidence is available to outvote it.
        if snippet.is_none() && pending.participants.len() >= 2 && breakdown.overlap == 0.0 {
            debug!(candidate = %candidate.brief(), "skipping candidate with zero participant overlap");
            continue;
        }

        ranked.push(Ranked {
            record: candidate,
            breakdown,
        });
    }

    ranked.sort_by(|a, b| {
        b.breakdown
            .composite
            .partial_cmp(&a.breakdown.composite)
            .unwrap_or(Ordering::Equal)
    });

    let diagnostics: Vec<CandidateDiagnostics> = ranked
        .iter()
        .take(DIAGNOSTICS_LIMIT)
        .map(|r| CandidateDiagnostics {
            id: r.record.id.clone(),
            title: r.record.title.clone(),
            start_ms: r.record.start_ms,
            end_ms: r.record.end_ms,
            length_min: r.record.length_min(),
            has_transcript: r.record.has_transcript(),
            session_type: SessionType::from_title(&r.record.title),
            breakdown: r.breakdown.clone(),
        })
        .collect();

    if let Some(top) = ranked.first() {
        if top.breakdown.transcript_score >= 0.15 {
            info!(
                record_id = %top.record.id,
                transcript_score = top.breakdown.transcript_score,
                "matched by transcript snippet"
            );
            return Ok(Selection::accept(
                top.record.clone(),
                MatchReason::Transcript,
                diagnostics,
            ));
        }
    }

    let threshold = cfg.threshold_for(pending.session_type);
    let overlap_min = match pending.session_type {
        SessionType::InternalSync | SessionType::ExternalSync => 0.60,
        _ => 0.50,
    };

    // Only the top-ranked candidate is eligible for the threshold rules;
    // a runner-up that happens to clear them is still the wrong meeting.
    if let Some(top) = ranked.first() {
        let bd = &top.breakdown;
        let strong_window = bd.composite >= threshold
            && (bd.overlap >= overlap_min || bd.exact_set_match());
        if strong_window || (bd.overlap >= 0.9 && bd.transcript_score >= 0.1) {
            info!(
                record_id = %top.record.id,
                composite = bd.composite,
                overlap = bd.overlap,
                "matched in ranked window"
            );
            return Ok(Selection::accept(
                top.record.clone(),
                MatchReason::RankedWindow,
                diagnostics,
            ));
        }

        let roster_and_title =
            bd.overlap >= 0.50 && bd.title_score >= 0.20 && bd.composite >= threshold - 0.05;
        if roster_and_title || bd.transcript_score >= 0.3 || bd.title_score >= 0.25 {
            info!(
                record_id = %top.record.id,
                composite = bd.composite,
                title_score = bd.title_score,
                "matched by ranked overlap"
            );
            return Ok(Selection::accept(
                top.record.clone(),
                MatchReason::RankedOverlap,
                diagnostics,
            ));
        }
    }

    let scan = store.fetch_start_in_range(lo_ms, hi_ms, None, TITLE_SCAN_LIMIT)?;
    let mut best: Option<(TranscriptRecord, f64)> = None;
    for candidate in scan {
        if !candidate.has_transcript() {
            continue;
        }
        let sim = title_similarity(ctx.needle_title, &candidate.title, &cfg.known_names);
        if best.as_ref().is_none_or(|(_, b)| sim > *b) {
            best = Some((candidate, sim));
        }
    }
    if let Some((record, sim)) = best {
        if sim >= 0.70 {
            info!(record_id = %record.id, similarity = sim, "matched by title scan");
            return Ok(Selection::accept(record, MatchReason::Title, diagnostics));
        }
    }

    debug!(title = %pending.meeting_title, "no candidate accepted");
    Ok(Selection::none(diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::local_day_bounds_ms;
    use crate::store::JsonRecordStore;

    fn identity() -> IdentityConfig {
        IdentityConfig::new("Me", &["me"])
    }

    fn noon_ms(date: &str) -> i64 {
        local_day_bounds_ms(date, 0).unwrap().0
    }

    fn record(id: &str, title: &str, start_ms: i64, participants: &str) -> TranscriptRecord {
        TranscriptRecord {
            id: id.into(),
            title: title.into(),
            participants_raw: Some(participants.into()),
            speakers_json: None,
            start_ms: Some(start_ms),
            end_ms: Some(start_ms + 3_600_000),
            raw_transcript: Some(r#"[{"text": "hello there", "speaker_id": "A"}]"#.into()),
        }
    }

    fn pending(title: &str, date: &str, st: SessionType, people: &[&str]) -> PendingRecord {
        PendingRecord {
            meeting_title: title.into(),
            meeting_date: date.into(),
            session_type: st,
            participants: people.iter().map(|p| p.to_string()).collect(),
            quill_meeting_id: None,
            quill_title: None,
            quill_start_ms: None,
            quill_end_ms: None,
            transcript_snippet: None,
            summary_path: None,
        }
    }

    #[test]
    fn test_empty_store_yields_no_candidate() {
        let store = JsonRecordStore::from_records(vec![]);
        let pd = pending("Jane 1:1", "2024-03-10", SessionType::OneOnOne, &["Jane Doe"]);
        let sel =
            select_best(&pd, &store, &MatchConfig::default(), &identity()).unwrap();
        assert!(sel.record.is_none());
        assert!(sel.reason.is_none());
        assert!(sel.diagnostics.is_empty());
    }

    #[test]
    fn test_explicit_id_wins_over_ranking() {
        let noon = noon_ms("2024-03-10");
        let store = JsonRecordStore::from_records(vec![
            record("good", "Jane Doe 1:1", noon, "Me, Jane Doe"),
            record("pinned", "Unrelated Chat", noon + 7_200_000, "Other Person"),
        ]);
        let mut pd = pending("Jane 1:1", "2024-03-10", SessionType::OneOnOne, &["Jane Doe"]);
        pd.quill_meeting_id = Some("pinned".into());
        let sel =
            select_best(&pd, &store, &MatchConfig::default(), &identity()).unwrap();
        assert_eq!(sel.reason, Some(MatchReason::Id));
        assert_eq!(sel.record.unwrap().id, "pinned");
    }

    #[test]
    fn test_explicit_id_without_transcript_falls_through() {
        let noon = noon_ms("2024-03-10");
        let mut empty = record("pinned", "Jane Doe 1:1", noon, "Me, Jane Doe");
        empty.raw_transcript = None;
        let store = JsonRecordStore::from_records(vec![
            empty,
            record("ranked", "Jane Doe 1:1", noon, "Me, Jane Doe"),
        ]);
        let mut pd = pending("Jane 1:1", "2024-03-10", SessionType::OneOnOne, &["Jane Doe"]);
        pd.quill_meeting_id = Some("pinned".into());
        let sel =
            select_best(&pd, &store, &MatchConfig::default(), &identity()).unwrap();
        assert_eq!(sel.reason, Some(MatchReason::RankedWindow));
        assert_eq!(sel.record.unwrap().id, "ranked");
    }

    #[test]
    fn test_one_on_one_accepted_in_ranked_window() {
        let noon = noon_ms("2024-03-10");
        let store = JsonRecordStore::from_records(vec![
            record("m1", "Jane Doe 1:1", noon, "Me, Jane Doe"),
            record("m2", "Planning Sync", noon + 3 * 3_600_000, "Bob, Carol, Dave"),
        ]);
        let pd = pending("Jane 1:1", "2024-03-10", SessionType::OneOnOne, &["Jane Doe"]);
        let sel =
            select_best(&pd, &store, &MatchConfig::default(), &identity()).unwrap();
        assert_eq!(sel.reason, Some(MatchReason::RankedWindow));
        assert_eq!(sel.record.unwrap().id, "m1");
        assert!(!sel.diagnostics.is_empty());
        assert!(sel.diagnostics[0].breakdown.composite >= 0.45);
    }

    #[test]
    fn test_snippet_match_takes_transcript_reason() {
        let noon = noon_ms("2024-03-10");
        let mut cand = record("m1", "Untitled recording", noon, "");
        cand.raw_transcript = Some(
            r#"[{"text": "let's review the incident postmortem from friday", "speaker_id": "A"}]"#
                .into(),
        );
        let store = JsonRecordStore::from_records(vec![cand]);
        let mut pd = pending("Incident review", "2024-03-10", SessionType::Default, &[]);
        pd.transcript_snippet =
            Some("let's review the incident postmortem from friday".into());
        let sel =
            select_best(&pd, &store, &MatchConfig::default(), &identity()).unwrap();
        assert_eq!(sel.reason, Some(MatchReason::Transcript));
    }

    #[test]
    fn test_title_scan_fallback() {
        let noon = noon_ms("2024-03-10");
        // Zero roster overlap on a multi-person pending keeps this candidate
        // out of the ranked stages entirely.
        let store = JsonRecordStore::from_records(vec![record(
            "m1",
            "Quarterly Planning Offsite",
            noon,
            "Unknown A, Unknown B",
        )]);
        let pd = pending(
            "Quarterly Planning Offsite",
            "2024-03-10",
            SessionType::Default,
            &["Jane Doe", "Bob Smith"],
        );
        let sel =
            select_best(&pd, &store, &MatchConfig::default(), &identity()).unwrap();
        assert_eq!(sel.reason, Some(MatchReason::Title));
        assert_eq!(sel.record.unwrap().id, "m1");
    }

    #[test]
    fn test_unrelated_candidates_rejected() {
        let noon = noon_ms("2024-03-10");
        let store = JsonRecordStore::from_records(vec![record(
            "m1",
            "Gardening club",
            noon,
            "Other Person",
        )]);
        let pd = pending("Roadmap review", "2024-03-10", SessionType::Default, &["Jane Doe"]);
        let sel =
            select_best(&pd, &store, &MatchConfig::default(), &identity()).unwrap();
        assert!(sel.record.is_none(), "reason: {:?}", sel.reason);
    }
}
