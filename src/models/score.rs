use serde::Serialize;

use super::SessionType;

/// Per-candidate component scores. Produced for every scored candidate and
/// kept only for selection and diagnostics, never persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScoreBreakdown {
    pub overlap: f64,
    pub title_score: f64,
    pub time_score: f64,
    pub transcript_score: f64,
    pub same_day_bonus: f64,
    pub set_bonus: f64,
    pub set_penalty: f64,
    pub group_size_penalty: f64,
    pub composite: f64,
    /// Participants derived from the candidate record
    pub candidate_participants: Vec<String>,
    /// Desired participants after trimming
    pub desired_participants: Vec<String>,
}

impl ScoreBreakdown {
    /// Exact desired/candidate participant set match, case-insensitive.
    pub fn exact_set_match(&self) -> bool {
        if self.desired_participants.is_empty() {
            return false;
        }
        let dset: std::collections::HashSet<String> = self
            .desired_participants
            .iter()
            .map(|p| p.to_lowercase())
            .collect();
        let cset: std::collections::HashSet<String> = self
            .candidate_participants
            .iter()
            .map(|p| p.to_lowercase())
            .collect();
        dset == cset
    }
}

/// Why a candidate was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchReason {
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "transcript")]
    Transcript,
    #[serde(rename = "ranked_window")]
    RankedWindow,
    #[serde(rename = "ranked_overlap")]
    RankedOverlap,
    #[serde(rename = "title")]
    Title,
}

impl MatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchReason::Id => "id",
            MatchReason::Transcript => "transcript",
            MatchReason::RankedWindow => "ranked_window",
            MatchReason::RankedOverlap => "ranked_overlap",
            MatchReason::Title => "title",
        }
    }
}

impl std::fmt::Display for MatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked candidate as reported in selector diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateDiagnostics {
    pub id: String,
    pub title: String,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub length_min: Option<i64>,
    pub has_transcript: bool,
    pub session_type: SessionType,
    #[serde(flatten)]
    pub breakdown: ScoreBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_reason_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&MatchReason::RankedWindow).unwrap(),
            "\"ranked_window\""
        );
        assert_eq!(MatchReason::Id.as_str(), "id");
    }

    #[test]
    fn test_exact_set_match_is_order_and_case_insensitive() {
        let bd = ScoreBreakdown {
            desired_participants: vec!["Jane Doe".into(), "Me".into()],
            candidate_participants: vec!["me".into(), "jane doe".into()],
            ..Default::default()
        };
        assert!(bd.exact_set_match());

        let bd2 = ScoreBreakdown {
            desired_participants: vec![],
            candidate_participants: vec!["me".into()],
            ..Default::default()
        };
        assert!(!bd2.exact_set_match());
    }
}
