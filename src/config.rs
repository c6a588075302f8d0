use std::collections::{HashMap, HashSet};

use crate::models::SessionType;

/// Who the local user is, and which source tags mark their audio.
///
/// Every name comparison that involves the self identity goes through this
/// struct so that aliases ("me", a first name, an email handle) collapse to
/// one canonical display name.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Display name used for the local speaker in all output
    pub canonical_name: String,
    /// Lowercased alternative spellings that mean the local user
    pub aliases: HashSet<String>,
    /// Recording source tags that indicate the local microphone
    pub local_sources: HashSet<String>,
    /// Block-level source tags that directly mean "the local user"
    pub self_sources: HashSet<String>,
    /// Literal tokens removed from transcript text before grouping
    pub strip_tokens: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            canonical_name: "Me".to_string(),
            aliases: ["me"].iter().map(|s| s.to_string()).collect(),
            local_sources: ["mic", "local", "local-user"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            self_sources: ["me", "local", "local_user", "self"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            strip_tokens: vec!["<SNIP>".to_string()],
        }
    }
}

impl IdentityConfig {
    pub fn new(canonical_name: impl Into<String>, aliases: &[&str]) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            aliases: aliases.iter().map(|a| a.to_lowercase()).collect(),
            ..Default::default()
        }
    }
}

/// Per-session-type weights for the composite score.
#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub overlap: f64,
    pub title: f64,
    pub time: f64,
}

/// Tuned matching configuration. The weight and threshold tables encode
/// empirical priors; changing them changes which candidates get accepted.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Candidate window extends this many hours on each side of its center
    pub window_hours: i64,
    pub weights: HashMap<SessionType, Weights>,
    pub thresholds: HashMap<SessionType, f64>,
    /// First names recognized when decomposing meeting titles
    pub known_names: Vec<String>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        let mut weights = HashMap::new();
        weights.insert(
            SessionType::OneOnOne,
            Weights { overlap: 0.70, title: 0.15, time: 0.15 },
        );
        weights.insert(
            SessionType::InternalSync,
            Weights { overlap: 0.65, title: 0.20, time: 0.15 },
        );
        weights.insert(
            SessionType::ExternalSync,
            Weights { overlap: 0.75, title: 0.10, time: 0.15 },
        );
        weights.insert(
            SessionType::NoteToSelf,
            Weights { overlap: 0.60, title: 0.10, time: 0.30 },
        );
        weights.insert(
            SessionType::Default,
            Weights { overlap: 0.60, title: 0.25, time: 0.15 },
        );

        let mut thresholds = HashMap::new();
        thresholds.insert(SessionType::OneOnOne, 0.45);
        thresholds.insert(SessionType::InternalSync, 0.42);
        thresholds.insert(SessionType::ExternalSync, 0.35);
        thresholds.insert(SessionType::NoteToSelf, 0.35);
        thresholds.insert(SessionType::Default, 0.40);

        Self {
            window_hours: 36,
            weights,
            thresholds,
            known_names: [
                "alex", "alx", "john", "jane", "mike", "sarah", "emily", "david",
                "james", "mary", "robert", "lisa", "william", "jennifer", "michael",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl MatchConfig {
    pub fn weights_for(&self, session_type: SessionType) -> Weights {
        self.weights
            .get(&session_type)
            .or_else(|| self.weights.get(&SessionType::Default))
            .copied()
            .unwrap_or(Weights { overlap: 0.60, title: 0.25, time: 0.15 })
    }

    pub fn threshold_for(&self, session_type: SessionType) -> f64 {
        self.thresholds
            .get(&session_type)
            .or_else(|| self.thresholds.get(&SessionType::Default))
            .copied()
            .unwrap_or(0.40)
    }
}

/// Settings for the optional duplicate-speaker consolidation pass.
#[derive(Debug, Clone)]
pub struct ConsolidationConfig {
    /// Consolidation can merge distinct people in larger meetings, so it is
    /// off unless explicitly requested.
    pub enabled: bool,
    pub similarity_threshold: f64,
    /// Lower bar used for 1:1 meetings that show more than two speaker keys
    pub aggressive_threshold: f64,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            similarity_threshold: 0.4,
            aggressive_threshold: 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables_cover_all_session_types() {
        let cfg = MatchConfig::default();
        for st in [
            SessionType::OneOnOne,
            SessionType::InternalSync,
            SessionType::ExternalSync,
            SessionType::NoteToSelf,
            SessionType::Default,
        ] {
            let w = cfg.weights_for(st);
            assert!((w.overlap + w.title + w.time - 1.0).abs() < 1e-9);
            assert!(cfg.threshold_for(st) > 0.0);
        }
    }

    #[test]
    fn test_unknown_type_falls_back_to_default() {
        let mut cfg = MatchConfig::default();
        cfg.weights.remove(&SessionType::NoteToSelf);
        let w = cfg.weights_for(SessionType::NoteToSelf);
        assert_eq!(w.overlap, 0.60);
        assert_eq!(w.title, 0.25);
    }
}
