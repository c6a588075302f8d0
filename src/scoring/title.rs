use std::collections::HashSet;

use crate::text::{normalize_title, sequence_ratio};

/// Meeting-type tag extracted from a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingKind {
    OneOnOne,
    Sync,
    Standup,
    Retro,
}

/// Structured components of a normalized meeting title.
#[derive(Debug, Clone, Default)]
pub struct TitleComponents {
    pub meeting_kind: Option<MeetingKind>,
    /// Known first names mentioned in the title
    pub participants: Vec<String>,
    /// Text after the first colon, lowercased
    pub topic: Option<String>,
}

/// Title similarity in [0, 1]: the sequence ratio over normalized titles,
/// max-combined with the structured component score. Reflexive for any
/// non-empty title.
pub fn title_similarity(a: &str, b: &str, known_names: &[String]) -> f64 {
    let na = normalize_title(a);
    let nb = normalize_title(b);
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    let basic = sequence_ratio(&na, &nb);
    let component = component_matching(&na, &nb, known_names);
    basic.max(component)
}

/// Component-based matching that tolerates common title variations
/// ("Jane 1:1" vs "1:1 with Jane Doe").
fn component_matching(title_a: &str, title_b: &str, known_names: &[String]) -> f64 {
    let ca = extract_components(title_a, known_names);
    let cb = extract_components(title_b, known_names);

    let mut score = component_similarity(&ca, &cb);

    // 1:1 meetings that share a known participant are almost certainly the
    // same series.
    if ca.meeting_kind == Some(MeetingKind::OneOnOne)
        && cb.meeting_kind == Some(MeetingKind::OneOnOne)
        && !ca.participants.is_empty()
        && !cb.participants.is_empty()
    {
        let pa: HashSet<&String> = ca.participants.iter().collect();
        let pb: HashSet<&String> = cb.participants.iter().collect();
        if pa.intersection(&pb).next().is_some() {
            score = (score + 0.3).min(1.0);
        }
    }

    score
}

/// Extract structured components from a normalized title.
pub fn extract_components(title: &str, known_names: &[String]) -> TitleComponents {
    let lower = title.to_lowercase();

    let meeting_kind = if lower.contains("1:1")
        || lower.contains("1 on 1")
        || lower.contains("1 1")
        || lower.starts_with("1 1")
    {
        Some(MeetingKind::OneOnOne)
    } else if lower.contains("sync") {
        Some(MeetingKind::Sync)
    } else if lower.contains("standup") {
        Some(MeetingKind::Standup)
    } else if lower.contains("retro") {
        Some(MeetingKind::Retro)
    } else {
        None
    };

    let participants: Vec<String> = known_names
        .iter()
        .filter(|n| lower.contains(n.as_str()))
        .cloned()
        .collect();

    let topic = title
        .split_once(':')
        .map(|(_, rest)| rest.trim().to_lowercase())
        .filter(|t| !t.is_empty());

    TitleComponents {
        meeting_kind,
        participants,
        topic,
    }
}

/// Weighted blend of component matches: meeting kind 0.4, participant set
/// Jaccard 0.4, topic similarity 0.2. Fields absent in either title are
/// excluded from the denominator instead of counting against the score.
fn component_similarity(a: &TitleComponents, b: &TitleComponents) -> f64 {
    let mut score = 0.0;
    let mut total_weight = 0.0;

    if a.meeting_kind.is_some() && b.meeting_kind.is_some() {
        total_weight += 0.4;
        if a.meeting_kind == b.meeting_kind {
            score += 0.4;
        }
    }

    if !a.participants.is_empty() && !b.participants.is_empty() {
        total_weight += 0.4;
        let pa: HashSet<&String> = a.participants.iter().collect();
        let pb: HashSet<&String> = b.participants.iter().collect();
        let overlap = pa.intersection(&pb).count();
        let union = pa.union(&pb).count();
        if union > 0 {
            score += 0.4 * overlap as f64 / union as f64;
        }
    }

    if let (Some(ta), Some(tb)) = (&a.topic, &b.topic) {
        total_weight += 0.2;
        score += 0.2 * sequence_ratio(ta, tb);
    }

    if total_weight > 0.0 {
        score / total_weight
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["jane".to_string(), "alex".to_string(), "mike".to_string()]
    }

    #[test]
    fn test_title_similarity_reflexive() {
        for t in ["Weekly Sync", "Jane 1:1", "Retro: Q3 launch"] {
            assert_eq!(title_similarity(t, t, &names()), 1.0);
        }
        assert_eq!(title_similarity("", "x", &names()), 0.0);
    }

    #[test]
    fn test_one_on_one_with_shared_name_scores_high() {
        let s = title_similarity("Jane 1:1", "1:1 with Jane Doe", &names());
        assert!(s > 0.9, "expected strong match, got {s}");
    }

    #[test]
    fn test_different_kinds_score_low() {
        let s = title_similarity("Team standup", "Quarterly retro", &names());
        assert!(s < 0.5, "expected weak match, got {s}");
    }

    #[test]
    fn test_extract_components() {
        let c = extract_components("jane 1 1 roadmap", &names());
        assert_eq!(c.meeting_kind, Some(MeetingKind::OneOnOne));
        assert_eq!(c.participants, vec!["jane"]);
        assert!(c.topic.is_none());

        let c2 = extract_components("Retro: Q3 launch", &names());
        assert_eq!(c2.meeting_kind, Some(MeetingKind::Retro));
        assert_eq!(c2.topic.as_deref(), Some("q3 launch"));
    }
}
