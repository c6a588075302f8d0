use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::IdentityConfig;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static TITLE_CLEAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\s]+").expect("valid regex"));
static PERSON_CLEAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z'\s]").expect("valid regex"));
static PAREN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").expect("valid regex"));
static NAME_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z']+").expect("valid regex"));
static PARTICIPANT_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[,&]| and ").expect("valid regex"));
static LEADING_AND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*and\s+").expect("valid regex"));

/// Lowercase, strip punctuation (keeping spaces), collapse whitespace.
/// Total: empty input maps to the empty string.
pub fn normalize_title(s: &str) -> String {
    let lower = s.trim().to_lowercase();
    let cleaned = TITLE_CLEAN_RE.replace_all(&lower, " ");
    WHITESPACE_RE.replace_all(cleaned.trim(), " ").into_owned()
}

/// Lowercase a person name, dropping parenthetical asides and anything that
/// is not a letter or apostrophe.
pub fn normalize_person(s: &str) -> String {
    let lower = s.trim().to_lowercase();
    let no_parens = PAREN_RE.replace_all(&lower, "");
    let cleaned = PERSON_CLEAN_RE.replace_all(&no_parens, " ");
    WHITESPACE_RE.replace_all(cleaned.trim(), " ").into_owned()
}

/// Collapse whitespace and lowercase, for use as a comparison key.
pub fn norm_key(s: &str) -> String {
    WHITESPACE_RE
        .replace_all(s.trim(), " ")
        .to_lowercase()
}

pub fn tokenize_name(s: &str) -> Vec<String> {
    NAME_TOKEN_RE
        .find_iter(&s.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Replace any alias of the local user with the canonical name; other names
/// pass through unchanged. Empty entries are dropped.
pub fn expand_aliases(names: &[String], identity: &IdentityConfig) -> Vec<String> {
    names
        .iter()
        .filter_map(|n| {
            let nl = n.trim().to_lowercase();
            if nl.is_empty() {
                None
            } else if identity.aliases.contains(&nl) {
                Some(identity.canonical_name.clone())
            } else {
                Some(n.clone())
            }
        })
        .collect()
}

/// Does `name` refer to the local user? True for alias membership or any
/// token shared with the canonical name.
pub fn is_self_name(name: &str, identity: &IdentityConfig) -> bool {
    let n = norm_key(name);
    if n.is_empty() {
        return false;
    }
    if identity.aliases.contains(&n) {
        return true;
    }
    let canonical: Vec<String> = tokenize_name(&identity.canonical_name);
    n.split_whitespace()
        .any(|t| canonical.iter().any(|c| c == t))
}

fn title_case_word(w: &str) -> String {
    let mut chars = w.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a raw participants string ("Jane, Bob & Ann and Me") into
/// normalized, alias-expanded, title-cased names. Duplicates are kept;
/// downstream comparisons use set semantics.
pub fn split_participants_string(raw: &str, identity: &IdentityConfig) -> Vec<String> {
    if raw.trim().is_empty() {
        return vec![];
    }
    let parts: Vec<String> = PARTICIPANT_SPLIT_RE
        .split(raw)
        .map(normalize_person)
        .filter(|p| !p.is_empty())
        .collect();
    expand_aliases(&parts, identity)
        .iter()
        .map(|p| title_case(p))
        .filter(|p| !p.is_empty())
        .collect()
}

/// Clean a display name for output: drop a leading "and", drop
/// parentheticals, fold aliases to the canonical name, and capitalize words
/// while preserving the canonical name's own capitalization.
pub fn clean_display_name(raw: &str, identity: &IdentityConfig) -> String {
    let s = LEADING_AND_RE.replace(raw.trim(), "");
    let s = PAREN_RE.replace_all(&s, "").trim().to_string();
    let base = s.to_lowercase();
    if identity.aliases.contains(&base) || base == "me" {
        return identity.canonical_name.clone();
    }
    let canonical_parts: Vec<&str> = identity.canonical_name.split_whitespace().collect();
    s.split_whitespace()
        .map(|w| {
            canonical_parts
                .iter()
                .find(|cp| cp.to_lowercase() == w.to_lowercase())
                .map(|cp| cp.to_string())
                .unwrap_or_else(|| title_case_word(w))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Token-level fuzzy name match: true when the two names share at least one
/// normalized token. Alias tokens on the wanted side are widened with the
/// canonical name's tokens.
pub fn fuzzy_name_match(want: &str, have: &str, identity: &IdentityConfig) -> bool {
    let mut wt = tokenize_name(&normalize_person(want));
    let ht = tokenize_name(&normalize_person(have));
    if wt.is_empty() || ht.is_empty() {
        return false;
    }
    if wt.iter().any(|t| identity.aliases.contains(t)) {
        wt.extend(tokenize_name(&identity.canonical_name));
    }
    wt.iter().any(|t| ht.contains(t))
}

/// Ratcliff/Obershelp similarity ratio over characters, matching the
/// classic difflib behavior: 2*M / (len(a) + len(b)) where M is the total
/// length of recursively-found longest common substrings.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let matched = matching_chars(&a, &b);
    (2.0 * matched as f64) / ((a.len() + b.len()) as f64)
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0usize;
    let mut stack = vec![(0usize, a.len(), 0usize, b.len())];
    while let Some((alo, ahi, blo, bhi)) = stack.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        total += k;
        stack.push((alo, i, blo, j));
        stack.push((i + k, ahi, j + k, bhi));
    }
    total
}

/// Earliest longest matching block between a[alo..ahi] and b[blo..bhi].
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    use std::collections::HashMap;
    let mut best = (alo, blo, 0usize);
    let mut run_ends: HashMap<usize, usize> = HashMap::new();
    for i in alo..ahi {
        let mut new_runs: HashMap<usize, usize> = HashMap::new();
        for j in blo..bhi {
            if b[j] == a[i] {
                let k = if j > blo {
                    run_ends.get(&(j - 1)).copied().unwrap_or(0) + 1
                } else {
                    1
                };
                new_runs.insert(j, k);
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            }
        }
        run_ends = new_runs;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("Jane 1:1 — Roadmap!"), "jane 1 1 roadmap");
        assert_eq!(normalize_title(""), "");
        assert_eq!(normalize_title("   "), "");
    }

    #[test]
    fn test_normalize_person() {
        assert_eq!(normalize_person("Jane Doe (PM)"), "jane doe");
        assert_eq!(normalize_person("O'Brien, Pat"), "o'brien pat");
    }

    #[test]
    fn test_split_participants_string() {
        let identity = IdentityConfig::new("Alex Chen", &["me", "alex"]);
        let parts = split_participants_string("Jane Doe, me & Bob and Ann", &identity);
        assert_eq!(parts, vec!["Jane Doe", "Alex Chen", "Bob", "Ann"]);
    }

    #[test]
    fn test_expand_aliases_folds_self() {
        let identity = IdentityConfig::new("Alex Chen", &["me", "alex"]);
        let out = expand_aliases(&["me".to_string(), "Jane".to_string()], &identity);
        assert_eq!(out, vec!["Alex Chen", "Jane"]);
    }

    #[test]
    fn test_is_self_name() {
        let identity = IdentityConfig::new("Alex Chen", &["me"]);
        assert!(is_self_name("me", &identity));
        assert!(is_self_name("Alex", &identity));
        assert!(is_self_name("alex chen", &identity));
        assert!(!is_self_name("Jane", &identity));
        assert!(!is_self_name("", &identity));
    }

    #[test]
    fn test_clean_display_name() {
        let identity = IdentityConfig::new("Alex Chen", &["me"]);
        assert_eq!(clean_display_name("and jane doe (guest)", &identity), "Jane Doe");
        assert_eq!(clean_display_name("me", &identity), "Alex Chen");
        // Canonical-name capitalization is preserved token-wise
        assert_eq!(clean_display_name("alex smith", &identity), "Alex Smith");
    }

    #[test]
    fn test_fuzzy_name_match() {
        let identity = IdentityConfig::new("Alex Chen", &["me"]);
        assert!(fuzzy_name_match("Jane Doe", "jane", &identity));
        assert!(fuzzy_name_match("me", "Alex Chen", &identity));
        assert!(!fuzzy_name_match("Jane", "Bob", &identity));
        assert!(!fuzzy_name_match("", "Bob", &identity));
    }

    #[test]
    fn test_sequence_ratio_reflexive() {
        assert_eq!(sequence_ratio("weekly sync", "weekly sync"), 1.0);
        assert_eq!(sequence_ratio("", ""), 1.0);
        assert_eq!(sequence_ratio("abc", ""), 0.0);
    }

    #[test]
    fn test_sequence_ratio_partial() {
        // difflib: SequenceMatcher(None, "abcd", "bcde").ratio() == 0.75
        let r = sequence_ratio("abcd", "bcde");
        assert!((r - 0.75).abs() < 1e-9);
        let r2 = sequence_ratio("jane 1 1", "jane doe 1 1");
        assert!(r2 > 0.7);
    }

}
