use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::TranscriptBlock;
use crate::text::sequence_ratio;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static SPEAKER_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Speaker \d+:\s*").expect("valid regex"));
// Capitalized word sequences followed by a colon, e.g. "Jane Doe: ",
// left over from webhook-side speaker attribution.
static NAME_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*:\s*").expect("valid regex"));

/// How strongly a known transcript snippet matches the candidate's own
/// leading transcript text. The most trustworthy match signal when present.
///
/// Compares against the first ten blocks; when that scores poorly the
/// search widens to fifty blocks, since the snippet may come from later in
/// the conversation.
pub fn snippet_similarity(snippet: &str, blocks: &[TranscriptBlock]) -> f64 {
    if snippet.trim().is_empty() || blocks.is_empty() {
        return 0.0;
    }

    let beginning = joined_text(blocks, 10);
    if beginning.is_empty() {
        return 0.0;
    }

    let snippet_clean = clean_for_comparison(snippet);
    if snippet_clean.is_empty() {
        return 0.0;
    }
    let snippet_len = snippet_clean.chars().count();

    // Compare against roughly twice the snippet's length of leading text
    let beginning_clean = truncate_chars(&clean_for_comparison(&beginning), snippet_len * 2);

    let snippet_lower = snippet_clean.to_lowercase();
    let beginning_lower = beginning_clean.to_lowercase();

    let mut score = sequence_ratio(&snippet_lower, &beginning_lower);
    if score > 0.8 {
        score = (score + 0.2).min(1.0);
    }
    if beginning_lower.contains(&snippet_lower) {
        score = (score + 0.1).min(1.0);
    }

    // Weak leading match: look deeper into the transcript
    if score < 0.3 && blocks.len() > 10 {
        let extended = clean_for_comparison(&joined_text(blocks, 50));
        let extended_lower = extended.to_lowercase();
        if extended_lower.contains(&snippet_lower) {
            score = score.max(0.4);
        }
        let extended_head = truncate_chars(&extended_lower, snippet_len * 5);
        score = score.max(sequence_ratio(&snippet_lower, &extended_head) * 0.8);
    }

    score
}

fn joined_text(blocks: &[TranscriptBlock], count: usize) -> String {
    blocks
        .iter()
        .take(count)
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Collapse whitespace, fold curly quote variants to ASCII, and strip
/// speaker-label prefixes so labels never contaminate the text signal.
fn clean_for_comparison(text: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(text.trim(), " ");
    let unquoted = collapsed
        .replace(['\u{2033}', '\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    let no_speakers = SPEAKER_LABEL_RE.replace_all(&unquoted, "");
    NAME_LABEL_RE.replace_all(&no_speakers, "").into_owned()
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
