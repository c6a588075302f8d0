use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use tracing::info;

use crate::attribution::RenderedTranscript;
use crate::models::{MatchReason, SessionType, TranscriptRecord};

/// Everything needed to write one transcript note besides the rendered body.
#[derive(Debug)]
pub struct TranscriptDoc<'a> {
    pub date: &'a str,
    pub title: &'a str,
    pub session_type: SessionType,
    /// Path of the summary note this transcript belongs to, for a backlink
    pub summary_path: Option<&'a str>,
    pub record: &'a TranscriptRecord,
    pub reason: Option<MatchReason>,
}

/// Replace characters that are unsafe or reserved in note filenames with
/// lookalikes, so titles survive as-is visually.
pub fn sanitize_filename(name: &str) -> String {
    let replaced = name
        .trim()
        .replace(':', "\u{2D0}")
        .replace('\u{2014}', "\u{2013}")
        .replace(['/', '\\', '|'], "-")
        .replace('*', "\u{2217}")
        .replace('?', "\u{FF1F}")
        .replace('"', "'")
        .replace('<', "(")
        .replace('>', ")");
    let trimmed = replaced.trim().to_string();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed
    }
}

/// Month bucket ("YYYY-MM") for a meeting date, when it parses.
pub fn yyyymm_from_date(date: &str) -> Option<String> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m").to_string())
}

pub fn ms_to_iso(ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

fn yaml_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "'"))
}

/// Write the transcript note under `root/YYYY-MM/`, returning the path.
/// Existing files are overwritten; re-rendering is the supported way to pick
/// up new overrides.
pub fn write_transcript_file(
    root: &Path,
    doc: &TranscriptDoc<'_>,
    rendered: &RenderedTranscript,
) -> Result<PathBuf> {
    let bucket = yyyymm_from_date(doc.date).unwrap_or_else(|| "undated".to_string());
    let dir = root.join(bucket);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let file_name = sanitize_filename(&format!("{} {} transcript", doc.date, doc.title));
    let path = dir.join(format!("{}.md", file_name));

    let mut front = String::from("---\n");
    front.push_str(&format!("date: {}\n", doc.date));
    front.push_str(&format!("title: {}\n", yaml_quote(doc.title)));
    front.push_str("type: transcript\n");
    front.push_str(&format!("session_type: {}\n", doc.session_type.as_str()));
    front.push_str("source: quill\n");
    if let Some(summary) = doc.summary_path {
        let stem = Path::new(summary)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(summary);
        front.push_str(&format!("summary: {}\n", yaml_quote(&format!("[[{}]]", stem))));
    }
    front.push_str(&format!("quill_id: {}\n", yaml_quote(&doc.record.id)));
    front.push_str(&format!("quill_title: {}\n", yaml_quote(&doc.record.title)));
    if let Some(start) = doc.record.start_ms.and_then(ms_to_iso) {
        front.push_str(&format!("quill_start: {}\n", start));
    }
    if let Some(end) = doc.record.end_ms.and_then(ms_to_iso) {
        front.push_str(&format!("quill_end: {}\n", end));
    }
    if let Some(reason) = doc.reason {
        front.push_str(&format!("match_reason: {}\n", reason));
    }
    if !rendered.speaker_map.is_empty() {
        front.push_str("speakers:\n");
        for (key, name) in &rendered.speaker_map {
            front.push_str(&format!("  {}: {}\n", yaml_quote(key), yaml_quote(name)));
        }
    }
    front.push_str("---\n\n");

    let content = format!("{}{}\n", front, rendered.body);
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "wrote transcript note");
    Ok(path)
}

/// Add a wikilink to the transcript note into the matched summary's
/// frontmatter `links:` list, creating the list when absent. Summaries that
/// are missing, lack frontmatter, or already link the transcript are left
/// untouched. Returns whether the summary was rewritten.
pub fn inject_summary_backlink(summary_path: &Path, transcript_stem: &str) -> Result<bool> {
    let Ok(text) = std::fs::read_to_string(summary_path) else {
        return Ok(false);
    };
    if !text.starts_with("---") {
        return Ok(false);
    }
    let Some(end) = text[3..].find("\n---") else {
        return Ok(false);
    };
    let split = 3 + end + 4;
    let (head, body) = text.split_at(split);

    let wikilink = format!("[[{}]]", transcript_stem);
    if head.contains(&wikilink) {
        return Ok(false);
    }

    let entry = format!("links:\n  - '{}'", wikilink);
    let new_head = if head.contains("\nlinks:") {
        head.replacen("\nlinks:", &format!("\n{}", entry), 1)
    } else {
        format!("{}\n{}\n---", &head[..split - 4], entry)
    };
    std::fs::write(summary_path, format!("{}{}", new_head, body))
        .with_context(|| format!("failed to update {}", summary_path.display()))?;
    info!(path = %summary_path.display(), "linked transcript from summary");
    Ok(true)
}
