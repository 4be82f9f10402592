//! Response tidy-up: deterministic cleanup of model output before it is
//! reconstructed into a document.
//!
//! The input here is a single chat answer, not text scraped from pages, so
//! only defects a model actually produces are handled: an outer
//! ```` ```markdown ```` fence around the whole answer, CRLF line endings,
//! zero-width characters inside headings, trailing spaces and long runs of
//! blank lines. Each one would otherwise change how a line is classified (a
//! fenced answer becomes one run of paragraphs, a stray `\u{200B}` hides a
//! `## ` prefix).
//!
//! ## What is left alone
//!
//! Headings, list markers and table rows are passed through as written.
//! Separator rows decide whether a table gets a header and bare pipe rows
//! only form a table under a separator, so rewriting either here would
//! change what the reconstructor builds. Leading indentation is kept for the
//! same reason.

use once_cell::sync::Lazy;
use regex::Regex;

/// Zero-width space, BOM, soft hyphen, ZWNJ, ZWJ, word joiner.
const INVISIBLE: [char; 6] = ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'];

/// Apply all tidy-up rules to a raw model response.
///
/// The outer fence goes first so per-line cleanup sees the real body; blank
/// runs are collapsed last, once whitespace-only lines are empty.
pub fn tidy_response(input: &str) -> String {
    let body = strip_outer_fence(input);
    collapse_blank_lines(&clean_lines(&body))
}

// ── Outer fence ──────────────────────────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Per-line cleanup ─────────────────────────────────────────────────────────

/// CRLF and lone CR become LF; each line loses invisible characters and
/// trailing whitespace.
fn clean_lines(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .split(['\n', '\r'])
        .map(|line| {
            let visible: String = line.chars().filter(|c| !INVISIBLE.contains(c)).collect();
            visible.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Blank runs ───────────────────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}
