//! Masks volatile substrings in a raw log line to produce a structural
//! template, per §4.1. Patterns are compiled once and applied in a fixed
//! order so later patterns never see text an earlier one already masked.

use regex::Regex;
use std::sync::LazyLock;

// Order matters: timestamps and IPs before hex runs, hex before numbers,
// quoted strings before numbers (so `"3"` becomes `<str>`, not `"<num>"`).
static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?
        |
        \d{2}/\d{2}/\d{4}[T ]\d{2}:\d{2}:\d{2}
        |
        \b[A-Z][a-z]{2}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}\b
        ",
    )
    .unwrap()
});
static IP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \b(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)\b
        |
        \b(?:[0-9a-fA-F]{1,4}:){2,7}[0-9a-fA-F]{1,4}\b
        ",
    )
    .unwrap()
});
static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b").unwrap()
});
static HEX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b[0-9a-f]{8,}\b").unwrap());
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[\w.+-]+@[\w-]+\.[\w.-]+\b").unwrap());
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[a-zA-Z][a-zA-Z0-9+.-]*://\S+").unwrap());
static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?:/[\w.\-]+){2,}
        |
        [A-Za-z]:\\(?:[\w.\-]+\\?)+
        ",
    )
    .unwrap()
});
static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'[^']*'|"[^"]*""#).unwrap());
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?\b\d+\.\d+\b|[-+]?\b\d+\b").unwrap());

/// Applies the §4.1 masking pipeline to a single line, after truncating to
/// `max_line_length` and trimming whitespace. Returns the canonical
/// template and whether truncation occurred.
pub fn canonicalize(raw: &str, max_line_length: usize) -> (String, bool) {
    let (truncated_input, truncated) = truncate_chars(raw, max_line_length);
    let trimmed = truncated_input.trim();

    let masked = TIMESTAMP_RE.replace_all(trimmed, "<ts>");
    let masked = IP_RE.replace_all(&masked, "<ip>");
    let masked = UUID_RE.replace_all(&masked, "<uuid>");
    let masked = HEX_RE.replace_all(&masked, "<hex>");
    let masked = EMAIL_RE.replace_all(&masked, "<email>");
    let masked = URL_RE.replace_all(&masked, "<url>");
    let masked = PATH_RE.replace_all(&masked, "<path>");
    let masked = QUOTED_RE.replace_all(&masked, "<str>");
    let masked = NUMBER_RE.replace_all(&masked, "<num>");

    (masked.into_owned(), truncated)
}

fn truncate_chars(raw: &str, max_len: usize) -> (&str, bool) {
    if raw.chars().count() <= max_len {
        return (raw, false);
    }
    match raw.char_indices().nth(max_len) {
        Some((byte_idx, _)) => (&raw[..byte_idx], true),
        None => (raw, false),
    }
}
