//! Splits a canonical template into lowercased word tokens, per §4.2.

use crate::types::Level;

/// Delimiter joining the two members of a bigram. Chosen because it can
/// never appear inside a lowercased-alphanumeric token (§9 open question).
pub(crate) const BIGRAM_DELIMITER: char = '\u{2502}';

/// How many leading tokens are scanned for a severity keyword (§4.2).
const SEVERITY_SCAN_WINDOW: usize = 6;

/// Tokenizes `canonical` into lowercased alphanumeric pieces, optionally
/// appending bigrams, enforcing the per-line token cap. Returns the token
/// list and whether the cap truncated it.
pub fn tokenize(
    canonical: &str,
    with_bigrams: bool,
    max_tokens_per_line: usize,
) -> (Vec<String>, bool) {
    let mut unigrams: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in canonical.chars() {
        if ch.is_alphanumeric() {
            current.extend(ch.to_lowercase());
        } else if !current.is_empty() {
            unigrams.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        unigrams.push(current);
    }

    let mut tokens = unigrams.clone();
    if with_bigrams {
        for pair in unigrams.windows(2) {
            tokens.push(format!("{}{}{}", pair[0], BIGRAM_DELIMITER, pair[1]));
        }
    }

    if tokens.len() > max_tokens_per_line {
        tokens.truncate(max_tokens_per_line);
        (tokens, true)
    } else {
        (tokens, false)
    }
}

/// Finds the severity level from the first matching token among the
/// leading `SEVERITY_SCAN_WINDOW` tokens (§4.2). Since bigrams are appended
/// after all unigrams, this only ever scans bigrams when a line has fewer
/// than six unigrams, matching the scan window over "the first 6 tokens"
/// as produced.
pub fn extract_level(tokens: &[String]) -> Level {
    tokens
        .iter()
        .take(SEVERITY_SCAN_WINDOW)
        .find_map(|t| Level::from_token(t))
        .unwrap_or(Level::Unknown)
}
