//! Shared value types passed between core modules and out through the engine facade.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity extracted from a line's leading tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Unknown,
}

impl Level {
    /// `level_bonus` per §4.4: WARN 0.5, ERROR 1.0, FATAL/CRITICAL 1.5, else 0.
    pub fn bonus(self) -> f64 {
        match self {
            Level::Warn => 0.5,
            Level::Error => 1.0,
            Level::Fatal => 1.5,
            Level::Debug | Level::Info | Level::Unknown => 0.0,
        }
    }

    /// Matches a single lowercased token against the recognized severity
    /// vocabulary via substring match, per §4.2.
    pub(crate) fn from_token(token: &str) -> Option<Level> {
        if token.contains("critical") {
            Some(Level::Fatal)
        } else if token.contains("fatal") {
            Some(Level::Fatal)
        } else if token.contains("error") || token.contains("err") {
            Some(Level::Error)
        } else if token.contains("warning") || token.contains("warn") {
            Some(Level::Warn)
        } else if token.contains("info") {
            Some(Level::Info)
        } else if token.contains("debug") {
            Some(Level::Debug)
        } else {
            None
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
            Level::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A line after canonicalization and tokenization, ready for scoring.
#[derive(Debug, Clone)]
pub struct LineRecord {
    pub raw: String,
    pub canonical: String,
    pub tokens: Vec<String>,
    pub level: Level,
    pub truncated: bool,
}

/// A single token's contribution to a line's raw score, for explanation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenContribution {
    pub token: String,
    pub bits: f64,
    pub probability: f64,
    pub effective_count: f64,
}

/// The full result of scoring one line, per §6.1 `score`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorePayload {
    pub novelty: f64,
    pub raw_score: f64,
    pub token_info_bits: f64,
    pub template_info_bits: f64,
    pub level_bonus: f64,
    pub template: String,
    pub template_probability: f64,
    pub tokens: Vec<String>,
    pub token_contributors: Vec<TokenContribution>,
    pub level: Level,
}

/// A line recalled from the neighbor buffer alongside its similarity to a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NeighborMatch {
    pub similarity: f64,
    pub line: String,
}
