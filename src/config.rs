//! Immutable per-engine configuration, per §3 and §10.4.
//!
//! Unlike the teacher's layered, multi-source config loader, `Config` here
//! is a single value object: build one with [`Config::default`] or load one
//! from TOML, then call [`Config::validate`] once before constructing an
//! `Engine`. There is no env/CLI/file precedence chain — §6.4 rules out any
//! environment coupling in the core.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_decay() -> f64 {
    0.9999
}
fn default_laplace_k() -> f64 {
    1.0
}
fn default_max_tokens() -> usize {
    30_000
}
fn default_max_templates() -> usize {
    10_000
}
fn default_max_line_length() -> usize {
    2_000
}
fn default_max_tokens_per_line() -> usize {
    400
}
fn default_weight() -> f64 {
    1.0
}
fn default_burn_in() -> u64 {
    500
}
fn default_neighbor_capacity() -> usize {
    2_048
}
fn default_neighbor_k() -> usize {
    3
}
fn default_neighbor_similarity_floor() -> f64 {
    0.3
}

/// Immutable configuration for one `Engine` instance (§3 "Config").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_decay")]
    pub decay: f64,
    #[serde(default = "default_laplace_k")]
    pub laplace_k: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_max_templates")]
    pub max_templates: usize,
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    #[serde(default = "default_max_tokens_per_line")]
    pub max_tokens_per_line: usize,
    #[serde(default)]
    pub with_bigrams: bool,
    #[serde(default = "default_weight")]
    pub w_token: f64,
    #[serde(default = "default_weight")]
    pub w_template: f64,
    #[serde(default = "default_weight")]
    pub w_level: f64,
    /// `seen_lines >= burn_in` is half of the §4.5 burn-in gate.
    #[serde(default = "default_burn_in")]
    pub burn_in: u64,
    /// Fixed ring capacity for the neighbor buffer (§4.6).
    #[serde(default = "default_neighbor_capacity")]
    pub neighbor_capacity: usize,
    /// Default `k` for neighbor queries (§4.6), overridable per call.
    #[serde(default = "default_neighbor_k")]
    pub neighbor_k: usize,
    /// Candidates below this cosine similarity are excluded (§4.6).
    #[serde(default = "default_neighbor_similarity_floor")]
    pub neighbor_similarity_floor: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            decay: default_decay(),
            laplace_k: default_laplace_k(),
            max_tokens: default_max_tokens(),
            max_templates: default_max_templates(),
            max_line_length: default_max_line_length(),
            max_tokens_per_line: default_max_tokens_per_line(),
            with_bigrams: false,
            w_token: default_weight(),
            w_template: default_weight(),
            w_level: default_weight(),
            burn_in: default_burn_in(),
            neighbor_capacity: default_neighbor_capacity(),
            neighbor_k: default_neighbor_k(),
            neighbor_similarity_floor: default_neighbor_similarity_floor(),
        }
    }
}

impl Config {
    /// Parses a `noctane.toml`-shaped document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a config file from disk.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// §7 `CONFIG_ERROR` checks: weights non-negative, `decay` in `(0, 1]`,
    /// caps positive, `laplace_k` non-negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decay <= 0.0 || self.decay > 1.0 {
            return Err(ConfigError::DecayOutOfRange(self.decay));
        }
        if self.laplace_k < 0.0 {
            return Err(ConfigError::NegativeLaplaceK(self.laplace_k));
        }
        for (field, value) in [
            ("w_token", self.w_token),
            ("w_template", self.w_template),
            ("w_level", self.w_level),
        ] {
            if value < 0.0 {
                return Err(ConfigError::NegativeWeight { field, value });
            }
        }
        for (field, value) in [
            ("max_tokens", self.max_tokens as i64),
            ("max_templates", self.max_templates as i64),
            ("max_line_length", self.max_line_length as i64),
            ("max_tokens_per_line", self.max_tokens_per_line as i64),
            ("neighbor_capacity", self.neighbor_capacity as i64),
        ] {
            if value <= 0 {
                return Err(ConfigError::NonPositiveCap { field, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_decay_above_one() {
        let mut cfg = Config::default();
        cfg.decay = 1.5;
        assert!(matches!(cfg.validate(), Err(ConfigError::DecayOutOfRange(_))));
    }

    #[test]
    fn rejects_zero_decay() {
        let mut cfg = Config::default();
        cfg.decay = 0.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::DecayOutOfRange(_))));
    }

    #[test]
    fn rejects_negative_weight() {
        let mut cfg = Config::default();
        cfg.w_template = -0.1;
        assert!(matches!(cfg.validate(), Err(ConfigError::NegativeWeight { .. })));
    }

    #[test]
    fn rejects_non_positive_cap() {
        let mut cfg = Config::default();
        cfg.max_tokens = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::NonPositiveCap { .. })));
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg = Config::from_toml_str("decay = 0.999\nwith_bigrams = true\n").unwrap();
        assert_eq!(cfg.decay, 0.999);
        assert!(cfg.with_bigrams);
        assert_eq!(cfg.max_tokens, default_max_tokens());
    }
}
