//! Unified error types for the novelty engine.

use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// §7 `CONFIG_ERROR`: a weight, decay factor, cap, or quantile request that
/// violates the engine's invariants.
#[derive(Debug)]
pub enum ConfigError {
    /// A weight (`w_token`, `w_template`, `w_level`) was negative.
    NegativeWeight { field: &'static str, value: f64 },
    /// `decay` fell outside `(0, 1]`.
    DecayOutOfRange(f64),
    /// A capacity (`max_tokens`, `max_templates`, `max_line_length`,
    /// `max_tokens_per_line`) was non-positive.
    NonPositiveCap { field: &'static str, value: i64 },
    /// `laplace_k` was negative.
    NegativeLaplaceK(f64),
    /// A quantile request fell outside `(0, 1)`, or named an estimator that
    /// was never registered.
    InvalidQuantile(f64),
    Toml(toml::de::Error),
    Io(std::io::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeWeight { field, value } => {
                write!(f, "config: weight `{field}` must be >= 0, got {value}")
            }
            Self::DecayOutOfRange(d) => write!(f, "config: decay must be in (0, 1], got {d}"),
            Self::NonPositiveCap { field, value } => {
                write!(f, "config: `{field}` must be > 0, got {value}")
            }
            Self::NegativeLaplaceK(k) => write!(f, "config: laplace_k must be >= 0, got {k}"),
            Self::InvalidQuantile(q) => write!(f, "config: quantile must be in (0, 1), got {q}"),
            Self::Toml(e) => write!(f, "config: toml: {e}"),
            Self::Io(e) => write!(f, "config: io: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// SnapshotError
// ---------------------------------------------------------------------------

/// §7 snapshot errors, split into the two named kinds.
#[derive(Debug)]
pub enum SnapshotError {
    /// `SNAPSHOT_FORMAT`: unreadable file, missing required field, or an
    /// unknown version newer than this build supports.
    Format(String),
    /// `SNAPSHOT_INCOMPATIBLE`: a present field that is semantically
    /// invalid, e.g. `g <= 0`.
    Incompatible(String),
    Io(std::io::Error),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(msg) => write!(f, "snapshot format: {msg}"),
            Self::Incompatible(msg) => write!(f, "snapshot incompatible: {msg}"),
            Self::Io(e) => write!(f, "snapshot io: {e}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<std::io::Error> for SnapshotError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// EngineError — top-level
// ---------------------------------------------------------------------------

/// Top-level error type returned by the engine's public API.
#[derive(Debug)]
pub enum EngineError {
    /// §7 `INVALID_INPUT`: malformed input handed to the engine by its
    /// caller (e.g. non-UTF-8 bytes decoded upstream of the core).
    InvalidInput(String),
    Config(ConfigError),
    Snapshot(SnapshotError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::Config(e) => write!(f, "{e}"),
            Self::Snapshot(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<SnapshotError> for EngineError {
    fn from(e: SnapshotError) -> Self {
        Self::Snapshot(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_variants() {
        assert_eq!(
            ConfigError::DecayOutOfRange(1.5).to_string(),
            "config: decay must be in (0, 1], got 1.5"
        );
        assert_eq!(
            ConfigError::NegativeWeight {
                field: "w_token",
                value: -0.2
            }
            .to_string(),
            "config: weight `w_token` must be >= 0, got -0.2"
        );
    }

    #[test]
    fn config_error_from_toml() {
        let toml_err: toml::de::Error =
            toml::from_str::<toml::Value>("x = [unclosed").unwrap_err();
        let e = ConfigError::from(toml_err);
        assert!(e.to_string().starts_with("config: toml:"));
    }

    #[test]
    fn snapshot_error_display_variants() {
        assert_eq!(
            SnapshotError::Format("missing field `g`".into()).to_string(),
            "snapshot format: missing field `g`"
        );
        assert_eq!(
            SnapshotError::Incompatible("g <= 0".into()).to_string(),
            "snapshot incompatible: g <= 0"
        );
    }

    #[test]
    fn engine_error_from_config_error() {
        let e = EngineError::from(ConfigError::NegativeLaplaceK(-1.0));
        assert!(e.to_string().contains("laplace_k"));
    }

    #[test]
    fn engine_error_from_snapshot_error() {
        let e = EngineError::from(SnapshotError::Incompatible("bad".into()));
        assert!(e.to_string().contains("snapshot incompatible"));
    }
}
