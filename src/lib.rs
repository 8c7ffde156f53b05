//! noctane — a streaming novelty engine for unstructured log lines.
//!
//! Feeds a line through structural canonicalization and tokenization, scores
//! it against a decayed-frequency model of tokens and templates using
//! Shannon self-information, and tracks a live high-quantile alert threshold
//! over the resulting novelty scores. Everything here is single-threaded
//! cooperative (§5): one line is processed to completion before the next,
//! and callers serialize their own concurrent access.
//!
//! # Quick start
//!
//! ```
//! use noctane::config::Config;
//! use noctane::engine::Engine;
//!
//! let mut engine = Engine::new(Config::default()).unwrap();
//! engine.register_quantile(0.99).unwrap();
//! for _ in 0..600 {
//!     engine.observe("heartbeat ok");
//! }
//! let payload = engine.score_and_observe("FATAL disk corruption on /dev/sda1");
//! println!("novelty = {:.3}", payload.novelty);
//! ```

/// Build metadata injected by `build.rs`.
pub mod build_info;
/// Masks volatile substrings in a raw line into a structural template.
pub mod canonicalizer;
/// Immutable per-engine configuration.
pub mod config;
/// The public `Engine` facade (§6.1).
pub mod engine;
/// Error types used across crate modules.
pub mod error;
/// The decayed-frequency model over tokens and templates.
pub mod model;
/// Fixed-capacity nearest-neighbor recall buffer.
pub mod neighbors;
/// Streaming quantile estimation (P² and bounded rolling window).
pub mod quantile;
/// Combines token/template/severity signals into a bounded novelty score.
pub mod scorer;
/// Versioned (de)serialization of model state.
pub mod snapshot;
/// Canonical-text tokenization and severity extraction.
pub mod tokenizer;
/// Shared value types passed between modules and out through the engine.
pub mod types;

pub use config::Config;
pub use engine::Engine;
pub use error::{ConfigError, EngineError, SnapshotError};
pub use types::{Level, LineRecord, NeighborMatch, ScorePayload, TokenContribution};
