//! The public facade tying together canonicalization, tokenization, the
//! decayed-frequency model, the scorer, quantile estimation, and the
//! neighbor buffer, per §6.1.

use std::path::Path;

use crate::canonicalizer;
use crate::config::Config;
use crate::error::{ConfigError, EngineError, SnapshotError};
use crate::model::InfoModel;
use crate::neighbors::NeighborBuffer;
use crate::quantile::{EstimatorKind, MultiQuantile};
use crate::scorer::{self, Weights};
use crate::snapshot;
use crate::tokenizer;
use crate::types::{LineRecord, Level, ScorePayload};

/// A single streaming novelty engine instance (§2). Single-threaded
/// cooperative per §5: callers must serialize their own concurrent access.
pub struct Engine {
    config: Config,
    model: InfoModel,
    quantiles: MultiQuantile,
    neighbor_buffer: NeighborBuffer,
}

impl Engine {
    /// Builds a fresh engine with the default P² quantile family.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        Self::with_estimator_kind(config, EstimatorKind::P2)
    }

    /// Builds a fresh engine using the given quantile estimator family
    /// (§4.5: P² or bounded rolling window).
    pub fn with_estimator_kind(config: Config, kind: EstimatorKind) -> Result<Self, ConfigError> {
        config.validate()?;
        let model = InfoModel::new(&config);
        let neighbor_buffer =
            NeighborBuffer::new(config.neighbor_capacity, config.neighbor_similarity_floor);
        Ok(Self {
            config,
            model,
            quantiles: MultiQuantile::new(kind),
            neighbor_buffer,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn weights(&self) -> Weights {
        Weights {
            w_token: self.config.w_token,
            w_template: self.config.w_template,
            w_level: self.config.w_level,
        }
    }

    /// Canonicalizes and tokenizes `raw` without touching model state.
    /// Returns the record plus the two guardrail flags separately, since
    /// §3 tracks `truncated_lines` and `truncated_tokens` as independent
    /// model scalars even though `LineRecord` exposes a single combined
    /// `truncated` bool.
    fn build_record(&self, raw: &str) -> (LineRecord, bool, bool) {
        let (canonical, line_truncated) =
            canonicalizer::canonicalize(raw, self.config.max_line_length);
        let (tokens, tokens_truncated) = tokenizer::tokenize(
            &canonical,
            self.config.with_bigrams,
            self.config.max_tokens_per_line,
        );
        let level = tokenizer::extract_level(&tokens);
        let record = LineRecord {
            raw: raw.to_string(),
            canonical,
            tokens,
            level,
            truncated: line_truncated || tokens_truncated,
        };
        (record, line_truncated, tokens_truncated)
    }

    fn payload_for(&self, record: &LineRecord) -> ScorePayload {
        let components = scorer::score(
            &self.model,
            &record.tokens,
            &record.canonical,
            record.level,
            self.weights(),
        );
        ScorePayload {
            novelty: components.novelty,
            raw_score: components.raw_score,
            token_info_bits: components.token_info_bits,
            template_info_bits: components.template_info_bits,
            level_bonus: components.level_bonus,
            template: record.canonical.clone(),
            template_probability: components.template_probability,
            tokens: record.tokens.clone(),
            token_contributors: components.token_contributors,
            level: record.level,
        }
    }

    /// Scores `raw` against the current model without mutating any state
    /// (§6.1 `score`). Calling this twice with no intervening `observe`
    /// yields bitwise-identical payloads (§8 invariant 5).
    pub fn score(&self, raw: &str) -> ScorePayload {
        let (record, ..) = self.build_record(raw);
        self.payload_for(&record)
    }

    /// Updates the model, quantile estimators, and neighbor buffer with
    /// `raw`, without returning a score (§6.1 `observe`).
    pub fn observe(&mut self, raw: &str) {
        self.process(raw);
    }

    /// Scores `raw`, then applies the observation, per §6.1
    /// `score_and_observe`.
    pub fn score_and_observe(&mut self, raw: &str) -> ScorePayload {
        self.process(raw)
    }

    fn process(&mut self, raw: &str) -> ScorePayload {
        let (record, line_truncated, tokens_truncated) = self.build_record(raw);
        let payload = self.payload_for(&record);

        if line_truncated {
            self.model.truncated_lines += 1;
        }
        if tokens_truncated {
            self.model.truncated_tokens += 1;
        }

        self.model.observe(&record.canonical, &record.tokens);
        self.quantiles.observe(payload.novelty);
        self.neighbor_buffer.push(&record.raw, &record.tokens);

        payload
    }

    /// Registers a new quantile estimator (§4.5 multi-quantile mode).
    pub fn register_quantile(&mut self, q: f64) -> Result<(), ConfigError> {
        self.quantiles.register(q)
    }

    /// Reads a previously registered quantile's current estimate.
    pub fn quantile(&self, q: f64) -> Result<Option<f64>, ConfigError> {
        self.quantiles.estimate(q)
    }

    /// The alert threshold: the estimate for the largest registered
    /// quantile, alongside that quantile itself.
    pub fn threshold(&self) -> Option<(f64, f64)> {
        self.quantiles.threshold()
    }

    /// All registered quantile -> estimate pairs (§6.3
    /// `quantile_estimates`).
    pub fn quantile_estimates(&self) -> Vec<(f64, Option<f64>)> {
        self.quantiles.all_estimates()
    }

    /// Whether burn-in (§4.5) has completed: `seen_lines >= burn_in` and at
    /// least 10 samples have reached the quantile estimators. Returns
    /// `false` (never alert) if no quantile has been registered.
    pub fn past_burn_in(&self, burn_in: u64) -> bool {
        !self.quantiles.is_empty()
            && self.model.seen_lines >= burn_in
            && self.quantiles.min_sample_count() >= 10
    }

    /// Top-`k` similar lines to `tokens` by cosine similarity (§4.6).
    pub fn neighbors(&self, tokens: &[String], k: usize) -> Vec<crate::types::NeighborMatch> {
        self.neighbor_buffer.query(tokens, k)
    }

    pub fn seen_lines(&self) -> u64 {
        self.model.seen_lines
    }

    pub fn truncated_lines(&self) -> u64 {
        self.model.truncated_lines
    }

    pub fn truncated_tokens(&self) -> u64 {
        self.model.truncated_tokens
    }

    pub fn renormalizations(&self) -> u64 {
        self.model.renormalizations
    }

    /// Saves the frequency model and its config to `path` (§4.7, §6.1).
    /// The neighbor buffer and quantile estimators are not part of the
    /// persisted state — only the model state is meant to survive a warm
    /// restart.
    pub fn snapshot_save(&self, path: &Path) -> Result<(), SnapshotError> {
        tracing::debug!(path = %path.display(), seen_lines = self.model.seen_lines, "saving snapshot");
        snapshot::save(path, &self.config, &self.model)
    }

    /// Loads a fresh engine from a snapshot file (§4.7, §6.1). Quantile
    /// estimators must be re-registered by the caller; the neighbor buffer
    /// starts empty.
    pub fn snapshot_load(path: &Path) -> Result<Self, EngineError> {
        tracing::debug!(path = %path.display(), "loading snapshot");
        let (config, model) = snapshot::load(path).map_err(EngineError::Snapshot)?;
        let neighbor_buffer =
            NeighborBuffer::new(config.neighbor_capacity, config.neighbor_similarity_floor);
        Ok(Self {
            config,
            model,
            quantiles: MultiQuantile::new(EstimatorKind::P2),
            neighbor_buffer,
        })
    }
}
