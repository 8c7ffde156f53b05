//! Decayed-frequency model over tokens and templates, per §4.3.
//!
//! Both token and template statistics share the same shape (a bounded,
//! LRU-evictable frequency table) and the same global decay scale `g`, so
//! the table itself is a single reusable type and `InfoModel` holds two
//! instances of it plus the scalars from §3.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::Config;

/// One entry in a [`FrequencyTable`]: a decay-scaled count plus the
/// logical-clock tick of its last touch, used for LRU eviction (§9).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Entry {
    stored_count: f64,
    last_used: u64,
}

/// A bounded, LRU-evictable `key -> decayed count` table. `InfoModel` keeps
/// one for tokens and one for templates; both track their own mass.
#[derive(Debug, Clone, Default)]
pub(crate) struct FrequencyTable {
    entries: HashMap<String, Entry>,
    capacity: usize,
    clock: u64,
}

impl FrequencyTable {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
            clock: 0,
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn stored_count(&self, key: &str) -> f64 {
        self.entries.get(key).map(|e| e.stored_count).unwrap_or(0.0)
    }

    /// Increments `key`'s stored count by `delta` and refreshes its recency,
    /// returning the mass added (always `delta`, since effective mass added
    /// equals `delta * g` and `delta` here is already `1/g`-scaled by the
    /// caller so the *effective* increment is exactly 1 — see §4.3).
    fn touch_and_add(&mut self, key: &str, delta: f64) {
        self.clock += 1;
        let tick = self.clock;
        match self.entries.get_mut(key) {
            Some(e) => {
                e.stored_count += delta;
                e.last_used = tick;
            }
            None => {
                self.entries.insert(
                    key.to_string(),
                    Entry {
                        stored_count: delta,
                        last_used: tick,
                    },
                );
            }
        }
    }

    /// Evicts entries until at or under capacity, never evicting a key in
    /// `protected`. Tie-break: least-recently-used, then lowest stored
    /// count (equivalent to lowest effective count since `g` is shared),
    /// then lexicographically smallest key (§9).
    fn evict_to_capacity(&mut self, protected: &HashMap<String, ()>) -> f64 {
        let mut mass_removed = 0.0;
        while self.entries.len() > self.capacity {
            let victim = self
                .entries
                .iter()
                .filter(|(k, _)| !protected.contains_key(k.as_str()))
                .min_by(|(ka, ea), (kb, eb)| {
                    ea.last_used
                        .cmp(&eb.last_used)
                        .then_with(|| ea.stored_count.total_cmp(&eb.stored_count))
                        .then_with(|| ka.cmp(kb))
                })
                .map(|(k, e)| (k.clone(), e.stored_count));
            match victim {
                Some((key, stored)) => {
                    mass_removed += stored;
                    self.entries.remove(&key);
                }
                None => break, // every remaining entry is protected this line
            }
        }
        mass_removed
    }

    fn rescale(&mut self, factor: f64) {
        for e in self.entries.values_mut() {
            e.stored_count *= factor;
        }
    }

    fn snapshot_counts(&self) -> HashMap<String, f64> {
        self.entries
            .iter()
            .map(|(k, e)| (k.clone(), e.stored_count))
            .collect()
    }

    fn snapshot_order(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.entries.iter().collect();
        keys.sort_by_key(|(_, e)| e.last_used);
        keys.into_iter().map(|(k, _)| k.clone()).collect()
    }

    fn load(capacity: usize, counts: HashMap<String, f64>, order: &[String]) -> Self {
        let mut clock = 0u64;
        let mut entries = HashMap::with_capacity(counts.len());
        for key in order {
            if let Some(stored_count) = counts.get(key) {
                clock += 1;
                entries.insert(
                    key.clone(),
                    Entry {
                        stored_count: *stored_count,
                        last_used: clock,
                    },
                );
            }
        }
        // Any counted key absent from `order` (tolerant of older snapshot
        // versions that didn't carry vocab_order) is appended, oldest-first.
        for (key, stored_count) in &counts {
            if !entries.contains_key(key) {
                clock += 1;
                entries.insert(
                    key.clone(),
                    Entry {
                        stored_count: *stored_count,
                        last_used: clock,
                    },
                );
            }
        }
        Self {
            entries,
            capacity,
            clock,
        }
    }
}

/// The decayed-frequency model: two bounded frequency tables (tokens,
/// templates) sharing one lazily-applied global decay scale, per §4.3.
#[derive(Debug, Clone)]
pub struct InfoModel {
    pub(crate) tokens: FrequencyTable,
    pub(crate) templates: FrequencyTable,
    pub(crate) g: f64,
    pub(crate) total_token_mass: f64,
    pub(crate) total_template_mass: f64,
    pub(crate) seen_lines: u64,
    pub(crate) truncated_lines: u64,
    pub(crate) truncated_tokens: u64,
    pub(crate) renormalizations: u64,
    laplace_k: f64,
    max_tokens: usize,
    max_templates: usize,
    decay: f64,
}

/// Below this, `g` is renormalized back to `1.0` (§4.3 step 1).
const RENORMALIZE_THRESHOLD: f64 = 1e-12;

impl InfoModel {
    pub fn new(config: &Config) -> Self {
        Self {
            tokens: FrequencyTable::new(config.max_tokens),
            templates: FrequencyTable::new(config.max_templates),
            g: 1.0,
            total_token_mass: 0.0,
            total_template_mass: 0.0,
            seen_lines: 0,
            truncated_lines: 0,
            truncated_tokens: 0,
            renormalizations: 0,
            laplace_k: config.laplace_k,
            max_tokens: config.max_tokens,
            max_templates: config.max_templates,
            decay: config.decay,
        }
    }

    /// Applies one line's observation: decay, then template/token count
    /// increments, then bounded eviction, per §4.3.
    pub fn observe(&mut self, template: &str, tokens: &[String]) {
        self.seen_lines += 1;
        tracing::trace!(seen_lines = self.seen_lines, tokens = tokens.len(), "observe");

        self.g *= self.decay_factor();
        if self.g < RENORMALIZE_THRESHOLD {
            self.renormalize();
        }

        let delta = 1.0 / self.g;

        self.templates.touch_and_add(template, delta);
        self.total_template_mass += 1.0;

        for token in tokens {
            self.tokens.touch_and_add(token, delta);
            self.total_token_mass += 1.0;
        }

        let protected_templates: HashMap<String, ()> =
            std::iter::once((template.to_string(), ())).collect();
        let evicted_templates = self.templates.evict_to_capacity(&protected_templates);
        if evicted_templates > 0.0 {
            tracing::trace!(vocab_size = self.templates.len(), "evicted template");
        }
        self.total_template_mass -= evicted_templates * self.g;

        let protected_tokens: HashMap<String, ()> =
            tokens.iter().map(|t| (t.clone(), ())).collect();
        let evicted_tokens = self.tokens.evict_to_capacity(&protected_tokens);
        if evicted_tokens > 0.0 {
            tracing::trace!(vocab_size = self.tokens.len(), "evicted token");
        }
        self.total_token_mass -= evicted_tokens * self.g;
    }

    fn decay_factor(&self) -> f64 {
        self.decay
    }

    fn renormalize(&mut self) {
        self.tokens.rescale(self.g);
        self.templates.rescale(self.g);
        self.g = 1.0;
        self.renormalizations += 1;
        tracing::debug!(
            renormalizations = self.renormalizations,
            seen_lines = self.seen_lines,
            "renormalized decay scale"
        );
    }

    pub fn token_probability(&self, token: &str) -> f64 {
        probability(
            self.tokens.stored_count(token) * self.g,
            self.total_token_mass,
            self.tokens.len(),
            self.laplace_k,
        )
    }

    pub fn template_probability(&self, template: &str) -> f64 {
        probability(
            self.templates.stored_count(template) * self.g,
            self.total_template_mass,
            self.templates.len(),
            self.laplace_k,
        )
    }

    pub fn token_bits(&self, token: &str) -> f64 {
        -self.token_probability(token).log2()
    }

    pub fn template_bits(&self, template: &str) -> f64 {
        -self.template_probability(template).log2()
    }

    pub fn token_effective_count(&self, token: &str) -> f64 {
        self.tokens.stored_count(token) * self.g
    }

    pub fn token_vocab_size(&self) -> usize {
        self.tokens.len()
    }

    pub fn template_vocab_size(&self) -> usize {
        self.templates.len()
    }

    /// Sum of stored counts across both tables times `g`; used by the
    /// mass-conservation invariant test (§8.4).
    pub fn reconstructed_token_mass(&self) -> f64 {
        self.tokens.entries.values().map(|e| e.stored_count).sum::<f64>() * self.g
    }

    pub fn reconstructed_template_mass(&self) -> f64 {
        self.templates
            .entries
            .values()
            .map(|e| e.stored_count)
            .sum::<f64>()
            * self.g
    }

    pub(crate) fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub(crate) fn max_templates(&self) -> usize {
        self.max_templates
    }

    /// Builds a model directly from snapshot fields, per §4.7. `g` and the
    /// guardrail counters default per the version-tolerance rule in §4.7 /
    /// §8 scenario 6 when the caller passes `None`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_snapshot_parts(
        config: &Config,
        token_counts: HashMap<String, f64>,
        token_order: Vec<String>,
        template_counts: HashMap<String, f64>,
        template_order: Vec<String>,
        g: f64,
        seen_lines: u64,
        total_token_mass: f64,
        total_template_mass: f64,
        truncated_lines: u64,
        truncated_tokens: u64,
        renormalizations: u64,
    ) -> Self {
        Self {
            tokens: FrequencyTable::load(config.max_tokens, token_counts, &token_order),
            templates: FrequencyTable::load(config.max_templates, template_counts, &template_order),
            g,
            total_token_mass,
            total_template_mass,
            seen_lines,
            truncated_lines,
            truncated_tokens,
            renormalizations,
            laplace_k: config.laplace_k,
            max_tokens: config.max_tokens,
            max_templates: config.max_templates,
            decay: config.decay,
        }
    }

    pub(crate) fn token_counts(&self) -> HashMap<String, f64> {
        self.tokens.snapshot_counts()
    }

    pub(crate) fn template_counts(&self) -> HashMap<String, f64> {
        self.templates.snapshot_counts()
    }

    pub(crate) fn token_order(&self) -> Vec<String> {
        self.tokens.snapshot_order()
    }

    pub(crate) fn template_order(&self) -> Vec<String> {
        self.templates.snapshot_order()
    }
}

fn probability(effective_count: f64, total_mass: f64, vocab_size: usize, laplace_k: f64) -> f64 {
    (effective_count + laplace_k) / (total_mass + laplace_k * (vocab_size as f64 + 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn model_with(max_tokens: usize, max_templates: usize, decay: f64) -> InfoModel {
        let mut cfg = Config::default();
        cfg.max_tokens = max_tokens;
        cfg.max_templates = max_templates;
        cfg.decay = decay;
        InfoModel::new(&cfg)
    }

    #[test]
    fn effective_counts_never_negative() {
        let mut model = model_with(100, 100, 0.9999);
        for i in 0..50 {
            model.observe("tmpl", &[format!("tok{i}")]);
        }
        assert!(model.token_effective_count("tok0") >= 0.0);
        assert!(model.g > 0.0);
    }

    #[test]
    fn lru_eviction_respects_cap_and_order() {
        let mut model = model_with(3, 10, 0.9999);
        model.observe("t", &["a".into()]);
        model.observe("t", &["b".into()]);
        model.observe("t", &["c".into()]);
        model.observe("t", &["d".into()]);
        assert_eq!(model.token_vocab_size(), 3);
        assert_eq!(model.token_effective_count("a"), 0.0);
        assert!(model.token_effective_count("b") > 0.0);
        assert!(model.token_effective_count("d") > 0.0);
    }

    #[test]
    fn decay_shrinks_effective_count_geometrically() {
        let mut model = model_with(1000, 1000, 0.5);
        model.observe("t", &["x".into()]);
        for _ in 0..10 {
            model.observe("t", &["y".into()]);
        }
        let got = model.token_effective_count("x");
        let expected = 2f64.powi(-10);
        assert!(
            (got - expected).abs() < 1e-6,
            "got {got}, expected ~{expected}"
        );
    }

    #[test]
    fn renormalizes_when_g_underflows() {
        // decay just under 1 with many lines drives g below the threshold.
        let mut model = model_with(1000, 1000, 0.999);
        for i in 0..40_000 {
            model.observe("t", &[format!("tok{}", i % 5)]);
        }
        assert!(model.renormalizations > 0);
        assert!(model.g > 0.0);
    }

    #[test]
    fn mass_matches_sum_of_stored_counts_scaled_by_g() {
        let mut model = model_with(1000, 1000, 0.9999);
        for i in 0..200 {
            model.observe("t", &[format!("tok{}", i % 20)]);
        }
        let reconstructed = model.reconstructed_token_mass();
        assert!(
            (reconstructed - model.total_token_mass).abs() < 1e-6,
            "reconstructed {reconstructed} vs tracked {}",
            model.total_token_mass
        );
    }

    #[test]
    fn queries_never_mutate_state() {
        let mut model = model_with(1000, 1000, 0.9999);
        model.observe("t", &["x".into()]);
        let before = model.token_vocab_size();
        let _ = model.token_bits("unseen");
        let _ = model.template_bits("unseen template");
        assert_eq!(before, model.token_vocab_size());
    }

    #[test]
    fn unseen_token_gets_smoothed_probability() {
        let mut model = model_with(1000, 1000, 0.9999);
        for _ in 0..100 {
            model.observe("t", &["common".into()]);
        }
        let p_unseen = model.token_probability("never-seen");
        let p_common = model.token_probability("common");
        assert!(p_unseen > 0.0 && p_unseen < p_common);
    }
}
