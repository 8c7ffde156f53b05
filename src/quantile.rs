//! Constant-memory streaming quantile estimation, per §4.5.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::error::ConfigError;

/// Jain & Chlamtac's P² algorithm: five markers tracking a single quantile
/// in O(1) memory and amortized O(1) time per sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct P2Estimator {
    q: f64,
    /// Bootstrap buffer; holds the first five samples until initialized.
    bootstrap: Vec<f64>,
    initialized: bool,
    h: [f64; 5],
    n: [i64; 5],
    d: [f64; 5],
    dn: [f64; 5],
}

impl P2Estimator {
    pub fn new(q: f64) -> Self {
        Self {
            q,
            bootstrap: Vec::with_capacity(5),
            initialized: false,
            h: [0.0; 5],
            n: [0; 5],
            d: [0.0; 5],
            dn: [0.0, q / 2.0, q, (1.0 + q) / 2.0, 1.0],
        }
    }

    pub fn quantile(&self) -> f64 {
        self.q
    }

    pub fn sample_count(&self) -> usize {
        if self.initialized {
            self.n[4] as usize
        } else {
            self.bootstrap.len()
        }
    }

    /// The current quantile estimate; exact interpolation during bootstrap,
    /// `h[2]` once the five markers are initialized.
    pub fn estimate(&self) -> Option<f64> {
        if self.initialized {
            return Some(self.h[2]);
        }
        if self.bootstrap.is_empty() {
            return None;
        }
        let mut sorted = self.bootstrap.clone();
        sorted.sort_by(f64::total_cmp);
        let rank = self.q * (sorted.len() as f64 - 1.0);
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        if lo == hi {
            Some(sorted[lo])
        } else {
            let frac = rank - lo as f64;
            Some(sorted[lo] * (1.0 - frac) + sorted[hi] * frac)
        }
    }

    pub fn observe(&mut self, x: f64) {
        if !self.initialized {
            self.bootstrap.push(x);
            if self.bootstrap.len() == 5 {
                self.bootstrap.sort_by(f64::total_cmp);
                self.h = [
                    self.bootstrap[0],
                    self.bootstrap[1],
                    self.bootstrap[2],
                    self.bootstrap[3],
                    self.bootstrap[4],
                ];
                self.n = [0, 1, 2, 3, 4];
                let q = self.q;
                self.d = [0.0, 2.0 * q, 4.0 * q, 2.0 + 2.0 * q, 4.0];
                self.initialized = true;
            }
            return;
        }

        // Step 1: locate cell k, extending an extreme marker if x is outside.
        let k = if x < self.h[0] {
            self.h[0] = x;
            0
        } else if x >= self.h[4] {
            if x > self.h[4] {
                self.h[4] = x;
            }
            3
        } else {
            let mut k = 0;
            for i in 0..4 {
                if self.h[i] <= x && x < self.h[i + 1] {
                    k = i;
                    break;
                }
            }
            k
        };

        // Step 2: bump counts past the insertion cell, advance desired positions.
        for i in (k + 1)..5 {
            self.n[i] += 1;
        }
        for i in 0..5 {
            self.d[i] += self.dn[i];
        }

        // Step 3: adjust the three interior markers.
        for i in 1..4 {
            let delta = self.d[i] - self.n[i] as f64;
            if delta >= 1.0 && self.n[i + 1] - self.n[i] > 1 {
                self.adjust(i, 1);
            } else if delta <= -1.0 && self.n[i - 1] - self.n[i] < -1 {
                self.adjust(i, -1);
            }
        }
    }

    fn adjust(&mut self, i: usize, s: i64) {
        let n_im1 = self.n[i - 1] as f64;
        let n_i = self.n[i] as f64;
        let n_ip1 = self.n[i + 1] as f64;
        let h_im1 = self.h[i - 1];
        let h_i = self.h[i];
        let h_ip1 = self.h[i + 1];
        let sf = s as f64;

        let parabolic = h_i
            + sf / (n_ip1 - n_im1)
                * ((n_i - n_im1 + sf) * (h_ip1 - h_i) / (n_ip1 - n_i)
                    + (n_ip1 - n_i - sf) * (h_i - h_im1) / (n_i - n_im1));

        let new_h = if h_im1 < parabolic && parabolic < h_ip1 {
            parabolic
        } else if s > 0 {
            h_i + (h_ip1 - h_i) / (n_ip1 - n_i)
        } else {
            h_i - (h_im1 - h_i) / (n_im1 - n_i)
        };

        self.h[i] = new_h;
        self.n[i] += s;
    }
}

/// Bounded rolling-window alternative (§4.5): O(W) memory, O(W log W) query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingWindowEstimator {
    q: f64,
    window: usize,
    samples: VecDeque<f64>,
}

impl RollingWindowEstimator {
    pub fn new(q: f64, window: usize) -> Self {
        Self {
            q,
            window,
            samples: VecDeque::with_capacity(window),
        }
    }

    pub fn quantile(&self) -> f64 {
        self.q
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn observe(&mut self, x: f64) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(x);
    }

    pub fn estimate(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        let rank = self.q * (sorted.len() as f64 - 1.0);
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        if lo == hi {
            Some(sorted[lo])
        } else {
            let frac = rank - lo as f64;
            Some(sorted[lo] * (1.0 - frac) + sorted[hi] * frac)
        }
    }
}

/// Either streaming estimator variant, selected at engine construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    P2(P2Estimator),
    Window(RollingWindowEstimator),
}

impl Estimator {
    pub fn observe(&mut self, x: f64) {
        match self {
            Estimator::P2(e) => e.observe(x),
            Estimator::Window(e) => e.observe(x),
        }
    }

    pub fn estimate(&self) -> Option<f64> {
        match self {
            Estimator::P2(e) => e.estimate(),
            Estimator::Window(e) => e.estimate(),
        }
    }

    pub fn sample_count(&self) -> usize {
        match self {
            Estimator::P2(e) => e.sample_count(),
            Estimator::Window(e) => e.sample_count(),
        }
    }

    pub fn quantile(&self) -> f64 {
        match self {
            Estimator::P2(e) => e.quantile(),
            Estimator::Window(e) => e.quantile(),
        }
    }
}

/// The construction-time choice of estimator family; `Window` carries its
/// bounded capacity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum EstimatorKind {
    P2,
    Window { capacity: usize },
}

/// Maintains one estimator per registered quantile (§4.5 "multi-quantile
/// mode"). The alert threshold is the estimate for the largest registered
/// quantile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiQuantile {
    kind: EstimatorKind,
    // Keyed by bit pattern of `q` so f64 quantiles can live in a BTreeMap
    // without a NaN-unsafe Ord impl; iteration order is numeric order for
    // any finite, non-negative q, which is all this type accepts.
    estimators: BTreeMap<u64, Estimator>,
}

impl MultiQuantile {
    pub fn new(kind: EstimatorKind) -> Self {
        Self {
            kind,
            estimators: BTreeMap::new(),
        }
    }

    fn make_estimator(&self, q: f64) -> Estimator {
        match self.kind {
            EstimatorKind::P2 => Estimator::P2(P2Estimator::new(q)),
            EstimatorKind::Window { capacity } => {
                Estimator::Window(RollingWindowEstimator::new(q, capacity))
            }
        }
    }

    /// Registers a new quantile estimator. Returns `CONFIG_ERROR` if `q` is
    /// outside `(0, 1)`.
    pub fn register(&mut self, q: f64) -> Result<(), ConfigError> {
        if !(q > 0.0 && q < 1.0) {
            return Err(ConfigError::InvalidQuantile(q));
        }
        let estimator = self.make_estimator(q);
        self.estimators.insert(q.to_bits(), estimator);
        Ok(())
    }

    pub fn observe(&mut self, x: f64) {
        for estimator in self.estimators.values_mut() {
            estimator.observe(x);
        }
    }

    /// Looks up the estimate for a previously registered quantile.
    pub fn estimate(&self, q: f64) -> Result<Option<f64>, ConfigError> {
        self.estimators
            .get(&q.to_bits())
            .map(|e| e.estimate())
            .ok_or(ConfigError::InvalidQuantile(q))
    }

    /// The largest registered quantile's current estimate — the alert
    /// threshold (§4.5).
    pub fn threshold(&self) -> Option<(f64, f64)> {
        self.estimators
            .values()
            .next_back()
            .and_then(|e| e.estimate().map(|v| (e.quantile(), v)))
    }

    /// All registered quantile -> estimate pairs, for emission alongside an
    /// alert (§6.3 `quantile_estimates`).
    pub fn all_estimates(&self) -> Vec<(f64, Option<f64>)> {
        self.estimators
            .values()
            .map(|e| (e.quantile(), e.estimate()))
            .collect()
    }

    /// Minimum sample count across all registered estimators, used for the
    /// "at least 10 samples fed to the estimator" half of burn-in (§4.5).
    pub fn min_sample_count(&self) -> usize {
        self.estimators
            .values()
            .map(|e| e.sample_count())
            .min()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.estimators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    #[test]
    fn bootstrap_gives_exact_interpolated_quantile() {
        let mut p2 = P2Estimator::new(0.5);
        for x in [3.0, 1.0, 5.0] {
            p2.observe(x);
        }
        assert_eq!(p2.estimate(), Some(3.0));
    }

    #[test]
    fn markers_stay_ordered_after_many_samples() {
        let mut p2 = P2Estimator::new(0.9);
        let mut rng = StdRng::seed_from_u64(12345);
        for _ in 0..5000 {
            p2.observe(rng.gen::<f64>());
        }
        for i in 0..4 {
            assert!(p2.h[i] <= p2.h[i + 1], "markers out of order: {:?}", p2.h);
        }
        let est = p2.estimate().unwrap();
        assert!((0.0..=1.0).contains(&est));
    }

    #[test]
    fn p2_converges_to_requested_quantile() {
        let mut p2 = P2Estimator::new(0.95);
        let mut rng = StdRng::seed_from_u64(42);
        let mut samples = Vec::new();
        for _ in 0..20_000 {
            let sample = rng.gen::<f64>();
            samples.push(sample);
            p2.observe(sample);
        }
        let est = p2.estimate().unwrap();
        let below = samples.iter().filter(|&&s| s < est).count() as f64 / samples.len() as f64;
        assert!(
            (below - 0.95).abs() < 0.02,
            "empirical fraction below estimate was {below}, wanted ~0.95"
        );
    }

    #[test]
    fn rolling_window_bounds_memory_and_reports_correct_quantile() {
        let mut w = RollingWindowEstimator::new(0.5, 3);
        w.observe(1.0);
        w.observe(2.0);
        w.observe(3.0);
        w.observe(100.0); // evicts 1.0
        assert_eq!(w.sample_count(), 3);
        assert_eq!(w.estimate(), Some(3.0));
    }

    #[test]
    fn multi_quantile_threshold_is_the_largest_quantile() {
        let mut mq = MultiQuantile::new(EstimatorKind::P2);
        mq.register(0.5).unwrap();
        mq.register(0.99).unwrap();
        for i in 0..10 {
            mq.observe(i as f64);
        }
        let (q, _) = mq.threshold().unwrap();
        assert_eq!(q, 0.99);
    }

    #[test]
    fn rejects_quantile_outside_unit_interval() {
        let mut mq = MultiQuantile::new(EstimatorKind::P2);
        assert!(matches!(mq.register(1.0), Err(ConfigError::InvalidQuantile(_))));
        assert!(matches!(mq.register(0.0), Err(ConfigError::InvalidQuantile(_))));
    }

    #[cfg(feature = "fuzz-tests")]
    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn p2_markers_stay_ordered_after_arbitrary_samples(
                q in 0.01f64..0.99,
                samples in proptest::collection::vec(-1e6f64..1e6, 1..300),
            ) {
                let mut p2 = P2Estimator::new(q);
                for x in samples {
                    p2.observe(x);
                }
                for i in 0..4 {
                    prop_assert!(p2.h[i] <= p2.h[i + 1]);
                }
                if let Some(est) = p2.estimate() {
                    prop_assert!(est.is_finite());
                }
            }
        }
    }
}
