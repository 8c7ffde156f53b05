//! End-to-end regression test driving the public `Engine` API over a
//! scripted log stream: routine lines should never clear the threshold,
//! and a planted anomaly after burn-in should.

use noctane::config::Config;
use noctane::engine::Engine;

fn routine_line(i: u64) -> String {
    format!("2025-10-01T12:00:{:02}Z INFO request id={i} status=200 completed ok", i % 60)
}

#[test]
fn planted_anomaly_clears_threshold_after_burn_in() {
    let mut config = Config::default();
    config.burn_in = 200;
    let mut engine = Engine::new(config.clone()).unwrap();
    engine.register_quantile(0.99).unwrap();

    let mut routine_cleared_threshold = false;
    for i in 0..2_000u64 {
        let payload = engine.score_and_observe(&routine_line(i));
        if engine.past_burn_in(config.burn_in) {
            if let Some((_, threshold)) = engine.threshold() {
                if payload.novelty >= threshold {
                    routine_cleared_threshold = true;
                }
            }
        }
    }
    assert!(
        !routine_cleared_threshold,
        "a routine line should not have cleared the live threshold"
    );

    let anomaly = engine.score_and_observe(
        "2025-10-01T12:30:00Z FATAL unrecoverable kernel panic in subsystem xq77z",
    );
    let (_, threshold) = engine.threshold().expect("threshold should be available");
    assert!(
        anomaly.novelty >= threshold,
        "planted anomaly (novelty {}) should clear the threshold ({})",
        anomaly.novelty,
        threshold
    );
}

#[test]
fn engine_rejects_invalid_config() {
    let mut config = Config::default();
    config.decay = 0.0;
    assert!(Engine::new(config).is_err());
}

#[test]
fn snapshot_warm_restart_preserves_model_scoring() {
    let config = Config::default();
    let mut engine = Engine::new(config).unwrap();
    for i in 0..1_000u64 {
        engine.observe(&routine_line(i));
    }

    let path = std::env::temp_dir().join(format!(
        "noctane-engine-regression-{}.json",
        std::process::id()
    ));
    engine.snapshot_save(&path).unwrap();
    let restored = Engine::snapshot_load(&path).unwrap();

    for i in 0..50u64 {
        let line = routine_line(i);
        let a = engine.score(&line);
        let b = restored.score(&line);
        assert!((a.novelty - b.novelty).abs() < 1e-9);
    }

    std::fs::remove_file(&path).ok();
}
