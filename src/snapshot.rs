//! Versioned (de)serialization of model state, per §4.7.
//!
//! The writer always emits `CURRENT_VERSION`. The reader is tolerant of
//! older versions: fields absent from the file default per §4.7 /
//! §8 scenario 6 (missing `g` defaults to `1.0`; missing guardrail counters
//! default to `0`). An unknown version *newer* than this build is a
//! `SNAPSHOT_FORMAT` error rather than a silent best-effort read.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use crate::config::Config;
use crate::error::SnapshotError;
use crate::model::InfoModel;

pub const CURRENT_VERSION: u32 = 3;

#[derive(Debug, Serialize, Deserialize)]
struct VocabOrder {
    #[serde(default)]
    tokens: Vec<String>,
    #[serde(default)]
    templates: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SnapshotFile<'a> {
    version: u32,
    config: &'a Config,
    token_counts: HashMap<String, f64>,
    template_counts: HashMap<String, f64>,
    g: f64,
    seen_lines: u64,
    total_token_mass: f64,
    total_template_mass: f64,
    truncated_lines: u64,
    truncated_tokens: u64,
    renormalizations: u64,
    vocab_order: VocabOrder,
}

/// Serializes `model` (with its owning `config`) to a canonical JSON string.
pub fn serialize(config: &Config, model: &InfoModel) -> String {
    let file = SnapshotFile {
        version: CURRENT_VERSION,
        config,
        token_counts: model.token_counts(),
        template_counts: model.template_counts(),
        g: model.g,
        seen_lines: model.seen_lines,
        total_token_mass: model.total_token_mass,
        total_template_mass: model.total_template_mass,
        truncated_lines: model.truncated_lines,
        truncated_tokens: model.truncated_tokens,
        renormalizations: model.renormalizations,
        vocab_order: VocabOrder {
            tokens: model.token_order(),
            templates: model.template_order(),
        },
    };
    // unwrap: every field is a plain, finite-valued, serializable type.
    serde_json::to_string_pretty(&file).expect("snapshot fields are always serializable")
}

/// Writes a snapshot to `path` via a temp file + atomic rename, per §5's
/// requirement that concurrent periodic saves never leave a torn file.
pub fn save(path: &Path, config: &Config, model: &InfoModel) -> Result<(), SnapshotError> {
    let contents = serialize(config, model);
    let tmp_path = path.with_extension("tmp");
    {
        let mut f = std::fs::File::create(&tmp_path)?;
        f.write_all(contents.as_bytes())?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Parses a snapshot document, tolerant of versions 1 and 2 missing fields
/// that version 3 introduced.
pub fn deserialize(contents: &str) -> Result<(Config, InfoModel), SnapshotError> {
    let doc: Value = serde_json::from_str(contents)
        .map_err(|e| SnapshotError::Format(format!("invalid json: {e}")))?;

    let version = doc
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| SnapshotError::Format("missing field `version`".to_string()))?;
    if version > CURRENT_VERSION as u64 {
        return Err(SnapshotError::Format(format!(
            "unknown snapshot version {version}, this build supports up to {CURRENT_VERSION}"
        )));
    }

    let config_value = doc
        .get("config")
        .ok_or_else(|| SnapshotError::Format("missing field `config`".to_string()))?;
    let config: Config = serde_json::from_value(config_value.clone())
        .map_err(|e| SnapshotError::Format(format!("invalid `config`: {e}")))?;
    config
        .validate()
        .map_err(|e| SnapshotError::Incompatible(e.to_string()))?;

    let token_counts = read_count_map(&doc, "token_counts")?;
    let template_counts = read_count_map(&doc, "template_counts")?;

    // v1/v2 snapshots predate `g`; their counts are assumed already in
    // effective form, so g defaults to 1.0 (§4.7).
    let g = doc.get("g").and_then(Value::as_f64).unwrap_or(1.0);
    if g <= 0.0 {
        return Err(SnapshotError::Incompatible(format!("g must be > 0, got {g}")));
    }

    let seen_lines = doc.get("seen_lines").and_then(Value::as_u64).unwrap_or(0);
    let total_token_mass = doc
        .get("total_token_mass")
        .and_then(Value::as_f64)
        .unwrap_or_else(|| token_counts.values().sum());
    let total_template_mass = doc
        .get("total_template_mass")
        .and_then(Value::as_f64)
        .unwrap_or_else(|| template_counts.values().sum());
    let truncated_lines = doc
        .get("truncated_lines")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let truncated_tokens = doc
        .get("truncated_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let renormalizations = doc
        .get("renormalizations")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    let vocab_order: VocabOrder = doc
        .get("vocab_order")
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
        .map_err(|e| SnapshotError::Format(format!("invalid `vocab_order`: {e}")))?
        .unwrap_or(VocabOrder {
            tokens: Vec::new(),
            templates: Vec::new(),
        });

    let model = InfoModel::from_snapshot_parts(
        &config,
        token_counts,
        vocab_order.tokens,
        template_counts,
        vocab_order.templates,
        g,
        seen_lines,
        total_token_mass,
        total_template_mass,
        truncated_lines,
        truncated_tokens,
        renormalizations,
    );

    Ok((config, model))
}

/// Loads a snapshot file from disk.
pub fn load(path: &Path) -> Result<(Config, InfoModel), SnapshotError> {
    let contents = std::fs::read_to_string(path)?;
    deserialize(&contents)
}

/// A snapshot's scalar header, for the `snapshot-info` CLI collaborator —
/// read-only, no model reconstruction.
pub struct SnapshotHeader {
    pub version: u64,
    pub seen_lines: u64,
    pub token_vocab_size: usize,
    pub template_vocab_size: usize,
    pub renormalizations: u64,
}

pub fn load_header(path: &Path) -> Result<SnapshotHeader, SnapshotError> {
    let contents = std::fs::read_to_string(path)?;
    let doc: Value = serde_json::from_str(&contents)
        .map_err(|e| SnapshotError::Format(format!("invalid json: {e}")))?;
    let version = doc
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| SnapshotError::Format("missing field `version`".to_string()))?;
    let token_vocab_size = doc
        .get("token_counts")
        .and_then(Value::as_object)
        .map(|m| m.len())
        .unwrap_or(0);
    let template_vocab_size = doc
        .get("template_counts")
        .and_then(Value::as_object)
        .map(|m| m.len())
        .unwrap_or(0);
    Ok(SnapshotHeader {
        version,
        seen_lines: doc.get("seen_lines").and_then(Value::as_u64).unwrap_or(0),
        token_vocab_size,
        template_vocab_size,
        renormalizations: doc
            .get("renormalizations")
            .and_then(Value::as_u64)
            .unwrap_or(0),
    })
}

fn read_count_map(doc: &Value, field: &str) -> Result<HashMap<String, f64>, SnapshotError> {
    let obj = doc
        .get(field)
        .ok_or_else(|| SnapshotError::Format(format!("missing field `{field}`")))?
        .as_object()
        .ok_or_else(|| SnapshotError::Format(format!("`{field}` must be an object")))?;
    let mut out = HashMap::with_capacity(obj.len());
    for (key, value) in obj {
        let count = value
            .as_f64()
            .ok_or_else(|| SnapshotError::Format(format!("`{field}.{key}` must be a number")))?;
        out.insert(key.clone(), count);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let config = Config::default();
        let mut model = InfoModel::new(&config);
        for i in 0..50 {
            model.observe("t", &[format!("tok{}", i % 5)]);
        }
        let json = serialize(&config, &model);
        let (loaded_config, loaded_model) = deserialize(&json).unwrap();
        assert_eq!(loaded_config, config);
        assert_eq!(loaded_model.seen_lines, model.seen_lines);
        assert!((loaded_model.g - model.g).abs() < 1e-12);
        assert_eq!(loaded_model.token_vocab_size(), model.token_vocab_size());
        for i in 0..5 {
            let key = format!("tok{i}");
            assert!(
                (loaded_model.token_effective_count(&key) - model.token_effective_count(&key))
                    .abs()
                    < 1e-9
            );
        }
    }

    #[test]
    fn loads_v2_without_g_or_guardrail_counters() {
        let config = Config::default();
        let json = serde_json::json!({
            "version": 2,
            "config": config,
            "token_counts": {"hello": 3.0, "world": 1.0},
            "template_counts": {"hello world": 1.0},
            "seen_lines": 1,
        })
        .to_string();
        let (_, model) = deserialize(&json).unwrap();
        assert_eq!(model.g, 1.0);
        assert_eq!(model.truncated_lines, 0);
        assert_eq!(model.token_effective_count("hello"), 3.0);
    }

    #[test]
    fn rejects_unknown_future_version() {
        let config = Config::default();
        let json = serde_json::json!({
            "version": CURRENT_VERSION + 1,
            "config": config,
            "token_counts": {},
            "template_counts": {},
        })
        .to_string();
        assert!(matches!(deserialize(&json), Err(SnapshotError::Format(_))));
    }

    #[test]
    fn rejects_non_positive_g() {
        let config = Config::default();
        let json = serde_json::json!({
            "version": 3,
            "config": config,
            "token_counts": {},
            "template_counts": {},
            "g": -1.0,
        })
        .to_string();
        assert!(matches!(deserialize(&json), Err(SnapshotError::Incompatible(_))));
    }

    #[test]
    fn missing_required_field_is_named_in_error() {
        let json = serde_json::json!({"version": 3}).to_string();
        match deserialize(&json) {
            Err(SnapshotError::Format(msg)) => assert!(msg.contains("config")),
            other => panic!("expected Format error, got {other:?}"),
        }
    }
}
