//! Binary-local orchestration: the thin CLI collaborator described in
//! SPEC_FULL.md §10.5. Drives the core `Engine` over a line stream; file
//! tailing/rotation, terminal colorization, and an HTTP front end are out
//! of scope per spec.md §1 and are not implemented here.

use serde::Serialize;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use noctane::config::Config;
use noctane::engine::Engine;
use noctane::types::{Level, NeighborMatch, ScorePayload, TokenContribution};

use crate::cli::{Args, Command};

/// §6.3's alert-local shape for a token's contribution: `{token, bits,
/// prob, freq}`, distinct from the core `TokenContribution`'s
/// `{token, bits, probability, effective_count}` wire names (§4.4).
#[derive(Debug, Serialize)]
struct AlertTokenContribution {
    token: String,
    bits: f64,
    prob: f64,
    freq: f64,
}

impl From<TokenContribution> for AlertTokenContribution {
    fn from(c: TokenContribution) -> Self {
        Self {
            token: c.token,
            bits: c.bits,
            prob: c.probability,
            freq: c.effective_count,
        }
    }
}

/// §6.3: the core provides the `ScorePayload`; this collaborator attaches
/// the wall-clock timestamp, the threshold it read from the engine, and any
/// recalled neighbors.
#[derive(Debug, Serialize)]
struct AlertRecord {
    timestamp: String,
    level: Level,
    novelty: f64,
    score: f64,
    token_info_bits: f64,
    template_info_bits: f64,
    level_bonus: f64,
    template: String,
    template_probability: f64,
    tokens: Vec<String>,
    token_contributors: Vec<AlertTokenContribution>,
    line: String,
    threshold: f64,
    quantile: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantile_estimates: Option<std::collections::BTreeMap<String, f64>>,
    neighbors: Vec<NeighborMatch>,
}

fn build_alert(
    line: &str,
    payload: ScorePayload,
    quantile: f64,
    threshold: f64,
    quantile_estimates: Option<std::collections::BTreeMap<String, f64>>,
    neighbors: Vec<NeighborMatch>,
) -> AlertRecord {
    AlertRecord {
        timestamp: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string()),
        level: payload.level,
        novelty: payload.novelty,
        score: payload.raw_score,
        token_info_bits: payload.token_info_bits,
        template_info_bits: payload.template_info_bits,
        level_bonus: payload.level_bonus,
        template: payload.template,
        template_probability: payload.template_probability,
        tokens: payload.tokens,
        token_contributors: payload
            .token_contributors
            .into_iter()
            .map(AlertTokenContribution::from)
            .collect(),
        line: line.to_string(),
        threshold,
        quantile,
        quantile_estimates,
        neighbors,
    }
}

/// Parses CLI arguments, runs the requested subcommand, and returns the
/// process exit code.
pub async fn run(args: Args) -> i32 {
    let filter = if args.verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .try_init();

    tracing::info!(
        git_hash = noctane::build_info::GIT_HASH,
        built_at = noctane::build_info::BUILD_TIMESTAMP,
        "starting noctane"
    );

    match args.command {
        Command::Watch {
            config,
            file,
            snapshot,
            quantile,
        } => run_watch(config, file, snapshot, quantile).await,
        Command::SnapshotInfo { path } => run_snapshot_info(&path),
    }
}

async fn run_watch(
    config_path: Option<String>,
    file: Option<String>,
    snapshot_path: Option<String>,
    quantiles: Vec<f64>,
) -> i32 {
    let config = match load_config(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("noctane: {e}");
            return 78; // EX_CONFIG
        }
    };

    let snapshot_path = snapshot_path.map(PathBuf::from);
    let mut engine = match build_engine(&config, snapshot_path.as_deref()) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("noctane: {e}");
            return 74; // EX_IOERR
        }
    };

    let quantiles = if quantiles.is_empty() {
        vec![0.99]
    } else {
        quantiles
    };
    let mut sorted_quantiles = quantiles.clone();
    sorted_quantiles.sort_by(f64::total_cmp);
    for q in &sorted_quantiles {
        if let Err(e) = engine.register_quantile(*q) {
            eprintln!("noctane: {e}");
            return 78;
        }
    }
    let burn_in = config.burn_in;

    let exit_code = match file {
        Some(path) => match tokio::fs::File::open(&path).await {
            Ok(f) => process_stream(&mut engine, BufReader::new(f), burn_in).await,
            Err(e) => {
                eprintln!("noctane: opening {path}: {e}");
                return 74;
            }
        },
        None => {
            let stdin = tokio::io::stdin();
            process_stream(&mut engine, BufReader::new(stdin), burn_in).await
        }
    };

    if let Some(path) = snapshot_path {
        if let Err(e) = engine.snapshot_save(&path) {
            eprintln!("noctane: saving snapshot: {e}");
            return 74;
        }
    }

    exit_code
}

async fn process_stream<R: tokio::io::AsyncRead + Unpin>(
    engine: &mut Engine,
    reader: BufReader<R>,
    burn_in: u64,
) -> i32 {
    let neighbor_k = engine.config().neighbor_k;
    let mut lines = reader.lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let next = match lines.next_line().await {
            Ok(next) => next,
            Err(e) => {
                eprintln!("noctane: reading input: {e}");
                return 74;
            }
        };
        let Some(line) = next else { break };

        let payload = engine.score_and_observe(&line);
        if engine.past_burn_in(burn_in) {
            if let Some((q, threshold)) = engine.threshold() {
                if payload.novelty >= threshold {
                    let tokens = payload.tokens.clone();
                    let neighbors = engine.neighbors(&tokens, neighbor_k);
                    let estimates: std::collections::BTreeMap<String, f64> = engine
                        .quantile_estimates()
                        .into_iter()
                        .filter_map(|(q, est)| est.map(|v| (format!("{q}"), v)))
                        .collect();
                    let alert = build_alert(&line, payload, q, threshold, Some(estimates), neighbors);
                    if let Ok(json) = serde_json::to_string(&alert) {
                        let _ = stdout.write_all(json.as_bytes()).await;
                        let _ = stdout.write_all(b"\n").await;
                    }
                }
            }
        }
    }

    0
}

/// Resolves the config to load: an explicit `--config` path always wins;
/// otherwise falls back to `$XDG_CONFIG_HOME/noctane/config.toml` (or the
/// platform equivalent via `dirs`) if present, else built-in defaults.
fn load_config(path: Option<&str>) -> Result<Config, noctane::ConfigError> {
    if let Some(p) = path {
        return Config::from_file(Path::new(p));
    }
    match default_config_path() {
        Some(p) if p.exists() => Config::from_file(&p),
        _ => Ok(Config::default()),
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("noctane").join("config.toml"))
}

fn build_engine(config: &Config, snapshot_path: Option<&Path>) -> Result<Engine, noctane::EngineError> {
    match snapshot_path {
        Some(path) if path.exists() => Engine::snapshot_load(path),
        _ => Engine::new(config.clone()).map_err(noctane::EngineError::from),
    }
}

fn run_snapshot_info(path: &str) -> i32 {
    match noctane::snapshot::load_header(Path::new(path)) {
        Ok(header) => {
            println!("version: {}", header.version);
            println!("seen_lines: {}", header.seen_lines);
            println!("token_vocab_size: {}", header.token_vocab_size);
            println!("template_vocab_size: {}", header.template_vocab_size);
            println!("renormalizations: {}", header.renormalizations);
            0
        }
        Err(e) => {
            eprintln!("noctane: {e}");
            74
        }
    }
}
