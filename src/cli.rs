//! CLI argument parsing via clap.

use clap::{Parser, Subcommand};

/// Watches a log stream and surfaces rare, high-signal lines in real time.
#[derive(Debug, Parser)]
#[command(name = "noctane", version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Raise the log filter from `warn` to `debug`.
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Score a stream of lines, emitting one JSON alert per line that
    /// clears the live threshold.
    Watch {
        /// Path to an engine config TOML file. Defaults omitted.
        #[arg(short = 'c', long = "config")]
        config: Option<String>,

        /// Read lines from this file instead of stdin.
        #[arg(short = 'f', long = "file")]
        file: Option<String>,

        /// Load model state from this snapshot before watching, if it
        /// exists, and save back to it on exit.
        #[arg(short = 's', long = "snapshot")]
        snapshot: Option<String>,

        /// Quantile(s) to track; the largest becomes the alert threshold.
        /// May be repeated.
        #[arg(short = 'q', long = "quantile", num_args = 1)]
        quantile: Vec<f64>,
    },
    /// Print a snapshot file's scalar header without reconstructing the
    /// model.
    SnapshotInfo {
        /// Path to the snapshot file.
        path: String,
    },
}
