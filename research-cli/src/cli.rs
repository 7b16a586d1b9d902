//! ABOUTME: Command-line argument parsing for the research binary
//! ABOUTME: Mirrors the global-flags + positional-query shape of a thin composition root

use clap::{Parser, ValueEnum};

/// Trace level for logging output, same precedence rule as the upstream
/// CLI this one is descended from: `RUST_LOG` wins over `--trace` wins
/// over the `warn` default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TraceLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<TraceLevel> for tracing::Level {
    fn from(level: TraceLevel) -> Self {
        match level {
            TraceLevel::Off => tracing::Level::ERROR,
            TraceLevel::Error => tracing::Level::ERROR,
            TraceLevel::Warn => tracing::Level::WARN,
            TraceLevel::Info => tracing::Level::INFO,
            TraceLevel::Debug => tracing::Level::DEBUG,
            TraceLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Runs one deep-research request end to end and prints the resulting
/// report (or, with `--output json`, the full response envelope).
#[derive(Parser, Debug)]
#[command(name = "research")]
#[command(version)]
#[command(about = "Deep-research orchestrator CLI")]
#[command(
    long_about = "Runs a multi-wave web-search research pipeline for a single query and prints a citation-grounded report.

EXAMPLES:
    research \"what is the state of solid-state batteries?\"
    research --output json \"compare raft and paxos\" > report.json
    research --no-search --no-sandbox \"quick smoke test\""
)]
pub struct Cli {
    /// The research question to investigate.
    pub query: String,

    /// Trace level (overridden by RUST_LOG if set).
    #[arg(long, global = true, value_enum, default_value = "warn")]
    pub trace: TraceLevel,

    /// Output format for the final result.
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Skip wiring a web-search provider; falls back to the LLM's own
    /// knowledge for every search task.
    #[arg(long)]
    pub no_search: bool,

    /// Skip wiring a sandbox; chart planning still runs but no chart is
    /// ever executed.
    #[arg(long)]
    pub no_sandbox: bool,

    /// Directory for research-data checkpoints and report bundles.
    /// Overrides `RESEARCH_LOG_DIR`.
    #[arg(long)]
    pub log_dir: Option<String>,

    /// Drive the request through the SSE streaming manager, printing each
    /// event frame to stderr as it is emitted, in addition to the final
    /// report on stdout.
    #[arg(long)]
    pub stream: bool,
}
