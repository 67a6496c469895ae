//! Ingestion progress reporting.
//!
//! Reports what a crawl run is doing so an operator watching `cqa ingest`
//! sees how much of the link set is left. Progress is emitted on
//! **stderr** so stdout stays parseable for scripts.

use std::io::Write;
use std::sync::Arc;

/// A single progress event for one crawl run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestProgressEvent {
    /// Loading the crawl root and collecting links. Total unknown.
    Discovering { root: String },
    /// About to handle URL `n` (1-based) of `total`.
    Crawling { n: u64, total: u64 },
}

/// Receives progress events from the ingestion pipeline.
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "ingest  crawling  1,234 / 5,000 pages".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Discovering { root } => {
                format!("ingest  discovering links in {}...\n", root)
            }
            IngestProgressEvent::Crawling { n, total } => format!(
                "ingest  crawling  {} / {} pages\n",
                format_number(*n),
                format_number(*total)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Discovering { root } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "root": root,
            }),
            IngestProgressEvent::Crawling { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "crawling",
                "n": n,
                "total": total,
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Arc<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Arc::new(NoProgress),
            ProgressMode::Human => Arc::new(StderrProgress),
            ProgressMode::Json => Arc::new(JsonProgress),
        }
    }
}
