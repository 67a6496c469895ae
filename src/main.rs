//! # Corpus QA CLI (`cqa`)
//!
//! The `cqa` binary runs the question-answering service and its crawl
//! pipeline.
//!
//! ## Usage
//!
//! ```bash
//! cqa --config ./config/cqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cqa serve` | Start the HTTP API and the ingestion scheduler |
//! | `cqa ingest` | Run one ingestion pass and print the counters |
//! | `cqa ask "<question>"` | Answer one question |
//! | `cqa cache stats` | Show answer cache statistics |
//! | `cqa cache clear` | Drop every cached answer |
//!
//! ## Examples
//!
//! ```bash
//! # Serve without crawling at startup
//! cqa serve --skip-initial-ingest
//!
//! # Crawl once with JSON progress on stderr
//! cqa ingest --progress json
//!
//! # Ask using web retrieval instead of the indexed corpus
//! cqa ask "What is the VAT rate on books?" --web
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use corpus_qa::app::{App, Components};
use corpus_qa::config;
use corpus_qa::progress::ProgressMode;
use corpus_qa::scheduler::Scheduler;
use corpus_qa::server;

/// Corpus QA: cache-aside question answering over a crawled corpus.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/cqa.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "cqa", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cqa.toml")]
    config: PathBuf,

    /// Log output format. Filtering follows `RUST_LOG` (default `info`).
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API and the ingestion scheduler.
    ///
    /// Runs until Ctrl-C. An ingestion run in progress at shutdown stops
    /// before its next URL.
    Serve {
        /// Do not crawl at startup, regardless of `[schedule].run_on_startup`.
        #[arg(long)]
        skip_initial_ingest: bool,
    },

    /// Run one ingestion pass over the crawl root.
    Ingest {
        /// Progress on stderr: off, human, or json. Default: human when
        /// stderr is a terminal.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Answer one question and print it.
    Ask {
        question: String,

        /// Use the generation model's own web retrieval.
        #[arg(long)]
        web: bool,
    },

    /// Inspect or clear the answer cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show hit/miss counters and current size.
    Stats,
    /// Remove every cached answer.
    Clear,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

/// Resolve once `signal` reports Ctrl-C. If the listener could not be
/// installed, log it and never resolve.
async fn wait_for_ctrl_c(signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => tracing::info!("ctrl-c received"),
        Err(e) => {
            tracing::error!(error = %e, "cannot listen for ctrl-c; signal shutdown disabled");
            std::future::pending::<()>().await;
        }
    }
}

/// Trigger `app.shutdown()` on Ctrl-C.
fn shutdown_on_ctrl_c(app: Arc<App>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_ctrl_c(tokio::signal::ctrl_c()).await;
        app.shutdown();
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve {
            skip_initial_ingest,
        } => {
            if skip_initial_ingest {
                cfg.schedule.run_on_startup = false;
            }
            let schedule = cfg.schedule.clone();
            let app = Arc::new(App::init(cfg).await?);

            let scheduler = Scheduler::from_config(app.ingestor(), &schedule)
                .spawn(app.shutdown_signal());

            let signal_app = app.clone();
            let shutdown = async move {
                wait_for_ctrl_c(tokio::signal::ctrl_c()).await;
                signal_app.shutdown();
            };
            let served = server::run_server(app.clone(), shutdown).await;

            app.shutdown();
            if let Err(e) = scheduler.await {
                tracing::error!(error = %e, "scheduler task failed");
            }
            served?;
        }
        Commands::Ingest { progress } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            let mut components = Components::from_config(&cfg).await?;
            components.progress = mode.reporter();
            let app = Arc::new(App::assemble(cfg, components).await?);

            let signal = shutdown_on_ctrl_c(app.clone());
            let report = app.run_ingestion().await.context("ingestion failed")?;
            signal.abort();

            println!("ingest");
            println!("  links discovered: {}", report.discovered);
            println!("  processed: {}", report.processed);
            println!("  skipped (fresh): {}", report.skipped);
            println!("  empty: {}", report.empty);
            println!("  errored: {}", report.errored);
            if report.aborted {
                println!("aborted");
            } else {
                println!("ok");
            }
        }
        Commands::Ask { question, web } => {
            let app = App::init(cfg).await?;
            let answer = if web {
                app.answer_question_from_web(&question).await
            } else {
                app.answer_question(&question).await
            }?;

            println!("{}", answer.answer);
            println!();
            println!("source: {}", answer.source);
            if answer.served_from_cache {
                println!("(cached)");
            }
        }
        Commands::Cache { action } => {
            let app = App::init(cfg).await?;
            match action {
                CacheAction::Stats => {
                    let stats = app.cache_stats().await;
                    println!("cache");
                    println!("  size: {}", stats.size);
                    println!("  hits (this process): {}", stats.hits);
                    println!("  misses (this process): {}", stats.misses);
                }
                CacheAction::Clear => {
                    let removed = app.clear_cache().await;
                    println!("cache cleared: {} entries removed", removed);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn ctrl_c_resolves_shutdown() {
        let received = async { Ok::<(), std::io::Error>(()) };
        let waited =
            tokio::time::timeout(Duration::from_millis(100), wait_for_ctrl_c(received)).await;
        assert!(waited.is_ok());
    }

    #[tokio::test]
    async fn failed_listener_never_resolves() {
        let failing = async { Err::<(), _>(std::io::Error::other("no signal handler")) };
        let waited =
            tokio::time::timeout(Duration::from_millis(100), wait_for_ctrl_c(failing)).await;
        assert!(waited.is_err());
    }
}
