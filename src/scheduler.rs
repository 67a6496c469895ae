//! Periodic ingestion trigger.
//!
//! The scheduler only decides *when* a run starts: optionally once at
//! startup, then every `interval`. The job neither knows nor cares why it
//! was invoked. A tick that lands while a run is still going is skipped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use corpus_qa_core::models::IngestReport;

use crate::config::ScheduleConfig;
use crate::ingest::{wait_for_shutdown, IngestError, Ingestor};

/// Something that performs one ingestion run.
#[async_trait]
pub trait IngestJob: Send + Sync {
    async fn run_ingestion(
        &self,
        shutdown: watch::Receiver<bool>,
    ) -> Result<IngestReport, IngestError>;
}

#[async_trait]
impl IngestJob for Ingestor {
    async fn run_ingestion(
        &self,
        shutdown: watch::Receiver<bool>,
    ) -> Result<IngestReport, IngestError> {
        self.run(shutdown).await
    }
}

pub struct Scheduler {
    job: Arc<dyn IngestJob>,
    run_on_startup: bool,
    interval: Option<Duration>,
}

impl Scheduler {
    pub fn new(job: Arc<dyn IngestJob>, run_on_startup: bool, interval: Option<Duration>) -> Self {
        Self {
            job,
            run_on_startup,
            interval,
        }
    }

    pub fn from_config(job: Arc<dyn IngestJob>, config: &ScheduleConfig) -> Self {
        let interval = match config.interval_minutes {
            0 => None,
            minutes => Some(Duration::from_secs(minutes * 60)),
        };
        Self::new(job, config.run_on_startup, interval)
    }

    /// Run the schedule on a background task until `shutdown` flips to true.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if self.run_on_startup && !*shutdown.borrow() {
            tracing::info!("running initial ingestion on startup");
            self.fire(&shutdown).await;
        } else {
            tracing::info!("skipping initial ingestion on startup");
        }

        let Some(period) = self.interval else {
            tracing::info!("periodic ingestion disabled");
            return;
        };

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(every_secs = period.as_secs(), "periodic ingestion scheduled");

        loop {
            let due = tokio::select! {
                _ = ticker.tick() => true,
                _ = wait_for_shutdown(&mut shutdown) => false,
            };
            if !due {
                break;
            }
            self.fire(&shutdown).await;
        }
        tracing::info!("scheduler stopped");
    }

    async fn fire(&self, shutdown: &watch::Receiver<bool>) {
        match self.job.run_ingestion(shutdown.clone()).await {
            Ok(_) => {}
            Err(IngestError::AlreadyRunning) => {
                tracing::info!("ingestion already in progress; skipping scheduled run");
            }
            Err(e) => tracing::error!(error = ?e, "scheduled ingestion failed"),
        }
    }
}
