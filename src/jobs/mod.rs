//! Periodic registry maintenance jobs
//!
//! Each job runs in its own task on a fixed interval. A pass is awaited
//! before the next tick is taken, so passes of the same job never overlap.

pub mod location;
pub mod status;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::flow::types::TxOutcome;

/// What one pass of a job did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassSummary {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Hotspots read from the registry
    pub scanned: usize,
    /// Hotspots that needed a write
    pub selected: usize,
    pub sealed: usize,
    /// Writes skipped because every admin key was busy
    pub skipped: usize,
    pub failed: usize,
}

impl PassSummary {
    pub fn started(scanned: usize, selected: usize) -> Self {
        Self {
            started_at: Some(Utc::now()),
            scanned,
            selected,
            ..Self::default()
        }
    }

    pub fn record(&mut self, result: &anyhow::Result<TxOutcome>) {
        match result {
            Ok(TxOutcome::Sealed { .. }) => self.sealed += 1,
            Ok(TxOutcome::Skipped) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }
}

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run_pass(&self) -> anyhow::Result<PassSummary>;
}

/// Last pass of a job, shared with the status endpoint
pub type LastPass = Arc<RwLock<Option<PassSummary>>>;

/// Run `job` now and then every `interval` until `shutdown` fires
///
/// A failed pass is logged and the loop carries on with the next tick.
pub async fn run_periodic(
    job: Arc<dyn Job>,
    interval: Duration,
    last_pass: LastPass,
    shutdown: triggered::Listener,
) -> anyhow::Result<()> {
    info!("{} job scheduled every {:?}", job.name(), interval);

    let mut timer = time::interval(interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.clone() => break,
            _ = timer.tick() => {
                let span = tracing::info_span!("pass", job = job.name(), run = %Uuid::new_v4());
                match job.run_pass().instrument(span).await {
                    Ok(summary) => {
                        info!(
                            "{} pass done: {} scanned, {} selected, {} sealed, {} skipped, {} failed",
                            job.name(),
                            summary.scanned,
                            summary.selected,
                            summary.sealed,
                            summary.skipped,
                            summary.failed
                        );
                        *last_pass.write().await = Some(summary);
                    }
                    Err(e) => error!("{} pass failed: {:#}", job.name(), e),
                }
            }
        }
    }

    info!("Stopping {} job", job.name());
    Ok(())
}
