//! Reconciliation Sweep
//!
//! Periodically looks for records whose both parts arrived but which were never committed
//! as forwarded: a relay crashed mid-delivery, the flag write failed, or delivery ran out of
//! transport retries and nobody resubmitted. Records downstream rejected are skipped; those
//! need a manual resubmission.

use super::reassembler::{Outcome, Reassembler};

use std::sync::Arc;
use std::time::Duration;

pub struct Reconciler {
    reassembler: Arc<Reassembler>,
    interval: Duration,
    batch_size: usize,
}

impl Reconciler {
    pub fn new(reassembler: Arc<Reassembler>, interval: Duration, batch_size: usize) -> Arc<Self> {
        Arc::new(Self {
            reassembler,
            interval,
            batch_size,
        })
    }

    /// Spawns the sweep loop and returns immediately.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tracing::info!(
            "Starting reconciliation sweep every {:?} (batch {})",
            self.interval,
            self.batch_size
        );
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.sweep_once().await;
            }
        })
    }

    /// Runs one pass. Returns how many records were delivered by this pass.
    pub async fn sweep_once(&self) -> usize {
        let stalled = match self
            .reassembler
            .store()
            .stalled_completions(self.batch_size)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Reconciliation: failed to list stalled records: {}", e);
                return 0;
            }
        };

        if stalled.is_empty() {
            return 0;
        }
        tracing::info!("Reconciliation: {} stalled completion(s)", stalled.len());

        let mut delivered = 0;
        for record in stalled {
            match self.reassembler.resume(&record).await {
                Ok(Outcome::Complete) => {
                    tracing::info!("Reconciliation delivered msg_id={}", record.id);
                    delivered += 1;
                }
                Ok(outcome) => {
                    tracing::debug!("Reconciliation skipped msg_id={}: {:?}", record.id, outcome);
                }
                Err(e) => {
                    tracing::warn!("Reconciliation of msg_id={} failed: {}", record.id, e);
                }
            }
        }
        delivered
    }
}
