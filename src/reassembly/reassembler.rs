use crate::error::{RelayError, RelayResult};
use crate::forward::Forwarder;
use crate::store::{FragmentRecord, FragmentStore, PartIndex};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Result of a successful submission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// This call delivered the assembled message and committed the flag.
    Complete,
    /// Still waiting for the other part.
    Pending,
    /// Both parts are present and another submitter holds the delivery claim.
    Delivering,
    /// The message was delivered earlier; nothing was sent.
    AlreadyForwarded,
}

pub struct Reassembler {
    store: Arc<dyn FragmentStore>,
    forwarder: Arc<dyn Forwarder>,
    claim_lease: Duration,
}

impl Reassembler {
    pub fn new(
        store: Arc<dyn FragmentStore>,
        forwarder: Arc<dyn Forwarder>,
        claim_lease: Duration,
    ) -> Self {
        Self {
            store,
            forwarder,
            claim_lease,
        }
    }

    pub fn store(&self) -> &Arc<dyn FragmentStore> {
        &self.store
    }

    /// Merges one fragment and, if that completes the message, delivers it.
    pub async fn submit(&self, id: &str, part_number: i64, payload: &str) -> RelayResult<Outcome> {
        let part = match validate(id, part_number) {
            Ok(part) => part,
            Err(e) => {
                tracing::warn!(
                    "Rejecting fragment msg_id={:?} part_number={}: {}",
                    id,
                    part_number,
                    e
                );
                return Err(e);
            }
        };

        tracing::info!(
            "Processing message for msg_id={} with part_number={}",
            id,
            part_number
        );

        let record = self
            .store
            .merge_part(id, part, payload)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    "Failed to merge part {} of msg_id={}: {}",
                    part_number,
                    id,
                    e
                );
            })?;

        if record.forwarded {
            tracing::info!("msg_id={} already forwarded, ignoring part {}", id, part_number);
            return Ok(Outcome::AlreadyForwarded);
        }
        if !record.is_complete() {
            return Ok(Outcome::Pending);
        }

        tracing::info!("Have both parts for msg_id={}", id);
        self.resume(&record).await.inspect_err(|e| {
            tracing::error!(
                "Completion of msg_id={} (triggered by part {}) failed: {}",
                id,
                part_number,
                e
            );
        })
    }

    /// Delivers a record that already holds both parts.
    ///
    /// Shared by `submit` and the reconciliation sweep. The delivery claim makes the
    /// "who delivers" decision a compare-and-set in the store, so concurrent callers for the
    /// same identifier send at most one request while the claim is live. The claim is renewed
    /// for as long as the delivery runs.
    pub async fn resume(&self, record: &FragmentRecord) -> RelayResult<Outcome> {
        let id = record.id.as_str();
        let Some(payload) = record.assembled() else {
            return Ok(Outcome::Pending);
        };

        let token = uuid::Uuid::new_v4().to_string();
        if !self
            .store
            .try_claim_delivery(id, &token, self.claim_lease)
            .await?
        {
            // Lost the race, or the winner already committed. Re-read to tell which.
            return match self.store.get(id).await? {
                Some(current) if current.forwarded => Ok(Outcome::AlreadyForwarded),
                _ => {
                    tracing::debug!("msg_id={} is being delivered by another submitter", id);
                    Ok(Outcome::Delivering)
                }
            };
        }

        tracing::debug!("Assembled message for msg_id={}: {}", id, payload);

        let renewal = self.spawn_claim_renewal(id, &token);
        let delivered = self.forwarder.deliver(id, &payload).await;
        drop(renewal);

        if let Err(e) = delivered {
            let rejected = matches!(e, RelayError::RejectedByDownstream { .. });
            if let Err(release_err) = self.store.release_claim(id, &token, rejected).await {
                // The lease still expires on its own.
                tracing::warn!(
                    "Failed to release delivery claim for msg_id={}: {}",
                    id,
                    release_err
                );
            }
            return Err(e);
        }

        match self.store.mark_forwarded(id).await {
            Ok(true) => Ok(Outcome::Complete),
            Ok(false) => {
                tracing::warn!(
                    "msg_id={} was already marked forwarded when committing delivery",
                    id
                );
                Ok(Outcome::Complete)
            }
            Err(e) => {
                tracing::error!(
                    "Delivered msg_id={} but could not persist forwarded flag: {}",
                    id,
                    e
                );
                Err(e)
            }
        }
    }

    /// Keeps the delivery claim alive while `deliver` runs.
    ///
    /// Re-claiming with the same token extends the lease. The loop stops once the claim is
    /// gone (committed, or taken over after an expiry), and the returned guard aborts it when
    /// the delivery finishes or the caller is cancelled.
    fn spawn_claim_renewal(&self, id: &str, token: &str) -> ClaimRenewal {
        let store = self.store.clone();
        let id = id.to_string();
        let token = token.to_string();
        let lease = self.claim_lease;
        let period = (lease / 3).max(Duration::from_millis(1));

        ClaimRenewal(tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;

                match store.try_claim_delivery(&id, &token, lease).await {
                    Ok(true) => {
                        tracing::trace!("Renewed delivery claim for msg_id={}", id);
                    }
                    Ok(false) => {
                        tracing::warn!("Lost delivery claim for msg_id={} while delivering", id);
                        break;
                    }
                    Err(e) => {
                        // Try again next period; the current lease is still running.
                        tracing::warn!("Failed to renew delivery claim for msg_id={}: {}", id, e);
                    }
                }
            }
        }))
    }
}

struct ClaimRenewal(tokio::task::JoinHandle<()>);

impl Drop for ClaimRenewal {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn validate(id: &str, part_number: i64) -> RelayResult<PartIndex> {
    if id.is_empty() {
        return Err(RelayError::InvalidFragment("missing message id".to_string()));
    }
    PartIndex::from_number(part_number)
}
