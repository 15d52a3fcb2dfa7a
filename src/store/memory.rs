use super::FragmentStore;
use super::types::{DeliveryClaim, FragmentRecord, PartIndex, now_ms};
use crate::error::RelayResult;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;

/// In-process fragment store.
///
/// Each key lives in one `DashMap` shard; the entry API holds that shard's write lock for
/// the whole read-modify-write, which is what makes `merge_part` and `try_claim_delivery`
/// atomic per identifier.
#[derive(Clone, Default)]
pub struct MemoryFragmentStore {
    records: Arc<DashMap<String, FragmentRecord>>,
}

impl MemoryFragmentStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
        }
    }

    pub fn get_local(&self, id: &str) -> Option<FragmentRecord> {
        self.records.get(id).map(|record| record.value().clone())
    }

    pub fn merge_local(&self, id: &str, part: PartIndex, payload: &str) -> FragmentRecord {
        let now = now_ms();
        let mut record = self
            .records
            .entry(id.to_string())
            .or_insert_with(|| FragmentRecord::new(id, now));

        if !record.fill(part, payload, now) {
            tracing::debug!(
                "Part {} of msg_id={} already present, keeping stored payload",
                part.as_number(),
                id
            );
        }
        record.value().clone()
    }

    pub fn claim_local(&self, id: &str, token: &str, lease: Duration) -> bool {
        let now = now_ms();
        let Some(mut record) = self.records.get_mut(id) else {
            return false;
        };

        if !record.is_complete() || record.forwarded {
            return false;
        }
        if let Some(claim) = &record.claim
            && claim.is_live(now)
            && claim.token != token
        {
            return false;
        }

        record.claim = Some(DeliveryClaim {
            token: token.to_string(),
            expires_at_ms: now
                .saturating_add(u64::try_from(lease.as_millis()).unwrap_or(u64::MAX)),
        });
        record.updated_at_ms = now;
        tracing::debug!("Claimed delivery of msg_id={}", id);
        true
    }

    pub fn release_local(&self, id: &str, token: &str, rejected: bool) {
        if let Some(mut record) = self.records.get_mut(id) {
            if !record.claim.as_ref().is_some_and(|claim| claim.token == token) {
                tracing::debug!("Ignoring release of msg_id={} by a stale claim holder", id);
                return;
            }
            record.claim = None;
            if rejected {
                record.rejected = true;
            }
            record.updated_at_ms = now_ms();
        }
    }

    pub fn mark_forwarded_local(&self, id: &str) -> bool {
        match self.records.entry(id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.forwarded {
                    return false;
                }
                record.forwarded = true;
                record.rejected = false;
                record.claim = None;
                record.updated_at_ms = now_ms();
                true
            }
            Entry::Vacant(_) => {
                tracing::warn!("mark_forwarded for unknown msg_id={}", id);
                false
            }
        }
    }

    pub fn stalled_local(&self, limit: usize) -> Vec<FragmentRecord> {
        let now = now_ms();
        self.records
            .iter()
            .filter(|entry| entry.value().is_stalled(now))
            .take(limit)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn local_record_count(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl FragmentStore for MemoryFragmentStore {
    async fn get(&self, id: &str) -> RelayResult<Option<FragmentRecord>> {
        Ok(self.get_local(id))
    }

    async fn merge_part(
        &self,
        id: &str,
        part: PartIndex,
        payload: &str,
    ) -> RelayResult<FragmentRecord> {
        Ok(self.merge_local(id, part, payload))
    }

    async fn try_claim_delivery(
        &self,
        id: &str,
        token: &str,
        lease: Duration,
    ) -> RelayResult<bool> {
        Ok(self.claim_local(id, token, lease))
    }

    async fn release_claim(&self, id: &str, token: &str, rejected: bool) -> RelayResult<()> {
        self.release_local(id, token, rejected);
        Ok(())
    }

    async fn mark_forwarded(&self, id: &str) -> RelayResult<bool> {
        Ok(self.mark_forwarded_local(id))
    }

    async fn stalled_completions(&self, limit: usize) -> RelayResult<Vec<FragmentRecord>> {
        Ok(self.stalled_local(limit))
    }

    async fn count(&self) -> RelayResult<usize> {
        Ok(self.local_record_count())
    }
}
