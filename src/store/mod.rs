//! Fragment Storage Module
//!
//! Shared, concurrently-accessed storage for fragment records.
//!
//! ## Core Concepts
//! - **Atomic merge**: `merge_part` is a single read-modify-write per key. Two fragments for
//!   the same identifier arriving on different tasks (or different processes) never lose
//!   each other.
//! - **Delivery claim**: `try_claim_delivery` is a compare-and-set on the record. Exactly one
//!   submitter wins the right to forward a completed message; the claim is a lease so a
//!   crashed holder does not block delivery forever.
//! - **Backends**: `MemoryFragmentStore` keeps records in a `DashMap` inside this process.
//!   `RemoteFragmentStore` talks to a store node over HTTP so several relay instances share
//!   one store.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::RelayResult;

pub mod handlers;
pub mod memory;
pub mod protocol;
pub mod remote;
pub mod types;

pub use memory::MemoryFragmentStore;
pub use remote::RemoteFragmentStore;
pub use types::{DeliveryClaim, FragmentRecord, PartIndex};

/// Storage contract the reassembler relies on.
///
/// Every method that decides something about completion is atomic per key in the
/// implementation. Callers never read a record and then write it back.
#[async_trait]
pub trait FragmentStore: Send + Sync {
    async fn get(&self, id: &str) -> RelayResult<Option<FragmentRecord>>;

    /// Sets `first` or `second` for `id` (creating the record if absent) and returns
    /// the post-merge record. A part that is already filled is left untouched.
    async fn merge_part(
        &self,
        id: &str,
        part: PartIndex,
        payload: &str,
    ) -> RelayResult<FragmentRecord>;

    /// Takes the delivery lease for `id` if the record is complete, not forwarded, and not
    /// held by a live claim with a different token. Retrying with the same token succeeds.
    async fn try_claim_delivery(&self, id: &str, token: &str, lease: Duration)
    -> RelayResult<bool>;

    /// Drops the claim held by `token`, recording whether downstream rejected the message.
    async fn release_claim(&self, id: &str, token: &str, rejected: bool) -> RelayResult<()>;

    /// Persists `forwarded = true`. Returns `true` if this call made the transition.
    async fn mark_forwarded(&self, id: &str) -> RelayResult<bool>;

    /// Records that are complete but neither forwarded, rejected, nor being delivered.
    async fn stalled_completions(&self, limit: usize) -> RelayResult<Vec<FragmentRecord>>;

    async fn count(&self) -> RelayResult<usize>;
}
