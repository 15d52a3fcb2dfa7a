//! Store Node Protocol
//!
//! Endpoints and DTOs spoken between relay instances (`RemoteFragmentStore`) and the store
//! node that owns the records. Every call carries enough information to be retried safely:
//! merges are first-write-wins and claims are keyed by a caller-chosen token.

use super::types::{FragmentRecord, PartIndex};
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Point lookup of a record: `GET /store/records/:id`.
pub const ENDPOINT_RECORD: &str = "/store/records";
/// Atomic upsert-merge of one part.
pub const ENDPOINT_MERGE: &str = "/store/merge";
/// Compare-and-set of the delivery claim.
pub const ENDPOINT_CLAIM: &str = "/store/claim";
/// Drops a delivery claim.
pub const ENDPOINT_RELEASE: &str = "/store/release";
/// Persists the forwarded flag.
pub const ENDPOINT_FORWARDED: &str = "/store/forwarded";
/// Lists complete records nobody is delivering.
pub const ENDPOINT_STALLED: &str = "/store/stalled";
/// Number of tracked records.
pub const ENDPOINT_COUNT: &str = "/store/count";

// --- Data Transfer Objects ---

#[derive(Debug, Serialize, Deserialize)]
pub struct MergeRequest {
    pub id: String,
    pub part: PartIndex,
    pub payload: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub id: String,
    /// Caller-generated token; re-sending the same token is idempotent.
    pub token: String,
    pub lease_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub id: String,
    pub token: String,
    pub rejected: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ForwardedRequest {
    pub id: String,
}

/// Answer for the compare-and-set style endpoints (claim, forwarded).
#[derive(Debug, Serialize, Deserialize)]
pub struct FlagResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordResponse {
    /// `None` means the identifier has never been seen.
    pub record: Option<FragmentRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StalledQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StalledResponse {
    pub records: Vec<FragmentRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
}
