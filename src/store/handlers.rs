use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;

use super::memory::MemoryFragmentStore;
use super::protocol::*;

/// Routes a store node exposes to relay instances.
///
/// The node always serves its own in-process `MemoryFragmentStore`; relays reach it through
/// `RemoteFragmentStore`.
pub fn store_router(store: Arc<MemoryFragmentStore>) -> Router {
    Router::new()
        .route(&format!("{}/:id", ENDPOINT_RECORD), get(handle_get_record))
        .route(ENDPOINT_MERGE, post(handle_merge))
        .route(ENDPOINT_CLAIM, post(handle_claim))
        .route(ENDPOINT_RELEASE, post(handle_release))
        .route(ENDPOINT_FORWARDED, post(handle_forwarded))
        .route(ENDPOINT_STALLED, get(handle_stalled))
        .route(ENDPOINT_COUNT, get(handle_count))
        .layer(Extension(store))
}

pub async fn handle_get_record(
    Extension(store): Extension<Arc<MemoryFragmentStore>>,
    Path(id): Path<String>,
) -> (StatusCode, Json<RecordResponse>) {
    match store.get_local(&id) {
        Some(record) => (
            StatusCode::OK,
            Json(RecordResponse {
                record: Some(record),
            }),
        ),
        None => (StatusCode::NOT_FOUND, Json(RecordResponse { record: None })),
    }
}

pub async fn handle_merge(
    Extension(store): Extension<Arc<MemoryFragmentStore>>,
    Json(req): Json<MergeRequest>,
) -> (StatusCode, Json<RecordResponse>) {
    if req.id.is_empty() {
        tracing::error!("Rejecting merge with empty msg_id");
        return (
            StatusCode::BAD_REQUEST,
            Json(RecordResponse { record: None }),
        );
    }

    let record = store.merge_local(&req.id, req.part, &req.payload);
    tracing::debug!(
        "Merged part {} for msg_id={}",
        req.part.as_number(),
        req.id
    );
    (
        StatusCode::OK,
        Json(RecordResponse {
            record: Some(record),
        }),
    )
}

pub async fn handle_claim(
    Extension(store): Extension<Arc<MemoryFragmentStore>>,
    Json(req): Json<ClaimRequest>,
) -> (StatusCode, Json<FlagResponse>) {
    let success = store.claim_local(&req.id, &req.token, Duration::from_millis(req.lease_ms));
    (StatusCode::OK, Json(FlagResponse { success }))
}

pub async fn handle_release(
    Extension(store): Extension<Arc<MemoryFragmentStore>>,
    Json(req): Json<ReleaseRequest>,
) -> (StatusCode, Json<FlagResponse>) {
    store.release_local(&req.id, &req.token, req.rejected);
    (StatusCode::OK, Json(FlagResponse { success: true }))
}

pub async fn handle_forwarded(
    Extension(store): Extension<Arc<MemoryFragmentStore>>,
    Json(req): Json<ForwardedRequest>,
) -> (StatusCode, Json<FlagResponse>) {
    let success = store.mark_forwarded_local(&req.id);
    if success {
        tracing::info!("msg_id={} marked as forwarded", req.id);
    }
    (StatusCode::OK, Json(FlagResponse { success }))
}

pub async fn handle_stalled(
    Extension(store): Extension<Arc<MemoryFragmentStore>>,
    Query(query): Query<StalledQuery>,
) -> (StatusCode, Json<StalledResponse>) {
    let records = store.stalled_local(query.limit.unwrap_or(100));
    (StatusCode::OK, Json(StalledResponse { records }))
}

pub async fn handle_count(
    Extension(store): Extension<Arc<MemoryFragmentStore>>,
) -> (StatusCode, Json<CountResponse>) {
    (
        StatusCode::OK,
        Json(CountResponse {
            count: store.local_record_count(),
        }),
    )
}
