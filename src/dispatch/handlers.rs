use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};
use std::sync::Arc;

use super::protocol::{FragmentRequest, SubmitResponse};
use crate::error::RelayError;
use crate::reassembly::Reassembler;

/// Single inbound endpoint: `POST /` submits a fragment, `GET /` reports the record count.
pub fn dispatch_router(reassembler: Arc<Reassembler>) -> Router {
    Router::new()
        .route("/", get(handle_stats).post(handle_fragment))
        .layer(Extension(reassembler))
}

pub async fn handle_fragment(
    Extension(reassembler): Extension<Arc<Reassembler>>,
    body: Result<Json<FragmentRequest>, JsonRejection>,
) -> (StatusCode, Json<SubmitResponse>) {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::warn!("Unreadable fragment request: {}", rejection);
            return failure(RelayError::InvalidFragment(rejection.body_text()));
        }
    };

    let (Some(id), Some(part_number), Some(data)) = (req.id, req.part_index, req.data) else {
        tracing::warn!("Fragment request is missing id, partIndex or data");
        return failure(RelayError::InvalidFragment(
            "id, partIndex and data are required".to_string(),
        ));
    };

    // The submission runs on its own task so a client disconnect drops only the response,
    // never a store write in flight.
    let task = tokio::spawn(async move { reassembler.submit(&id, part_number, &data).await });

    match task.await {
        Ok(Ok(outcome)) => (
            StatusCode::OK,
            Json(SubmitResponse {
                success: true,
                outcome: Some(outcome),
                error: None,
            }),
        ),
        Ok(Err(e)) => failure(e),
        Err(join_err) => {
            tracing::error!("Fragment submission task failed: {}", join_err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SubmitResponse {
                    success: false,
                    outcome: None,
                    error: Some("internal error".to_string()),
                }),
            )
        }
    }
}

pub async fn handle_stats(
    Extension(reassembler): Extension<Arc<Reassembler>>,
) -> (StatusCode, String) {
    match reassembler.store().count().await {
        Ok(count) => (
            StatusCode::OK,
            format!("There are {} messages in the store", count),
        ),
        Err(e) => {
            tracing::error!("Failed to count records: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

/// Maps an error onto the status code the sender acts on.
pub fn status_for(error: &RelayError) -> StatusCode {
    match error {
        RelayError::InvalidFragment(_) => StatusCode::BAD_REQUEST,
        RelayError::RejectedByDownstream { .. } => StatusCode::BAD_GATEWAY,
        RelayError::StoreUnavailable(_) | RelayError::ForwardTransportError(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

fn failure(error: RelayError) -> (StatusCode, Json<SubmitResponse>) {
    (
        status_for(&error),
        Json(SubmitResponse {
            success: false,
            outcome: None,
            error: Some(error.to_string()),
        }),
    )
}
