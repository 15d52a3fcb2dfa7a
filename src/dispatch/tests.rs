//! Dispatcher Tests
//!
//! Drives the axum router over a real local socket with reqwest, the way a sender would.

#[cfg(test)]
mod tests {
    use crate::dispatch::handlers::{dispatch_router, status_for};
    use crate::dispatch::protocol::SubmitResponse;
    use crate::error::{RelayError, RelayResult};
    use crate::forward::Forwarder;
    use crate::reassembly::{Outcome, Reassembler};
    use crate::store::MemoryFragmentStore;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct CapturingForwarder {
        delivered: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Forwarder for CapturingForwarder {
        async fn deliver(&self, id: &str, payload: &str) -> RelayResult<()> {
            self.delivered
                .lock()
                .unwrap()
                .push((id.to_string(), payload.to_string()));
            Ok(())
        }
    }

    async fn spawn_relay() -> (String, Arc<CapturingForwarder>, Arc<MemoryFragmentStore>) {
        let store = Arc::new(MemoryFragmentStore::new());
        let forwarder = Arc::new(CapturingForwarder::default());
        let reassembler = Arc::new(Reassembler::new(
            store.clone(),
            forwarder.clone(),
            Duration::from_secs(30),
        ));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = dispatch_router(reassembler);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/", addr), forwarder, store)
    }

    async fn post(url: &str, body: serde_json::Value) -> (u16, SubmitResponse) {
        let response = reqwest::Client::new()
            .post(url)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_post_two_parts_forwards_once() {
        let (url, forwarder, _store) = spawn_relay().await;

        let (status, body) = post(&url, json!({"id": "m1", "partIndex": 0, "data": "AB"})).await;
        assert_eq!(status, 200);
        assert_eq!(body.outcome, Some(Outcome::Pending));

        let (status, body) = post(&url, json!({"id": "m1", "partIndex": 1, "data": "CD"})).await;
        assert_eq!(status, 200);
        assert!(body.success);
        assert_eq!(body.outcome, Some(Outcome::Complete));

        let (_, body) = post(&url, json!({"id": "m1", "partIndex": 1, "data": "CD"})).await;
        assert_eq!(body.outcome, Some(Outcome::AlreadyForwarded));

        assert_eq!(
            forwarder.delivered.lock().unwrap().clone(),
            vec![("m1".to_string(), "ABCD".to_string())]
        );
    }

    #[tokio::test]
    async fn test_legacy_field_names_are_accepted() {
        let (url, forwarder, _store) = spawn_relay().await;

        post(&url, json!({"Id": "m9", "PartNumber": 1, "Data": "world"})).await;
        let (status, body) = post(&url, json!({"Id": "m9", "PartNumber": 0, "Data": "hello "})).await;

        assert_eq!(status, 200);
        assert_eq!(body.outcome, Some(Outcome::Complete));
        assert_eq!(forwarder.delivered.lock().unwrap()[0].1, "hello world");
    }

    #[tokio::test]
    async fn test_invalid_part_index_is_bad_request() {
        let (url, forwarder, store) = spawn_relay().await;

        let (status, body) = post(&url, json!({"id": "m1", "partIndex": 2, "data": "AB"})).await;

        assert_eq!(status, 400);
        assert!(!body.success);
        assert!(body.error.unwrap().contains("part index"));
        assert!(store.get_local("m1").is_none());
        assert!(forwarder.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_fields_are_bad_request() {
        let (url, _forwarder, store) = spawn_relay().await;

        let (status, _) = post(&url, json!({"id": "m1", "partIndex": 0})).await;
        assert_eq!(status, 400);
        let (status, _) = post(&url, json!({"partIndex": 0, "data": "AB"})).await;
        assert_eq!(status, 400);

        assert_eq!(store.local_record_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (url, _forwarder, _store) = spawn_relay().await;

        let response = reqwest::Client::new()
            .post(&url)
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_get_reports_record_count() {
        let (url, _forwarder, _store) = spawn_relay().await;

        post(&url, json!({"id": "a", "partIndex": 0, "data": "x"})).await;
        post(&url, json!({"id": "b", "partIndex": 1, "data": "y"})).await;

        let text = reqwest::get(&url).await.unwrap().text().await.unwrap();
        assert_eq!(text, "There are 2 messages in the store");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&RelayError::InvalidFragment("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&RelayError::StoreUnavailable("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&RelayError::ForwardTransportError("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&RelayError::RejectedByDownstream {
                status: 422,
                body: String::new(),
            }),
            StatusCode::BAD_GATEWAY
        );
    }
}
