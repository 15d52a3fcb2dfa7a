use super::FragmentStore;
use super::protocol::*;
use super::types::{FragmentRecord, PartIndex};
use crate::error::{RelayError, RelayResult};

use async_trait::async_trait;
use std::time::Duration;

/// Client for a fragment store hosted by another process.
///
/// All atomicity lives on the store node; this side only moves requests and retries
/// transport failures and 5xx answers with exponential backoff.
pub struct RemoteFragmentStore {
    base_url: String,
    http_client: reqwest::Client,
    timeout: Duration,
    attempts: usize,
}

impl RemoteFragmentStore {
    pub fn new(base_url: &str, timeout: Duration, attempts: usize) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
            timeout,
            attempts: attempts.max(1),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn record_url(&self, id: &str) -> RelayResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.url(ENDPOINT_RECORD))
            .map_err(|e| RelayError::StoreUnavailable(format!("bad store url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| RelayError::StoreUnavailable("store url cannot be a base".to_string()))?
            .push(id);
        Ok(url)
    }

    async fn send_with_retry<F>(&self, build: F) -> RelayResult<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut delay_ms = 150u64;
        let mut last_error = String::from("no attempt made");

        for attempt in 0..self.attempts {
            match build().timeout(self.timeout).send().await {
                Ok(resp) if resp.status().is_server_error() => {
                    last_error = format!("store node answered {}", resp.status());
                }
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            if attempt + 1 < self.attempts {
                tracing::warn!(
                    "Store request failed (attempt {}/{}): {}",
                    attempt + 1,
                    self.attempts,
                    last_error
                );
                let jitter = rand::random::<u64>() % 50;
                tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                delay_ms = (delay_ms * 2).min(1200);
            }
        }

        Err(RelayError::StoreUnavailable(last_error))
    }

    async fn post_json<T, R>(&self, path: &str, payload: &T) -> RelayResult<R>
    where
        T: serde::Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let url = self.url(path);
        let response = self
            .send_with_retry(|| self.http_client.post(url.clone()).json(payload))
            .await?;

        if !response.status().is_success() {
            return Err(RelayError::StoreUnavailable(format!(
                "{} failed: {}",
                path,
                response.status()
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| RelayError::StoreUnavailable(e.to_string()))
    }

    async fn get_json<R>(&self, url: String) -> RelayResult<R>
    where
        R: serde::de::DeserializeOwned,
    {
        let response = self
            .send_with_retry(|| self.http_client.get(url.clone()))
            .await?;

        if !response.status().is_success() {
            return Err(RelayError::StoreUnavailable(format!(
                "GET {} failed: {}",
                url,
                response.status()
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| RelayError::StoreUnavailable(e.to_string()))
    }
}

#[async_trait]
impl FragmentStore for RemoteFragmentStore {
    async fn get(&self, id: &str) -> RelayResult<Option<FragmentRecord>> {
        let url = self.record_url(id)?;
        let response = self
            .send_with_retry(|| self.http_client.get(url.clone()))
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RelayError::StoreUnavailable(format!(
                "GET record failed: {}",
                response.status()
            )));
        }

        let body: RecordResponse = response
            .json()
            .await
            .map_err(|e| RelayError::StoreUnavailable(e.to_string()))?;
        Ok(body.record)
    }

    async fn merge_part(
        &self,
        id: &str,
        part: PartIndex,
        payload: &str,
    ) -> RelayResult<FragmentRecord> {
        let request = MergeRequest {
            id: id.to_string(),
            part,
            payload: payload.to_string(),
        };
        let body: RecordResponse = self.post_json(ENDPOINT_MERGE, &request).await?;
        body.record.ok_or_else(|| {
            RelayError::StoreUnavailable(format!("store node returned no record for {}", id))
        })
    }

    async fn try_claim_delivery(
        &self,
        id: &str,
        token: &str,
        lease: Duration,
    ) -> RelayResult<bool> {
        let request = ClaimRequest {
            id: id.to_string(),
            token: token.to_string(),
            lease_ms: u64::try_from(lease.as_millis()).unwrap_or(u64::MAX),
        };
        let body: FlagResponse = self.post_json(ENDPOINT_CLAIM, &request).await?;
        Ok(body.success)
    }

    async fn release_claim(&self, id: &str, token: &str, rejected: bool) -> RelayResult<()> {
        let request = ReleaseRequest {
            id: id.to_string(),
            token: token.to_string(),
            rejected,
        };
        let _: FlagResponse = self.post_json(ENDPOINT_RELEASE, &request).await?;
        Ok(())
    }

    async fn mark_forwarded(&self, id: &str) -> RelayResult<bool> {
        let request = ForwardedRequest { id: id.to_string() };
        let body: FlagResponse = self.post_json(ENDPOINT_FORWARDED, &request).await?;
        Ok(body.success)
    }

    async fn stalled_completions(&self, limit: usize) -> RelayResult<Vec<FragmentRecord>> {
        let url = format!("{}?limit={}", self.url(ENDPOINT_STALLED), limit);
        let body: StalledResponse = self.get_json(url).await?;
        Ok(body.records)
    }

    async fn count(&self) -> RelayResult<usize> {
        let body: CountResponse = self.get_json(self.url(ENDPOINT_COUNT)).await?;
        Ok(body.count)
    }
}
