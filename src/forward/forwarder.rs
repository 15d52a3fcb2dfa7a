use super::Forwarder;
use crate::error::{RelayError, RelayResult};

use async_trait::async_trait;
use std::time::Duration;

/// Header carrying the static downstream credential.
pub const TOKEN_HEADER: &str = "x-gameday-token";

/// Upper bound (exclusive) of the random delay added to each backoff sleep.
const JITTER_MS: u64 = 50;

/// Retry budget for one delivery.
#[derive(Debug, Clone)]
pub struct ForwardPolicy {
    pub attempts: usize,
    /// Per-attempt timeout.
    pub timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ForwardPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(150),
            max_backoff: Duration::from_millis(1200),
        }
    }
}

impl ForwardPolicy {
    /// Longest time one `deliver` call can take: every attempt running into its timeout,
    /// separated by the full backoff schedule with maximal jitter.
    pub fn worst_case_duration(&self) -> Duration {
        let attempts = self.attempts.max(1);
        let mut delay_ms = self.initial_backoff.as_millis() as u64;
        let max_delay_ms = self.max_backoff.as_millis() as u64;
        let mut total = self
            .timeout
            .saturating_mul(u32::try_from(attempts).unwrap_or(u32::MAX));

        let sleeps = attempts - 1;
        for done in 0..sleeps {
            let step = Duration::from_millis(delay_ms.saturating_add(JITTER_MS));
            if delay_ms >= max_delay_ms {
                // Flat from here on.
                let remaining = u32::try_from(sleeps - done).unwrap_or(u32::MAX);
                return total.saturating_add(step.saturating_mul(remaining));
            }
            total = total.saturating_add(step);
            delay_ms = delay_ms.saturating_mul(2).min(max_delay_ms);
        }
        total
    }
}

/// Posts assembled messages to `<base>/<id>`.
pub struct HttpForwarder {
    base_url: String,
    token: String,
    policy: ForwardPolicy,
    http_client: reqwest::Client,
}

impl HttpForwarder {
    pub fn new(base_url: &str, token: &str, policy: ForwardPolicy) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            policy,
            http_client: reqwest::Client::new(),
        }
    }

    /// Target URL for `id`, with the identifier percent-encoded as one path segment.
    pub fn target_url(&self, id: &str) -> RelayResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            RelayError::ForwardTransportError(format!("bad downstream url: {}", e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                RelayError::ForwardTransportError("downstream url cannot be a base".to_string())
            })?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn deliver(&self, id: &str, payload: &str) -> RelayResult<()> {
        let url = self.target_url(id)?;
        let attempts = self.policy.attempts.max(1);
        let mut delay_ms = self.policy.initial_backoff.as_millis() as u64;
        let max_delay_ms = self.policy.max_backoff.as_millis() as u64;
        let mut last_error = String::from("no attempt made");

        tracing::debug!("Making request to {} with payload {}", url, payload);

        for attempt in 0..attempts {
            let response = self
                .http_client
                .post(url.clone())
                .header(TOKEN_HEADER, &self.token)
                .body(payload.to_string())
                .timeout(self.policy.timeout)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();

                    if status.is_success() {
                        tracing::info!(
                            "Delivered msg_id={} downstream ({}): {}",
                            id,
                            status,
                            body
                        );
                        return Ok(());
                    }
                    if status.is_client_error() {
                        tracing::error!(
                            "Downstream rejected msg_id={} ({}): {}",
                            id,
                            status,
                            body
                        );
                        return Err(RelayError::RejectedByDownstream {
                            status: status.as_u16(),
                            body,
                        });
                    }
                    last_error = format!("downstream answered {}: {}", status, body);
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            if attempt + 1 < attempts {
                tracing::warn!(
                    "Delivery of msg_id={} failed (attempt {}/{}): {}",
                    id,
                    attempt + 1,
                    attempts,
                    last_error
                );
                let jitter = rand::random::<u64>() % JITTER_MS;
                tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                delay_ms = (delay_ms * 2).min(max_delay_ms);
            }
        }

        tracing::error!(
            "Giving up on msg_id={} after {} attempts: {}",
            id,
            attempts,
            last_error
        );
        Err(RelayError::ForwardTransportError(last_error))
    }
}
