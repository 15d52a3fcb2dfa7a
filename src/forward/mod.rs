//! Downstream Delivery Module
//!
//! Sends assembled messages to the scoring endpoint.
//!
//! The forwarder is stateless per call: it performs the network call, retries transient
//! failures, and reports the outcome. Committing the `forwarded` flag is the reassembler's
//! job, so a network acknowledgment and a state commit stay two separate steps.

use async_trait::async_trait;

use crate::error::RelayResult;

pub mod forwarder;

pub use forwarder::{ForwardPolicy, HttpForwarder, TOKEN_HEADER};

/// Delivery seam used by the reassembler.
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Delivers `payload` for message `id`. `Ok(())` is the downstream acknowledgment.
    async fn deliver(&self, id: &str, payload: &str) -> RelayResult<()>;
}
