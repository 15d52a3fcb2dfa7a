//! Error taxonomy shared by the store, the reassembler and the forwarder.

/// Failures a fragment submission can end in.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Malformed input. Rejected before any store mutation.
    #[error("Invalid fragment: {0}")]
    InvalidFragment(String),

    /// The shared store could not be reached or the write did not complete
    /// within its retry budget. The fragment is not considered recorded.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Downstream answered with a 4xx. Terminal for this delivery attempt.
    #[error("Rejected by downstream with status {status}: {body}")]
    RejectedByDownstream { status: u16, body: String },

    /// Downstream could not be reached after all retries.
    #[error("Forward transport error: {0}")]
    ForwardTransportError(String),
}

impl RelayError {
    /// Whether resubmitting the same fragment later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RelayError::StoreUnavailable(_) | RelayError::ForwardTransportError(_)
        )
    }
}

pub type RelayResult<T> = std::result::Result<T, RelayError>;
