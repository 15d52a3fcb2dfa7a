//! Fragment Relay Library
//!
//! Accepts two-part messages as independent fragments, accumulates them in shared storage,
//! and forwards each completed message downstream once.
//!
//! ## Modules
//! - **`store`**: The `FragmentStore` contract plus an in-memory backend and an HTTP client
//!   for a shared store node. All completion decisions rest on its per-key atomic operations.
//! - **`reassembly`**: The `Reassembler` (merge, completion detection, claim, deliver, commit)
//!   and the `Reconciler` sweep that retries stalled completions.
//! - **`forward`**: The `Forwarder` seam and its reqwest implementation with bounded retry.
//! - **`dispatch`**: The axum adapter for `POST /` and `GET /`.
//! - **`config`**: Environment and flag parsing for the binary.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod forward;
pub mod reassembly;
pub mod store;

pub use error::{RelayError, RelayResult};
