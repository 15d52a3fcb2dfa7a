//! Reassembly Module
//!
//! Turns two independent fragment arrivals into a single completion event.
//!
//! ## Lifecycle of one identifier
//! 1. **Merge**: each fragment is merged into the shared record atomically.
//! 2. **Claim**: once both parts are present, submitters race on a compare-and-set delivery
//!    claim in the store. Exactly one wins; the others report `Delivering`.
//! 3. **Deliver**: the winner forwards `first ++ second` downstream.
//! 4. **Commit**: after the acknowledgment the winner persists `forwarded = true`.
//!
//! If the process dies between 3 and 4 the claim lease expires and the next submission (or
//! the `reconciler`) delivers again. Delivery is therefore at-least-once and downstream is
//! expected to be idempotent per identifier.

pub mod reassembler;
pub mod reconciler;

pub use reassembler::{Outcome, Reassembler};
pub use reconciler::Reconciler;
