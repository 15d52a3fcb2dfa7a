//! Inbound HTTP adapter.
//!
//! Parses fragment requests and hands them to the `Reassembler`; everything else about a
//! submission is decided there.

pub mod handlers;
pub mod protocol;

#[cfg(test)]
mod tests;
