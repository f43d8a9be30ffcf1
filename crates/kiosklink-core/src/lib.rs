//! kiosklink core: transport-agnostic protocol primitives and the shared error type.
//!
//! This crate defines the wire-level contracts used by both kiosk channels
//! (backend and vision): the message envelope, the per-channel message-name
//! vocabularies with their typed payloads, and the binary camera-frame lane.
//! It carries no transport or runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed frames surface as `KioskError::Decode` so a single bad message
//! can never take a channel down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorCode, KioskError, Result};
