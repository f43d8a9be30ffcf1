//! Inbound dispatch: listener sets, the per-channel router and the
//! pending-request table used by request/response correlation.

pub mod listeners;
pub mod pending;
pub mod router;

pub use listeners::{ListenerSet, Subscription};
pub use pending::PendingTable;
pub use router::{Routed, Router};
