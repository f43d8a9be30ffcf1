//! Top-level facade crate for kiosklink.
//!
//! Re-exports the protocol core and the channel client so kiosk frontends can
//! depend on a single crate.

pub mod core {
    pub use kiosklink_core::*;
}

pub mod client {
    pub use kiosklink_client::*;
}
