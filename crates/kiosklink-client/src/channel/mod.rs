//! Channel runtime: one connection manager per upstream endpoint.
//!
//! `Channel<V>` is generic over the channel vocabulary; the two fixed
//! upstreams are `BackendChannel` and `VisionChannel`, owned by the
//! `ChannelRegistry`.

pub mod connection;
pub mod reconnect;
pub mod registry;
pub mod state;

use kiosklink_core::protocol::{Backend, Vision};

pub use connection::{Channel, ChannelConfig, DEFAULT_REQUEST_TIMEOUT};
pub use reconnect::ReconnectPolicy;
pub use registry::ChannelRegistry;
pub use state::{CloseInfo, ConnectionState};

pub type BackendChannel = Channel<Backend>;
pub type VisionChannel = Channel<Vision>;
