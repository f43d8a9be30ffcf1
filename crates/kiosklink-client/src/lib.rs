//! kiosklink client runtime.
//!
//! Two long-lived WebSocket channels (backend and vision) with connect /
//! reconnect handling, typed inbound routing, request/response correlation
//! and fire-and-forget commands, plus the scene/state bridge that consumes
//! both. Used by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod bridge;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod obs;
pub mod services;
pub mod testing;
pub mod transport;
