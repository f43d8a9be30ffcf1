//! Protocol modules shared by the backend and vision channels.
//!
//! - `envelope`: header + payload unit, JSON wire form with lazy `RawValue` data.
//! - `names` / `vocabulary`: closed per-channel message-name sets and the
//!   typed sum types the router narrows payloads into.
//! - `frame`: camera frames, either as JSON envelopes or on the binary lane
//!   (JSON metadata + out-of-band pixel bytes).
//!
//! All parsers are panic-free: malformed input is reported as `KioskError`.

pub mod backend;
pub mod envelope;
pub mod frame;
pub mod id;
pub mod names;
pub mod vision;
pub mod vocabulary;

pub use backend::{Backend, BackendCommand, BackendMessage};
pub use envelope::{Envelope, Header, Sender, WireEnvelope};
pub use frame::{CameraFrame, FramePixels};
pub use vision::{Vision, VisionMessage};
pub use vocabulary::Vocabulary;
