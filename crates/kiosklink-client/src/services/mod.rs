//! Typed channel services: what the kiosk sends and subscribes to on each
//! upstream, plus the camera feed consumer.

pub mod backend;
pub mod camera;
pub mod vision;

pub use camera::CameraFeed;
