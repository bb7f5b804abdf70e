//! Shared WASM-compatible types for the PiCam panel and server.
//!
//! Everything here must build for both `wasm32-unknown-unknown` (the panel)
//! and native targets (the server and integration tooling).

pub mod client;
pub mod control;
mod error;
pub mod status;

pub use client::{PicamClient, CONTROL_PATH, DEFAULT_TIMEOUT};
pub use control::{Action, ControlDelta, UnknownAction, FRAMERATES};
pub use error::ControlError;
pub use status::{DeviceStatus, InvalidRotation, Rotation};
