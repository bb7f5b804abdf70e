//! PiCam device server.
//!
//! Serves the control panel, an MJPEG live stream, still photos and the
//! `/control` endpoint the panel drives.

pub mod camera;
pub mod control;
pub mod embedded_assets;
pub mod mjpeg;
pub mod server;

pub use camera::{CameraError, CameraSettings, FrameSource, PiCam, TestPatternSource};
pub use server::{build_camera, create_router, run_server, AppState, ServerArgs};
