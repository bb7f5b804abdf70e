//! Applying `/control` requests to the camera.

use picam_shared::{Action, ControlDelta, FRAMERATES};
use tracing::{debug, info, warn};

use crate::camera::{PiCam, MAX_RESOLUTION, MIN_RESOLUTION};

/// Resolution changes of this many pixels or fewer are ignored.
pub const RESOLUTION_TOLERANCE: u32 = 10;

/// Apply a control delta to the camera.
///
/// Frame rate and resolution changes need the capture pipeline rebuilt, so
/// the camera is stopped around them and restarted if it was recording. An
/// explicit `stop` in the same request wins over that restart. Invalid
/// values are logged and skipped.
pub fn apply_control(cam: &mut PiCam, delta: &ControlDelta) {
    let was_recording = cam.is_recording();
    let mut restart = false;

    if let Some(fps) = delta.fps {
        if !FRAMERATES.contains(&fps) {
            warn!("Ignoring unsupported frame rate {fps}");
        } else if fps != cam.settings().framerate {
            cam.stop();
            cam.set_framerate(fps)
                .unwrap_or_else(|e| warn!("Frame rate change failed: {e}"));
            info!("Frame rate set to {fps}");
            restart = was_recording;
        }
    }

    if let Some(resolution) = delta.resolution {
        if !(MIN_RESOLUTION..=MAX_RESOLUTION).contains(&resolution) {
            warn!("Ignoring unsupported resolution {resolution}");
        } else if resolution.abs_diff(cam.settings().resolution) > RESOLUTION_TOLERANCE {
            cam.stop();
            cam.set_resolution(resolution)
                .unwrap_or_else(|e| warn!("Resolution change failed: {e}"));
            info!("Resolution set to {resolution}");
            restart = was_recording;
        } else {
            debug!("Resolution {resolution} within tolerance, unchanged");
        }
    }

    match delta.mode {
        Some(Action::Stop) => {
            cam.stop();
            restart = false;
        }
        Some(Action::Start) => restart = true,
        Some(Action::Rotate) => {
            let rotation = cam.rotate();
            info!("Rotation set to {}", rotation.degrees());
        }
        Some(Action::Light) => {
            let light = cam.toggle_light();
            info!("Light {}", if light { "on" } else { "off" });
        }
        Some(Action::Photo) => debug!("Photo requested on control endpoint, ignored"),
        None => {}
    }

    if restart {
        cam.start();
    }
}
