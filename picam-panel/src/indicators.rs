//! On-screen indicators mirroring the device state.

use picam_shared::{DeviceStatus, Rotation};

/// Visibility of the record and stop buttons.
///
/// Exactly one of the two is visible at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingButtons {
    pub record_visible: bool,
    pub stop_visible: bool,
}

impl RecordingButtons {
    pub fn for_recording(recording: bool) -> Self {
        Self {
            record_visible: !recording,
            stop_visible: recording,
        }
    }
}

impl Default for RecordingButtons {
    fn default() -> Self {
        Self::for_recording(false)
    }
}

/// Inline style hiding an element when it should not be shown.
pub fn display_style(visible: bool) -> &'static str {
    if visible {
        ""
    } else {
        "display: none;"
    }
}

/// Arrow pointing to where "up" currently is.
pub fn rotation_glyph(rotation: Rotation) -> &'static str {
    match rotation {
        Rotation::Deg0 => "↑",
        Rotation::Deg90 => "→",
        Rotation::Deg180 => "↓",
        Rotation::Deg270 => "←",
    }
}

pub fn light_glyph(on: bool) -> &'static str {
    if on {
        "●"
    } else {
        "○"
    }
}

/// Everything the panel shows about the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Indicators {
    pub buttons: RecordingButtons,
    pub rotation: Rotation,
    pub light: bool,
}

impl Indicators {
    /// Mirror a device response. Applying the same status twice is a no-op.
    pub fn apply(&mut self, status: &DeviceStatus) {
        self.buttons = RecordingButtons::for_recording(status.cam);
        self.rotation = status.rotation;
        self.light = status.light;
    }

    pub fn rotation_glyph(&self) -> &'static str {
        rotation_glyph(self.rotation)
    }

    pub fn light_glyph(&self) -> &'static str {
        light_glyph(self.light)
    }
}
