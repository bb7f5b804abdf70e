//! Device status reported by the control endpoint.

use serde::{Deserialize, Serialize};

use crate::ControlError;

/// Camera rotation in 90 degree steps.
///
/// Serialized as the plain number of degrees (`0`, `90`, `180`, `270`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

/// Error for a rotation value that is not a multiple of 90 in `0..360`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid rotation {0}, expected one of 0, 90, 180, 270")]
pub struct InvalidRotation(pub u16);

impl Rotation {
    /// All rotations in the order the device cycles through them.
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// The next rotation clockwise, wrapping 270 back to 0.
    pub fn next(self) -> Self {
        match self {
            Rotation::Deg0 => Rotation::Deg90,
            Rotation::Deg90 => Rotation::Deg180,
            Rotation::Deg180 => Rotation::Deg270,
            Rotation::Deg270 => Rotation::Deg0,
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = InvalidRotation;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(InvalidRotation(other)),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

/// Response body of the control endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Whether the camera is actively recording
    pub cam: bool,
    pub rotation: Rotation,
    pub light: bool,
    /// Current frame rate (not reported by older firmware)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    /// Current square frame edge in pixels (not reported by older firmware)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<u32>,
}

impl DeviceStatus {
    /// Parse and validate a JSON response body.
    pub fn from_json(body: &str) -> Result<Self, ControlError> {
        serde_json::from_str(body).map_err(|e| ControlError::MalformedResponse(e.to_string()))
    }

    /// Parse and validate a raw JSON response body.
    pub fn from_slice(body: &[u8]) -> Result<Self, ControlError> {
        serde_json::from_slice(body).map_err(|e| ControlError::MalformedResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_status() {
        let status = DeviceStatus::from_json(r#"{"cam": true, "rotation": 90, "light": false}"#)
            .unwrap();
        assert!(status.cam);
        assert_eq!(status.rotation, Rotation::Deg90);
        assert!(!status.light);
        assert_eq!(status.fps, None);
    }

    #[test]
    fn test_parse_full_status() {
        let status = DeviceStatus::from_json(
            r#"{"cam": false, "rotation": 270, "light": true, "fps": 15, "resolution": 720}"#,
        )
        .unwrap();
        assert_eq!(status.rotation, Rotation::Deg270);
        assert_eq!(status.fps, Some(15));
        assert_eq!(status.resolution, Some(720));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let err = DeviceStatus::from_json(r#"{"cam": true, "rotation": 0}"#).unwrap_err();
        match err {
            ControlError::MalformedResponse(msg) => assert!(msg.contains("light"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_invalid_rotation_is_malformed() {
        let err = DeviceStatus::from_json(r#"{"cam": true, "rotation": 45, "light": true}"#)
            .unwrap_err();
        assert!(matches!(err, ControlError::MalformedResponse(_)));
    }

    #[test]
    fn test_wrong_type_is_malformed() {
        let err = DeviceStatus::from_slice(br#"{"cam": "yes", "rotation": 0, "light": true}"#)
            .unwrap_err();
        assert!(matches!(err, ControlError::MalformedResponse(_)));
        assert!(matches!(
            DeviceStatus::from_json("not json"),
            Err(ControlError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_rotation_cycle() {
        let mut rotation = Rotation::Deg0;
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(rotation.degrees());
            rotation = rotation.next();
        }
        assert_eq!(seen, vec![0, 90, 180, 270, 0]);
    }

    #[test]
    fn test_rotation_serializes_as_degrees() {
        let status = DeviceStatus {
            cam: false,
            rotation: Rotation::Deg180,
            light: false,
            fps: None,
            resolution: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"cam": false, "rotation": 180, "light": false})
        );
    }
}
