//! Control request types.
//!
//! A [`ControlDelta`] is the set of settings (and optional action) the panel
//! wants the device to apply. It travels as URL query parameters on the
//! control endpoint, e.g. `/control?fps=15&resolution=720&mode=start`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Query key for the frame rate.
pub const FPS_KEY: &str = "fps";
/// Query key for the square frame edge in pixels.
pub const RESOLUTION_KEY: &str = "resolution";
/// Query key for the action tag.
pub const MODE_KEY: &str = "mode";

/// Frame rates the camera accepts.
pub const FRAMERATES: [u32; 6] = [5, 10, 15, 20, 25, 30];

/// Action tags understood by the device.
///
/// `Photo` is only meaningful on the stream endpoint; the control endpoint
/// accepts it but does nothing with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Start,
    Stop,
    Rotate,
    Light,
    Photo,
}

impl Action {
    /// Lowercase tag used in query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Rotate => "rotate",
            Action::Light => "light",
            Action::Photo => "photo",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognised action tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Action::Start),
            "stop" => Ok(Action::Stop),
            "rotate" => Ok(Action::Rotate),
            "light" => Ok(Action::Light),
            "photo" => Ok(Action::Photo),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Settings delta sent to the control endpoint.
///
/// Every field is optional; an all-`None` delta is a pure status query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Action>,
}

impl ControlDelta {
    /// A delta carrying only an action tag.
    pub fn action(action: Action) -> Self {
        Self {
            mode: Some(action),
            ..Self::default()
        }
    }

    /// True when no setting and no action is present.
    pub fn is_empty(&self) -> bool {
        self.fps.is_none() && self.resolution.is_none() && self.mode.is_none()
    }

    /// True when applying this delta changes the encoded stream, so any
    /// displayed stream must be reloaded afterwards.
    pub fn affects_stream(&self) -> bool {
        self.fps.is_some() || self.resolution.is_some() || self.mode == Some(Action::Start)
    }

    /// Encode as a query string (without the leading `?`).
    ///
    /// Keys are emitted in the order `fps`, `resolution`, `mode`; absent keys
    /// are omitted.
    pub fn to_query(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(fps) = self.fps {
            query.append_pair(FPS_KEY, &fps.to_string());
        }
        if let Some(resolution) = self.resolution {
            query.append_pair(RESOLUTION_KEY, &resolution.to_string());
        }
        if let Some(mode) = self.mode {
            query.append_pair(MODE_KEY, mode.as_str());
        }
        query.finish()
    }

    /// Decode from a raw query string, ignoring anything unparseable.
    ///
    /// Only the first occurrence of each key counts.
    pub fn from_query(query: &str) -> Self {
        let mut delta = Self::default();
        let mut seen_fps = false;
        let mut seen_resolution = false;
        let mut seen_mode = false;

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                FPS_KEY if !seen_fps => {
                    seen_fps = true;
                    delta.fps = value.trim().parse().ok();
                }
                RESOLUTION_KEY if !seen_resolution => {
                    seen_resolution = true;
                    delta.resolution = value.trim().parse().ok();
                }
                MODE_KEY if !seen_mode => {
                    seen_mode = true;
                    delta.mode = value.parse().ok();
                }
                _ => {}
            }
        }

        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_delta_encodes_to_empty_query() {
        let delta = ControlDelta::default();
        assert!(delta.is_empty());
        assert_eq!(delta.to_query(), "");
    }

    #[test]
    fn test_query_key_order() {
        let delta = ControlDelta {
            fps: Some(15),
            resolution: Some(720),
            mode: Some(Action::Rotate),
        };
        assert_eq!(delta.to_query(), "fps=15&resolution=720&mode=rotate");
    }

    #[test]
    fn test_partial_delta_omits_absent_keys() {
        let delta = ControlDelta {
            resolution: Some(480),
            ..Default::default()
        };
        assert_eq!(delta.to_query(), "resolution=480");
        assert_eq!(ControlDelta::action(Action::Light).to_query(), "mode=light");
    }

    #[test]
    fn test_from_query_ignores_garbage() {
        let delta = ControlDelta::from_query("fps=abc&resolution=640&mode=dance&extra=1");
        assert_eq!(delta.fps, None);
        assert_eq!(delta.resolution, Some(640));
        assert_eq!(delta.mode, None);
    }

    #[test]
    fn test_from_query_first_value_wins() {
        let delta = ControlDelta::from_query("fps=10&fps=30&mode=stop&mode=start");
        assert_eq!(delta.fps, Some(10));
        assert_eq!(delta.mode, Some(Action::Stop));
    }

    #[test]
    fn test_affects_stream() {
        assert!(ControlDelta::action(Action::Start).affects_stream());
        assert!(!ControlDelta::action(Action::Rotate).affects_stream());
        assert!(!ControlDelta::action(Action::Stop).affects_stream());
        let fps_only = ControlDelta {
            fps: Some(5),
            ..Default::default()
        };
        assert!(fps_only.affects_stream());
    }

    #[test]
    fn test_action_parse() {
        for action in [
            Action::Start,
            Action::Stop,
            Action::Rotate,
            Action::Light,
            Action::Photo,
        ] {
            assert_eq!(action.as_str().parse::<Action>(), Ok(action));
        }
        assert_eq!(
            "photo1699999999999".parse::<Action>(),
            Err(UnknownAction("photo1699999999999".to_string()))
        );
    }
}
