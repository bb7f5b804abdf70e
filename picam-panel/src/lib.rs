pub mod download;
pub mod indicators;
pub mod panel_app;
pub mod stream;
pub mod sync;

pub use indicators::{Indicators, RecordingButtons};
pub use panel_app::PanelFrontend;
pub use sync::{ControlTransport, Outcome, PlannedRequest, SessionMemory, Synchronizer, Viewport};
