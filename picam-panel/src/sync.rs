//! Settings synchronizer.
//!
//! Reconciles the panel's local controls with the device. Each interaction
//! (page load, resize, fps change, button press) is turned into a
//! [`PlannedRequest`] carrying only the settings that changed since they
//! were last sent, plus an optional action. Nothing is sent for an empty
//! plan.
//!
//! Requests may overlap (resize events are not debounced), so every plan
//! carries a sequence token and only the newest token's response is
//! applied. Older responses resolve to [`Outcome::Superseded`].

use picam_shared::{Action, ControlDelta, ControlError, DeviceStatus, PicamClient};

/// Resolution changes of this many pixels or fewer are not sent.
pub const MIN_RESOLUTION_CHANGE: u32 = 10;

/// Visible area of the browser window in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Edge of the largest square frame that fits the viewport.
    pub fn square_edge(&self) -> u32 {
        self.width.min(self.height)
    }
}

/// Last settings sent to the device during this page session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMemory {
    previous_resolution: Option<u32>,
    previous_fps: Option<u32>,
}

impl SessionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous_resolution(&self) -> Option<u32> {
        self.previous_resolution
    }

    pub fn previous_fps(&self) -> Option<u32> {
        self.previous_fps
    }

    /// Compute the delta for the current control values and remember every
    /// field that made it into the delta.
    pub fn delta(&mut self, fps: u32, resolution: u32, action: Option<Action>) -> ControlDelta {
        let resolution_changed = match self.previous_resolution {
            Some(previous) => previous.abs_diff(resolution) > MIN_RESOLUTION_CHANGE,
            None => true,
        };
        let fps_changed = self.previous_fps != Some(fps);

        let mut delta = ControlDelta {
            mode: action,
            ..ControlDelta::default()
        };
        if resolution_changed {
            delta.resolution = Some(resolution);
            self.previous_resolution = Some(resolution);
        }
        if fps_changed {
            delta.fps = Some(fps);
            self.previous_fps = Some(fps);
        }
        delta
    }

    /// Forget the fields of a delta the device never acknowledged, so the
    /// next interaction sends them again.
    pub fn forget(&mut self, delta: &ControlDelta) {
        if delta.resolution.is_some() && self.previous_resolution == delta.resolution {
            self.previous_resolution = None;
        }
        if delta.fps.is_some() && self.previous_fps == delta.fps {
            self.previous_fps = None;
        }
    }
}

/// A control request the panel has decided to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRequest {
    /// Sequence token; higher is newer
    pub seq: u64,
    pub delta: ControlDelta,
    /// New square edge for the video frame, when resolution is part of the delta
    pub frame_edge: Option<u32>,
}

/// What the panel should do with a finished request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Mirror `status` in the indicators; reload the stream if asked.
    Applied {
        status: DeviceStatus,
        reload_stream: bool,
    },
    /// The newest request failed; keep the current indicators.
    Failed(ControlError),
    /// A newer request was issued after this one; ignore it entirely.
    Superseded,
}

/// Anything that can deliver a control delta to the device.
#[allow(async_fn_in_trait)]
pub trait ControlTransport {
    async fn send_control(&self, delta: &ControlDelta) -> Result<DeviceStatus, ControlError>;
}

impl ControlTransport for PicamClient {
    async fn send_control(&self, delta: &ControlDelta) -> Result<DeviceStatus, ControlError> {
        self.control(delta).await
    }
}

/// Plans control requests and filters their responses.
#[derive(Debug, Default)]
pub struct Synchronizer {
    memory: SessionMemory,
    latest_seq: u64,
}

impl Synchronizer {
    pub fn new(memory: SessionMemory) -> Self {
        Self {
            memory,
            latest_seq: 0,
        }
    }

    pub fn memory(&self) -> &SessionMemory {
        &self.memory
    }

    /// Token of the most recently planned request (0 before the first).
    pub fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    /// Decide what, if anything, to send for the current control values.
    pub fn plan(
        &mut self,
        fps: u32,
        viewport: Viewport,
        action: Option<Action>,
    ) -> Option<PlannedRequest> {
        let delta = self.memory.delta(fps, viewport.square_edge(), action);
        if delta.is_empty() {
            return None;
        }

        self.latest_seq += 1;
        Some(PlannedRequest {
            seq: self.latest_seq,
            frame_edge: delta.resolution,
            delta,
        })
    }

    /// Classify the result of a request previously returned by [`plan`].
    ///
    /// [`plan`]: Synchronizer::plan
    pub fn resolve(
        &mut self,
        request: &PlannedRequest,
        result: Result<DeviceStatus, ControlError>,
    ) -> Outcome {
        if request.seq < self.latest_seq {
            if result.is_err() {
                self.memory.forget(&request.delta);
            }
            return Outcome::Superseded;
        }

        match result {
            Ok(status) => Outcome::Applied {
                reload_stream: request.delta.affects_stream() && status.cam,
                status,
            },
            Err(err) => {
                self.memory.forget(&request.delta);
                Outcome::Failed(err)
            }
        }
    }

    /// Plan, send and resolve in one step.
    ///
    /// Returns `None` without touching the transport when there is nothing
    /// to send.
    pub async fn synchronize<T: ControlTransport>(
        &mut self,
        transport: &T,
        fps: u32,
        viewport: Viewport,
        action: Option<Action>,
    ) -> Option<Outcome> {
        let request = self.plan(fps, viewport, action)?;
        let result = dispatch(transport, &request).await;
        Some(self.resolve(&request, result))
    }
}

/// Send a planned request.
pub async fn dispatch<T: ControlTransport>(
    transport: &T,
    request: &PlannedRequest,
) -> Result<DeviceStatus, ControlError> {
    transport.send_control(&request.delta).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use picam_shared::Rotation;
    use std::cell::RefCell;

    struct MockTransport {
        calls: RefCell<Vec<ControlDelta>>,
        response: Result<DeviceStatus, ControlError>,
    }

    impl MockTransport {
        fn replying(status: DeviceStatus) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                response: Ok(status),
            }
        }

        fn failing(err: ControlError) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                response: Err(err),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl ControlTransport for MockTransport {
        async fn send_control(&self, delta: &ControlDelta) -> Result<DeviceStatus, ControlError> {
            self.calls.borrow_mut().push(delta.clone());
            self.response.clone()
        }
    }

    fn status(cam: bool) -> DeviceStatus {
        DeviceStatus {
            cam,
            rotation: Rotation::Deg0,
            light: false,
            fps: None,
            resolution: None,
        }
    }

    /// A synchronizer that has already sent fps=5 and resolution=600.
    fn primed() -> Synchronizer {
        let mut sync = Synchronizer::default();
        sync.plan(5, Viewport::new(800, 600), None).unwrap();
        sync
    }

    #[test]
    fn test_first_plan_sends_everything() {
        let mut sync = Synchronizer::default();
        let request = sync.plan(10, Viewport::new(1024, 768), None).unwrap();
        assert_eq!(request.delta.fps, Some(10));
        assert_eq!(request.delta.resolution, Some(768));
        assert_eq!(request.frame_edge, Some(768));
        assert_eq!(request.seq, 1);
    }

    #[test]
    fn test_small_resolution_change_sends_nothing() {
        for edge in [590, 595, 600, 605, 610] {
            let mut sync = primed();
            assert_eq!(
                sync.plan(5, Viewport::new(900, edge), None),
                None,
                "edge {edge}"
            );
        }
    }

    #[test]
    fn test_resolution_over_threshold_is_sent() {
        let mut sync = primed();
        let request = sync.plan(5, Viewport::new(900, 611), None).unwrap();
        assert_eq!(
            request.delta,
            ControlDelta {
                resolution: Some(611),
                ..Default::default()
            }
        );
        assert_eq!(request.frame_edge, Some(611));
    }

    #[test]
    fn test_fps_change_alone() {
        let mut sync = primed();
        let request = sync.plan(15, Viewport::new(800, 604), None).unwrap();
        assert_eq!(
            request.delta,
            ControlDelta {
                fps: Some(15),
                ..Default::default()
            }
        );
        assert_eq!(request.frame_edge, None);
    }

    #[test]
    fn test_fps_and_resolution_change_together() {
        let mut sync = primed();
        let request = sync.plan(20, Viewport::new(300, 400), None).unwrap();
        assert_eq!(request.delta.fps, Some(20));
        assert_eq!(request.delta.resolution, Some(300));
    }

    #[test]
    fn test_action_is_sent_even_without_changes() {
        let mut sync = primed();
        let request = sync
            .plan(5, Viewport::new(800, 600), Some(Action::Rotate))
            .unwrap();
        assert_eq!(request.delta, ControlDelta::action(Action::Rotate));
    }

    #[test]
    fn test_small_drift_is_measured_from_last_sent_value() {
        let mut sync = primed();
        assert!(sync.plan(5, Viewport::new(800, 608), None).is_none());
        assert!(sync.plan(5, Viewport::new(800, 609), None).is_none());
        assert_eq!(sync.memory().previous_resolution(), Some(600));
        assert!(sync.plan(5, Viewport::new(800, 611), None).is_some());
        assert_eq!(sync.memory().previous_resolution(), Some(611));
    }

    #[test]
    fn test_empty_delta_makes_no_network_call() {
        let transport = MockTransport::replying(status(true));
        let mut sync = primed();

        let outcome = block_on(sync.synchronize(&transport, 5, Viewport::new(800, 600), None));

        assert_eq!(outcome, None);
        assert_eq!(transport.call_count(), 0);
    }

    #[test]
    fn test_synchronize_sends_one_request() {
        let transport = MockTransport::replying(status(true));
        let mut sync = Synchronizer::default();

        let outcome = block_on(sync.synchronize(
            &transport,
            5,
            Viewport::new(640, 480),
            Some(Action::Start),
        ));

        assert_eq!(transport.call_count(), 1);
        assert_eq!(
            transport.calls.borrow()[0].to_query(),
            "fps=5&resolution=480&mode=start"
        );
        assert_eq!(
            outcome,
            Some(Outcome::Applied {
                status: status(true),
                reload_stream: true
            })
        );
    }

    #[test]
    fn test_stop_does_not_reload_stream() {
        let transport = MockTransport::replying(status(false));
        let mut sync = primed();

        let outcome = block_on(sync.synchronize(
            &transport,
            5,
            Viewport::new(800, 600),
            Some(Action::Stop),
        ));

        assert_eq!(
            outcome,
            Some(Outcome::Applied {
                status: status(false),
                reload_stream: false
            })
        );
    }

    #[test]
    fn test_stale_response_is_superseded() {
        let mut sync = Synchronizer::default();
        let first = sync.plan(5, Viewport::new(800, 600), None).unwrap();
        let second = sync.plan(10, Viewport::new(800, 600), None).unwrap();
        assert!(second.seq > first.seq);

        assert_eq!(sync.resolve(&first, Ok(status(true))), Outcome::Superseded);
        assert!(matches!(
            sync.resolve(&second, Ok(status(true))),
            Outcome::Applied { .. }
        ));
    }

    #[test]
    fn test_failure_keeps_settings_pending() {
        let transport = MockTransport::failing(ControlError::Timeout);
        let mut sync = Synchronizer::default();

        let outcome = block_on(sync.synchronize(&transport, 5, Viewport::new(800, 600), None));
        assert_eq!(outcome, Some(Outcome::Failed(ControlError::Timeout)));
        assert_eq!(sync.memory().previous_fps(), None);
        assert_eq!(sync.memory().previous_resolution(), None);

        // The next interaction resends the unacknowledged settings
        let request = sync.plan(5, Viewport::new(800, 600), None).unwrap();
        assert_eq!(request.delta.fps, Some(5));
        assert_eq!(request.delta.resolution, Some(600));
    }

    #[test]
    fn test_malformed_response_is_a_failure() {
        let transport =
            MockTransport::failing(ControlError::MalformedResponse("missing field `cam`".into()));
        let mut sync = primed();

        let outcome = block_on(sync.synchronize(
            &transport,
            5,
            Viewport::new(800, 600),
            Some(Action::Light),
        ));
        assert!(matches!(
            outcome,
            Some(Outcome::Failed(ControlError::MalformedResponse(_)))
        ));
    }
}
