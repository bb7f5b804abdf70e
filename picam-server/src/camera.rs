//! Camera model: settings, frame sources and the recording lifecycle.
//!
//! [`PiCam`] owns the current settings and, while recording, a capture task
//! that grabs frames at the configured rate and publishes them to the MJPEG
//! feed. Settings live in a `watch` channel so rotation and light changes
//! reach a running capture task without a restart.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use image::{codecs::jpeg::JpegEncoder, imageops, Rgb, RgbImage};
use picam_shared::{DeviceStatus, Rotation, FRAMERATES};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::mjpeg::{MjpegBroadcaster, MjpegFrame};

pub const DEFAULT_FRAMERATE: u32 = 5;
pub const DEFAULT_RESOLUTION: u32 = 720;

/// Accepted square frame edge, in pixels.
pub const MIN_RESOLUTION: u32 = 1;
pub const MAX_RESOLUTION: u32 = 8192;

/// Error types for camera operations
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("unsupported frame rate {0}, expected one of {:?}", FRAMERATES)]
    UnsupportedFramerate(u32),
    #[error("resolution {0} outside {}..={}", MIN_RESOLUTION, MAX_RESOLUTION)]
    UnsupportedResolution(u32),
    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("capture task failed: {0}")]
    Capture(String),
}

/// Everything that determines what a captured frame looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraSettings {
    pub framerate: u32,
    /// Edge of the square frame in pixels
    pub resolution: u32,
    pub rotation: Rotation,
    pub light: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            framerate: DEFAULT_FRAMERATE,
            resolution: DEFAULT_RESOLUTION,
            rotation: Rotation::Deg0,
            light: false,
        }
    }
}

impl CameraSettings {
    /// Time between two frames at the configured rate.
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.framerate.max(1)))
    }
}

/// Produces JPEG frames for the given settings.
///
/// Called from a blocking thread; implementations may take as long as the
/// sensor needs.
pub trait FrameSource: Send + Sync + 'static {
    fn capture(&self, settings: &CameraSettings, frame_number: u64) -> Result<Bytes, CameraError>;
}

/// Synthetic source drawing a moving test pattern.
///
/// The bright bar at the top marks "up" and follows the rotation; the light
/// setting raises the overall brightness.
#[derive(Debug, Clone)]
pub struct TestPatternSource {
    quality: u8,
}

impl TestPatternSource {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for TestPatternSource {
    fn default() -> Self {
        Self::new(80)
    }
}

impl FrameSource for TestPatternSource {
    fn capture(&self, settings: &CameraSettings, frame_number: u64) -> Result<Bytes, CameraError> {
        let edge = settings.resolution;
        let boost: u32 = if settings.light { 80 } else { 0 };
        let sweep = (frame_number.wrapping_mul(8) % u64::from(edge)) as u32;
        let marker = (edge / 16).max(1);

        let img = RgbImage::from_fn(edge, edge, |x, y| {
            if y < marker {
                return Rgb([255, 255, 255]);
            }
            if x.abs_diff(sweep) < marker / 2 + 1 {
                return Rgb([0, 255, 0]);
            }
            let r = (x * 255 / edge + boost).min(255) as u8;
            let g = (y * 255 / edge + boost).min(255) as u8;
            let b = (((x + y) * 127) / edge + boost).min(255) as u8;
            Rgb([r, g, b])
        });

        let img = match settings.rotation {
            Rotation::Deg0 => img,
            Rotation::Deg90 => imageops::rotate90(&img),
            Rotation::Deg180 => imageops::rotate180(&img),
            Rotation::Deg270 => imageops::rotate270(&img),
        };

        encode_jpeg(&img, self.quality)
    }
}

/// Encode an RGB image as JPEG.
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Bytes, CameraError> {
    let mut jpeg_bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg_bytes, quality);
    encoder.encode_image(img)?;
    Ok(Bytes::from(jpeg_bytes))
}

/// Black frame shown once a feed has ended.
pub fn blank_frame(resolution: u32) -> Result<Bytes, CameraError> {
    let img = RgbImage::new(resolution, resolution);
    encode_jpeg(&img, 50)
}

/// The camera device.
pub struct PiCam {
    settings: watch::Sender<CameraSettings>,
    source: Arc<dyn FrameSource>,
    feed: Arc<MjpegBroadcaster>,
    latest: watch::Sender<Option<MjpegFrame>>,
    recorder: Option<JoinHandle<()>>,
}

impl PiCam {
    pub fn new(
        settings: CameraSettings,
        source: Arc<dyn FrameSource>,
        feed: Arc<MjpegBroadcaster>,
    ) -> Self {
        Self {
            settings: watch::Sender::new(settings),
            source,
            feed,
            latest: watch::Sender::new(None),
            recorder: None,
        }
    }

    pub fn settings(&self) -> CameraSettings {
        *self.settings.borrow()
    }

    pub fn source(&self) -> Arc<dyn FrameSource> {
        self.source.clone()
    }

    pub fn feed(&self) -> Arc<MjpegBroadcaster> {
        self.feed.clone()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    /// Status as reported by the control endpoint.
    pub fn status(&self) -> DeviceStatus {
        let settings = self.settings();
        DeviceStatus {
            cam: self.is_recording(),
            rotation: settings.rotation,
            light: settings.light,
            fps: Some(settings.framerate),
            resolution: Some(settings.resolution),
        }
    }

    /// Receiver of the most recent frame captured while recording.
    pub fn subscribe_latest(&self) -> watch::Receiver<Option<MjpegFrame>> {
        self.latest.subscribe()
    }

    pub fn set_framerate(&mut self, framerate: u32) -> Result<(), CameraError> {
        if !FRAMERATES.contains(&framerate) {
            return Err(CameraError::UnsupportedFramerate(framerate));
        }
        self.settings.send_modify(|s| s.framerate = framerate);
        Ok(())
    }

    pub fn set_resolution(&mut self, resolution: u32) -> Result<(), CameraError> {
        if !(MIN_RESOLUTION..=MAX_RESOLUTION).contains(&resolution) {
            return Err(CameraError::UnsupportedResolution(resolution));
        }
        self.settings.send_modify(|s| s.resolution = resolution);
        Ok(())
    }

    /// Advance to the next rotation, wrapping 270 back to 0.
    pub fn rotate(&mut self) -> Rotation {
        self.settings.send_modify(|s| s.rotation = s.rotation.next());
        self.settings().rotation
    }

    pub fn toggle_light(&mut self) -> bool {
        self.settings.send_modify(|s| s.light = !s.light);
        self.settings().light
    }

    /// Start recording. Does nothing if already recording.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) {
        if self.recorder.is_some() {
            return;
        }
        info!("Starting recording with {:?}", self.settings());
        self.recorder = Some(tokio::spawn(run_capture(
            self.source.clone(),
            self.settings.subscribe(),
            self.feed.clone(),
            self.latest.clone(),
        )));
    }

    /// Stop recording and end every open stream with a blank frame.
    pub fn stop(&mut self) {
        let Some(recorder) = self.recorder.take() else {
            return;
        };
        recorder.abort();
        self.latest.send_replace(None);

        let resolution = self.settings().resolution;
        match blank_frame(resolution) {
            Ok(jpeg_data) => {
                self.feed.publish(MjpegFrame {
                    jpeg_data,
                    frame_number: 0,
                    last: true,
                });
            }
            Err(e) => warn!("Failed to encode blank frame: {e}"),
        }
        info!("Recording stopped");
    }
}

impl Drop for PiCam {
    fn drop(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            recorder.abort();
        }
    }
}

async fn run_capture(
    source: Arc<dyn FrameSource>,
    settings: watch::Receiver<CameraSettings>,
    feed: Arc<MjpegBroadcaster>,
    latest: watch::Sender<Option<MjpegFrame>>,
) {
    let mut frame_number: u64 = 0;
    loop {
        let current = *settings.borrow();
        let source = source.clone();

        match tokio::task::spawn_blocking(move || source.capture(&current, frame_number)).await {
            Ok(Ok(jpeg_data)) => {
                let frame = MjpegFrame {
                    jpeg_data,
                    frame_number,
                    last: false,
                };
                latest.send_replace(Some(frame.clone()));
                let clients = feed.publish(frame);
                debug!("Published frame {frame_number} to {clients} clients");
            }
            Ok(Err(e)) => warn!("Frame capture failed: {e}"),
            Err(e) => warn!("Capture thread failed: {e}"),
        }

        frame_number = frame_number.wrapping_add(1);
        tokio::time::sleep(current.frame_period()).await;
    }
}

/// Grab a still image.
///
/// While recording this waits up to `wait` for the next frame; if none
/// arrives (or the camera is idle) a frame is captured directly.
pub async fn take_photo(
    recording: bool,
    mut latest: watch::Receiver<Option<MjpegFrame>>,
    source: Arc<dyn FrameSource>,
    settings: CameraSettings,
    wait: Duration,
) -> Result<Bytes, CameraError> {
    if recording {
        latest.borrow_and_update();
        let _ = tokio::time::timeout(wait, latest.changed()).await;
        if let Some(frame) = latest.borrow().as_ref() {
            return Ok(frame.jpeg_data.clone());
        }
    }

    tokio::task::spawn_blocking(move || source.capture(&settings, 0))
        .await
        .map_err(|e| CameraError::Capture(e.to_string()))?
}
