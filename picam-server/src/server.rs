//! HTTP surface of the camera: panel page, MJPEG stream, photos and
//! `/control`.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    extract::{RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use clap::Args;
use picam_shared::{ControlDelta, DeviceStatus, CONTROL_PATH};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::camera::{self, CameraSettings, FrameSource, PiCam, TestPatternSource};
use crate::control::apply_control;
use crate::embedded_assets::{serve_panel_asset, serve_panel_index};
use crate::mjpeg::{jpeg_response, single_frame_response, MjpegBroadcaster};

pub const STREAM_PATH: &str = "/stream.mjpg";

/// How long `/control` waits for a concurrent change to finish before
/// answering with the current status instead.
pub const CHANGE_LOCK_TIMEOUT: Duration = Duration::from_millis(10);

/// How long a photo request waits for the next frame while recording.
pub const PHOTO_WAIT: Duration = Duration::from_secs(1);

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    #[arg(short = 'b', long, default_value = "0.0.0.0")]
    pub bind: String,

    #[arg(short = 'p', long, default_value = "8000")]
    pub port: u16,

    #[arg(long, default_value_t = camera::DEFAULT_FRAMERATE, help = "Initial frame rate (5, 10, 15, 20, 25 or 30)")]
    pub framerate: u32,

    #[arg(long, default_value_t = camera::DEFAULT_RESOLUTION, help = "Initial square frame edge in pixels")]
    pub resolution: u32,

    #[arg(long, default_value = "80", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,
}

pub struct AppState {
    camera: Mutex<PiCam>,
    change_lock: tokio::sync::Mutex<()>,
}

impl AppState {
    pub fn new(camera: PiCam) -> Self {
        Self {
            camera: Mutex::new(camera),
            change_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Lock the camera, recovering from a panicked holder.
    pub fn camera(&self) -> MutexGuard<'_, PiCam> {
        self.camera
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/index.html", get(index_handler))
        .route(STREAM_PATH, get(stream_handler))
        .route(CONTROL_PATH, get(control_handler))
        .fallback(serve_panel_asset)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root_handler() -> Response {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, "/index.html")],
    )
        .into_response()
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    let fps = state.camera().settings().framerate;
    serve_panel_index(STREAM_PATH, fps)
}

async fn stream_handler(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Response {
    // Older panels append the timestamp straight onto `mode=photo`
    if query.as_deref().is_some_and(|q| q.contains("mode=photo")) {
        return photo_handler(state).await;
    }

    let cam = state.camera();
    if cam.is_recording() {
        // Subscribing under the camera lock guarantees the stream sees the
        // final frame of a concurrent stop.
        return cam.feed().subscribe().into_response();
    }

    match camera::blank_frame(cam.settings().resolution) {
        Ok(jpeg) => single_frame_response(&jpeg),
        Err(e) => {
            warn!("Failed to encode blank frame: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn photo_handler(state: Arc<AppState>) -> Response {
    let (recording, latest, source, settings) = {
        let cam = state.camera();
        (
            cam.is_recording(),
            cam.subscribe_latest(),
            cam.source(),
            cam.settings(),
        )
    };

    match camera::take_photo(recording, latest, source, settings, PHOTO_WAIT).await {
        Ok(jpeg) => {
            info!("Photo captured ({} bytes)", jpeg.len());
            jpeg_response(jpeg)
        }
        Err(e) => {
            warn!("Photo capture failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn control_handler(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Json<DeviceStatus> {
    let delta = ControlDelta::from_query(query.as_deref().unwrap_or_default());

    if !delta.is_empty() {
        match tokio::time::timeout(CHANGE_LOCK_TIMEOUT, state.change_lock.lock()).await {
            Ok(_change) => {
                let mut cam = state.camera();
                apply_control(&mut cam, &delta);
            }
            Err(_) => warn!("Camera busy, skipping control request {delta:?}"),
        }
    }

    Json(state.camera().status())
}

/// Build the camera from the command line settings.
pub fn build_camera(args: &ServerArgs) -> anyhow::Result<PiCam> {
    let source: Arc<dyn FrameSource> = Arc::new(TestPatternSource::new(args.jpeg_quality));
    let mut cam = PiCam::new(
        CameraSettings::default(),
        source,
        Arc::new(MjpegBroadcaster::default()),
    );
    cam.set_framerate(args.framerate)?;
    cam.set_resolution(args.resolution)?;
    Ok(cam)
}

pub async fn run_server(cam: PiCam, args: ServerArgs) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(cam));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {e}"))?;

    info!("Starting server on http://{}", addr);
    info!("Control panel: http://{}/index.html", addr);
    info!("MJPEG stream: http://{}{}", addr, STREAM_PATH);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {e}"))?;

    Ok(())
}
