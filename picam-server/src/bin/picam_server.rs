//! PiCam camera server with the embedded control panel.

use anyhow::Context;
use clap::Parser;
use picam_server::embedded_assets::panel_embedded;
use picam_server::{build_camera, run_server, ServerArgs};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Camera server with MJPEG streaming and a web control panel")]
struct Args {
    #[command(flatten)]
    server: ServerArgs,

    #[arg(long, help = "Start recording immediately")]
    record: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    if !panel_embedded() {
        warn!(
            "Control panel assets were not embedded at build time; \
             run `trunk build --release` in picam-panel and rebuild"
        );
    }

    info!(
        "Initializing camera ({} fps, {}px)",
        args.server.framerate, args.server.resolution
    );
    let mut camera = build_camera(&args.server).context("Invalid camera settings")?;

    if args.record {
        camera.start();
    }

    run_server(camera, args.server).await
}
