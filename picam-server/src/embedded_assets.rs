//! Embedded panel assets.
//!
//! The trunk build of `picam-panel` is compiled into the server binary with
//! `rust-embed`, so the server has no runtime dependency on frontend files.
//! A server built before the panel still runs; asset requests then fail.

use axum::{
    body::Body,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

/// Embedded assets for the control panel.
#[derive(RustEmbed)]
#[folder = "../picam-panel/dist"]
#[allow_missing = true]
pub struct PanelAssets;

const INDEX: &str = "index.html";

/// Whether the panel was built before this binary.
pub fn panel_embedded() -> bool {
    PanelAssets::get(INDEX).is_some()
}

/// Serve an embedded asset by request path; unknown paths are 404.
pub async fn serve_panel_asset(uri: Uri) -> Response {
    serve_embedded::<PanelAssets>(&uri)
}

fn serve_embedded<T: RustEmbed>(uri: &Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    match T::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref())],
                Body::from(content.data.to_vec()),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "Asset not found").into_response(),
    }
}

/// Serve the panel page with the stream location and frame rate injected
/// as `data-*` attributes on the app element.
pub fn serve_panel_index(stream_src: &str, fps: u32) -> Response {
    serve_index_with_data::<PanelAssets>(&format!(
        r#"data-src="{stream_src}" data-fps="{fps}""#
    ))
}

fn serve_index_with_data<T: RustEmbed>(data_attrs: &str) -> Response {
    match T::get(INDEX) {
        Some(content) => {
            let html = String::from_utf8_lossy(&content.data);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html")],
                Body::from(inject_app_data(&html, data_attrs)),
            )
                .into_response()
        }
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Control panel not built; run `trunk build --release` in picam-panel",
        )
            .into_response(),
    }
}

/// Replace `<div id="app">` with `<div id="app" {data_attrs}>`.
pub fn inject_app_data(html: &str, data_attrs: &str) -> String {
    html.replace(
        r#"<div id="app">"#,
        &format!(r#"<div id="app" {data_attrs}>"#),
    )
}
