use std::time::Duration;

use picam_shared::{Action, ControlError, DeviceStatus, PicamClient, FRAMERATES};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::HtmlSelectElement;
use yew::prelude::*;

use crate::download;
use crate::indicators::{display_style, Indicators};
use crate::stream::{self, PHOTO_FILENAME};
use crate::sync::{self, Outcome, PlannedRequest, SessionMemory, Synchronizer, Viewport};

/// How long a failure banner stays on screen.
const ERROR_BANNER_MS: u32 = 4000;

/// Shown in the video element until the first stream load.
const PLACEHOLDER_SRC: &str =
    "data:image/gif;base64,R0lGODlhAQABAAAAACH5BAEKAAEALAAAAAABAAEAAAICTAEAOw==";

#[derive(Properties, PartialEq)]
pub struct PanelFrontendProps {
    /// Base URL of the live stream (`data-src` of the video element)
    pub stream_src: AttrValue,
    /// Frame rate selected when the page loads
    #[prop_or(FRAMERATES[0])]
    pub fps: u32,
    /// Per-request timeout in milliseconds
    #[prop_or(5000)]
    pub timeout_ms: u32,
}

pub struct PanelFrontend {
    client: PicamClient,
    sync: Synchronizer,
    fps: u32,
    frame_edge: Option<u32>,
    video_src: String,
    indicators: Indicators,
    error: Option<String>,
    error_timeout: Option<gloo_timers::callback::Timeout>,
    resize_listener: Option<Closure<dyn FnMut()>>,
}

pub enum Msg {
    /// Reconcile settings with the device, optionally with an action
    Synchronize(Option<Action>),
    FpsChanged(u32),
    ControlDone {
        request: PlannedRequest,
        result: Result<DeviceStatus, ControlError>,
    },
    CapturePhoto,
    PhotoDone(Result<(), String>),
    ClearError,
}

impl Component for PanelFrontend {
    type Message = Msg;
    type Properties = PanelFrontendProps;

    fn create(ctx: &Context<Self>) -> Self {
        let props = ctx.props();
        let client = PicamClient::for_web()
            .with_timeout(Duration::from_millis(u64::from(props.timeout_ms)));

        let link = ctx.link().clone();
        let resize_listener = Closure::<dyn FnMut()>::new(move || {
            link.send_message(Msg::Synchronize(None));
        });
        let resize_listener = match web_sys::window() {
            Some(window) => window
                .add_event_listener_with_callback("resize", resize_listener.as_ref().unchecked_ref())
                .ok()
                .map(|_| resize_listener),
            None => None,
        };

        // Initial load: push current settings and learn the device state
        ctx.link().send_message(Msg::Synchronize(None));

        Self {
            client,
            sync: Synchronizer::new(SessionMemory::new()),
            fps: props.fps,
            frame_edge: None,
            video_src: PLACEHOLDER_SRC.to_string(),
            indicators: Indicators::default(),
            error: None,
            error_timeout: None,
            resize_listener,
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            Msg::Synchronize(action) => {
                let Some(viewport) = current_viewport() else {
                    self.show_error(ctx, "Cannot read window size".to_string());
                    return true;
                };
                let Some(request) = self.sync.plan(self.fps, viewport, action) else {
                    return false;
                };

                let resized = request.frame_edge.is_some();
                if let Some(edge) = request.frame_edge {
                    self.frame_edge = Some(edge);
                }

                let client = self.client.clone();
                let link = ctx.link().clone();
                wasm_bindgen_futures::spawn_local(async move {
                    let result = sync::dispatch(&client, &request).await;
                    link.send_message(Msg::ControlDone { request, result });
                });
                resized
            }
            Msg::FpsChanged(fps) => {
                self.fps = fps;
                ctx.link().send_message(Msg::Synchronize(None));
                true
            }
            Msg::ControlDone { request, result } => match self.sync.resolve(&request, result) {
                Outcome::Applied {
                    status,
                    reload_stream,
                } => {
                    self.indicators.apply(&status);
                    if reload_stream {
                        self.video_src = stream::cache_busted(&ctx.props().stream_src, now_ms());
                    }
                    true
                }
                Outcome::Failed(err) => {
                    web_sys::console::warn_1(&format!("control request failed: {err}").into());
                    self.show_error(ctx, err.to_string());
                    true
                }
                Outcome::Superseded => false,
            },
            Msg::CapturePhoto => {
                let url = stream::photo_url(&ctx.props().stream_src, now_ms());
                let client = self.client.clone();
                let link = ctx.link().clone();
                wasm_bindgen_futures::spawn_local(async move {
                    let result = match client.fetch_bytes(&url).await {
                        Ok(bytes) => download::save_bytes(&bytes, PHOTO_FILENAME, "image/jpeg")
                            .map_err(|e| format!("{e:?}")),
                        Err(e) => Err(e.to_string()),
                    };
                    link.send_message(Msg::PhotoDone(result));
                });
                false
            }
            Msg::PhotoDone(Ok(())) => false,
            Msg::PhotoDone(Err(e)) => {
                web_sys::console::warn_1(&format!("photo capture failed: {e}").into());
                self.show_error(ctx, format!("Photo failed: {e}"));
                true
            }
            Msg::ClearError => {
                self.error = None;
                self.error_timeout = None;
                true
            }
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        let props = ctx.props();
        let link = ctx.link();
        let buttons = self.indicators.buttons;

        let on_fps = link.batch_callback(|e: Event| {
            let target: HtmlSelectElement = e.target_unchecked_into();
            target.value().parse::<u32>().ok().map(Msg::FpsChanged)
        });

        let frame_style = self.frame_edge.map(stream::frame_style).unwrap_or_default();
        let resolution = self
            .frame_edge
            .map(|edge| edge.to_string())
            .unwrap_or_default();

        html! {
            <div class="panel">
                if let Some(ref error) = self.error {
                    <div class="error-banner" onclick={link.callback(|_| Msg::ClearError)}>
                        {error.clone()}
                    </div>
                }
                <div id="video_frame" class="video-frame" style={frame_style}>
                    <img
                        id="video"
                        class="image-frame"
                        data-src={props.stream_src.clone()}
                        src={self.video_src.clone()}
                        alt="PiCam stream"
                    />
                </div>
                <div class="controls">
                    <button
                        id="record"
                        style={display_style(buttons.record_visible)}
                        onclick={link.callback(|_| Msg::Synchronize(Some(Action::Start)))}
                    >
                        {"Record"}
                    </button>
                    <button
                        id="stop"
                        style={display_style(buttons.stop_visible)}
                        onclick={link.callback(|_| Msg::Synchronize(Some(Action::Stop)))}
                    >
                        {"Stop"}
                    </button>
                    <button id="photo" onclick={link.callback(|_| Msg::CapturePhoto)}>
                        {"Photo"}
                    </button>
                    <button
                        id="rotate"
                        title="Rotate"
                        onclick={link.callback(|_| Msg::Synchronize(Some(Action::Rotate)))}
                    >
                        <span id="rotate_pointer">{self.indicators.rotation_glyph()}</span>
                    </button>
                    <button
                        id="light"
                        title="Light"
                        onclick={link.callback(|_| Msg::Synchronize(Some(Action::Light)))}
                    >
                        {self.indicators.light_glyph()}
                    </button>
                    <select name="fps" onchange={on_fps}>
                        { for FRAMERATES.iter().map(|fps| html! {
                            <option value={fps.to_string()} selected={*fps == self.fps}>
                                {format!("{fps} fps")}
                            </option>
                        })}
                    </select>
                    <input type="hidden" name="resolution" value={resolution} />
                </div>
            </div>
        }
    }

    fn destroy(&mut self, _ctx: &Context<Self>) {
        if let (Some(window), Some(listener)) = (web_sys::window(), self.resize_listener.take()) {
            let _ = window
                .remove_event_listener_with_callback("resize", listener.as_ref().unchecked_ref());
        }
        self.error_timeout = None;
    }
}

impl PanelFrontend {
    fn show_error(&mut self, ctx: &Context<Self>, message: String) {
        self.error = Some(message);
        let link = ctx.link().clone();
        self.error_timeout = Some(gloo_timers::callback::Timeout::new(
            ERROR_BANNER_MS,
            move || link.send_message(Msg::ClearError),
        ));
    }
}

fn current_viewport() -> Option<Viewport> {
    let window = web_sys::window()?;
    let width = window.inner_width().ok()?.as_f64()?;
    let height = window.inner_height().ok()?.as_f64()?;
    Some(Viewport::new(width as u32, height as u32))
}

fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}
