use picam_panel::PanelFrontend;
use picam_shared::FRAMERATES;
use yew::prelude::*;

#[function_component(App)]
fn app() -> Html {
    let window = web_sys::window().expect("no global `window` exists");
    let document = window.document().expect("should have a document on window");
    let app_el = document.get_element_by_id("app");

    let stream_src = app_el
        .as_ref()
        .and_then(|el| el.get_attribute("data-src"))
        .unwrap_or_else(|| "/stream.mjpg".to_string());

    let fps: u32 = app_el
        .as_ref()
        .and_then(|el| el.get_attribute("data-fps"))
        .and_then(|f| f.parse().ok())
        .filter(|f| FRAMERATES.contains(f))
        .unwrap_or(FRAMERATES[0]);

    html! {
        <PanelFrontend stream_src={AttrValue::from(stream_src)} {fps} />
    }
}

fn main() {
    yew::Renderer::<App>::new().render();
}
