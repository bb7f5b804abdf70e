//! Browser download of in-memory files.

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Blob, Document, HtmlAnchorElement, HtmlElement, Url};

/// Delay before a download's object URL is revoked. Firefox and Safari
/// abort the download if it is revoked during the click.
const REVOKE_DELAY_MS: u32 = 1000;

/// Where transient download anchors are attached.
pub trait AnchorHost {
    type Anchor;
    type Error;

    fn create_anchor(&self, href: &str, filename: &str) -> Result<Self::Anchor, Self::Error>;
    fn append(&self, anchor: &Self::Anchor) -> Result<(), Self::Error>;
    fn click(&self, anchor: &Self::Anchor);
    fn remove(&self, anchor: &Self::Anchor) -> Result<(), Self::Error>;
}

/// Attach an `<a download>` for `href`, click it and detach it again.
pub fn trigger_download<H: AnchorHost>(
    host: &H,
    href: &str,
    filename: &str,
) -> Result<(), H::Error> {
    let anchor = host.create_anchor(href, filename)?;
    host.append(&anchor)?;
    host.click(&anchor);
    host.remove(&anchor)
}

/// The document body of the current page.
pub struct DocumentBody {
    document: Document,
    body: HtmlElement,
}

impl DocumentBody {
    pub fn current() -> Result<Self, JsValue> {
        let document = web_sys::window()
            .ok_or_else(|| JsValue::from_str("no global `window`"))?
            .document()
            .ok_or_else(|| JsValue::from_str("no document on window"))?;
        let body = document
            .body()
            .ok_or_else(|| JsValue::from_str("document has no body"))?;
        Ok(Self { document, body })
    }
}

impl AnchorHost for DocumentBody {
    type Anchor = HtmlAnchorElement;
    type Error = JsValue;

    fn create_anchor(&self, href: &str, filename: &str) -> Result<HtmlAnchorElement, JsValue> {
        let link: HtmlAnchorElement = self
            .document
            .create_element("a")?
            .dyn_into()
            .map_err(|_| JsValue::from_str("created element is not an anchor"))?;
        link.set_href(href);
        link.set_download(filename);
        Ok(link)
    }

    fn append(&self, anchor: &HtmlAnchorElement) -> Result<(), JsValue> {
        self.body.append_child(anchor).map(|_| ())
    }

    fn click(&self, anchor: &HtmlAnchorElement) {
        anchor.click();
    }

    fn remove(&self, anchor: &HtmlAnchorElement) -> Result<(), JsValue> {
        self.body.remove_child(anchor).map(|_| ())
    }
}

/// Offer `data` to the user as a file download.
pub fn save_bytes(data: &[u8], filename: &str, mime: &str) -> Result<(), JsValue> {
    let host = DocumentBody::current()?;
    let url = create_blob_url(data, mime)?;

    let result = trigger_download(&host, &url, filename);

    gloo_timers::callback::Timeout::new(REVOKE_DELAY_MS, move || {
        let _ = Url::revoke_object_url(&url);
    })
    .forget();

    result
}

/// Create a blob URL from raw bytes.
fn create_blob_url(data: &[u8], mime: &str) -> Result<String, JsValue> {
    let uint8_array = js_sys::Uint8Array::from(data);
    let array = js_sys::Array::new();
    array.push(&uint8_array);

    let options = web_sys::BlobPropertyBag::new();
    options.set_type(mime);

    let blob = Blob::new_with_u8_array_sequence_and_options(&array, &options)?;
    Url::create_object_url_with_blob(&blob)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::stream::PHOTO_FILENAME;

    #[derive(Debug, Clone, PartialEq)]
    struct FakeAnchor {
        href: String,
        download: String,
    }

    /// Records the anchor lifecycle and the elements currently attached.
    #[derive(Default)]
    struct FakeBody {
        calls: RefCell<Vec<String>>,
        attached: RefCell<Vec<FakeAnchor>>,
        fail_append: bool,
    }

    impl AnchorHost for FakeBody {
        type Anchor = FakeAnchor;
        type Error = String;

        fn create_anchor(&self, href: &str, filename: &str) -> Result<FakeAnchor, String> {
            self.calls.borrow_mut().push("create".to_string());
            Ok(FakeAnchor {
                href: href.to_string(),
                download: filename.to_string(),
            })
        }

        fn append(&self, anchor: &FakeAnchor) -> Result<(), String> {
            if self.fail_append {
                return Err("append refused".to_string());
            }
            self.calls.borrow_mut().push("append".to_string());
            self.attached.borrow_mut().push(anchor.clone());
            Ok(())
        }

        fn click(&self, anchor: &FakeAnchor) {
            self.calls
                .borrow_mut()
                .push(format!("click {} as {}", anchor.href, anchor.download));
        }

        fn remove(&self, anchor: &FakeAnchor) -> Result<(), String> {
            self.calls.borrow_mut().push("remove".to_string());
            self.attached.borrow_mut().retain(|a| a != anchor);
            Ok(())
        }
    }

    #[test]
    fn test_photo_download_leaves_no_anchor() {
        let body = FakeBody::default();
        trigger_download(&body, "blob:picam/1", PHOTO_FILENAME).unwrap();

        assert_eq!(
            *body.calls.borrow(),
            vec!["create", "append", "click blob:picam/1 as picam.jpeg", "remove"]
        );
        assert!(body.attached.borrow().is_empty());
    }

    #[test]
    fn test_failed_append_skips_click() {
        let body = FakeBody {
            fail_append: true,
            ..FakeBody::default()
        };
        let result = trigger_download(&body, "blob:picam/2", PHOTO_FILENAME);

        assert_eq!(result, Err("append refused".to_string()));
        assert_eq!(*body.calls.borrow(), vec!["create"]);
        assert!(body.attached.borrow().is_empty());
    }
}
