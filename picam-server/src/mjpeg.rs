//! MJPEG streaming support for the camera feed.
//!
//! Frames are sent as a `multipart/x-mixed-replace` body where each part is
//! a separate JPEG. Browsers render this natively in an `<img>` element.
//!
//! A feed is finite: when recording stops the camera publishes one last
//! (blank) frame marked [`MjpegFrame::last`], and every open stream sends it
//! and then ends.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tokio::sync::broadcast::{self, error::RecvError};

/// Boundary string used to separate MJPEG frames.
pub const MJPEG_BOUNDARY: &str = "FRAME";

/// A frame ready for MJPEG streaming.
#[derive(Debug, Clone)]
pub struct MjpegFrame {
    /// JPEG-encoded image data
    pub jpeg_data: Bytes,
    /// Frame sequence number (for debugging/logging)
    pub frame_number: u64,
    /// Final frame of the feed; streams end after sending it
    pub last: bool,
}

/// Broadcaster for MJPEG frames to multiple HTTP clients.
///
/// Slow clients that fall behind skip frames.
pub struct MjpegBroadcaster {
    tx: broadcast::Sender<MjpegFrame>,
}

impl MjpegBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a new frame to all subscribers.
    ///
    /// Returns the number of active subscribers, or 0 if none.
    pub fn publish(&self, frame: MjpegFrame) -> usize {
        self.tx.send(frame).unwrap_or(0)
    }

    pub fn subscribe(&self) -> MjpegSubscriber {
        MjpegSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for MjpegBroadcaster {
    fn default() -> Self {
        Self::new(4)
    }
}

/// A subscriber to an MJPEG frame stream.
pub struct MjpegSubscriber {
    rx: broadcast::Receiver<MjpegFrame>,
}

impl MjpegSubscriber {
    /// Wait for the next frame, skipping any missed while lagging.
    ///
    /// Returns `None` once the broadcaster is gone.
    pub async fn recv(&mut self) -> Option<MjpegFrame> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => return Some(frame),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Convert this subscriber into a streaming response that ends after the
    /// feed's last frame.
    pub fn into_response(self) -> Response {
        let mut rx = self.rx;
        let stream = async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(frame) => {
                        let last = frame.last;
                        yield Ok::<_, std::convert::Infallible>(encode_part(&frame.jpeg_data));
                        if last {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        };

        multipart_response(Body::from_stream(stream))
    }
}

/// A complete MJPEG response containing exactly one frame.
pub fn single_frame_response(jpeg_data: &[u8]) -> Response {
    multipart_response(Body::from(encode_part(jpeg_data)))
}

/// A plain `image/jpeg` response.
pub fn jpeg_response(jpeg_data: Bytes) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "no-cache, private"),
        ],
        jpeg_data,
    )
        .into_response()
}

/// Format: boundary + headers + data
fn encode_part(jpeg_data: &[u8]) -> Bytes {
    let part = format!(
        "--{boundary}\r\n\
         Content-Type: image/jpeg\r\n\
         Content-Length: {len}\r\n\
         \r\n",
        boundary = MJPEG_BOUNDARY,
        len = jpeg_data.len()
    );

    let mut bytes = Vec::with_capacity(part.len() + jpeg_data.len() + 2);
    bytes.extend_from_slice(part.as_bytes());
    bytes.extend_from_slice(jpeg_data);
    bytes.extend_from_slice(b"\r\n");
    Bytes::from(bytes)
}

fn multipart_response(body: Body) -> Response {
    (
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                format!("multipart/x-mixed-replace; boundary={MJPEG_BOUNDARY}"),
            ),
            (header::AGE, "0".to_string()),
            (header::CACHE_CONTROL, "no-cache, private".to_string()),
            (header::PRAGMA, "no-cache".to_string()),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(number: u64, last: bool) -> MjpegFrame {
        MjpegFrame {
            jpeg_data: Bytes::from_static(b"jpeg"),
            frame_number: number,
            last,
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let broadcaster = MjpegBroadcaster::new(4);
        assert_eq!(broadcaster.publish(frame(1, false)), 0);
    }

    #[test]
    fn test_subscriber_count() {
        let broadcaster = MjpegBroadcaster::new(4);
        assert_eq!(broadcaster.subscriber_count(), 0);

        let sub1 = broadcaster.subscribe();
        let _sub2 = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        drop(sub1);
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[test]
    fn test_part_layout() {
        let part = encode_part(b"abc");
        assert_eq!(
            &part[..],
            b"--FRAME\r\nContent-Type: image/jpeg\r\nContent-Length: 3\r\n\r\nabc\r\n"
        );
    }

    #[tokio::test]
    async fn test_stream_ends_after_last_frame() {
        let broadcaster = MjpegBroadcaster::new(4);
        let response = broadcaster.subscribe().into_response();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "multipart/x-mixed-replace; boundary=FRAME"
        );

        broadcaster.publish(frame(1, false));
        broadcaster.publish(frame(2, true));
        broadcaster.publish(frame(3, false));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parts = body
            .windows(MJPEG_BOUNDARY.len() + 2)
            .filter(|w| *w == &b"--FRAME"[..])
            .count();
        assert_eq!(parts, 2);
    }

    #[tokio::test]
    async fn test_single_frame_response() {
        let response = single_frame_response(b"xyz");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], &encode_part(b"xyz")[..]);
    }
}
