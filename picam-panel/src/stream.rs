//! Stream and photo URL helpers.

/// File name offered for downloaded photos.
pub const PHOTO_FILENAME: &str = "picam.jpeg";

fn separator(base: &str) -> char {
    if base.contains('?') {
        '&'
    } else {
        '?'
    }
}

/// Stream URL with a timestamp appended so the browser cannot serve a
/// cached copy.
pub fn cache_busted(base: &str, timestamp_ms: u64) -> String {
    format!("{base}{}{timestamp_ms}", separator(base))
}

/// URL requesting a single still image from the stream endpoint.
pub fn photo_url(base: &str, timestamp_ms: u64) -> String {
    format!("{base}{}mode=photo&t={timestamp_ms}", separator(base))
}

/// Inline style for the square video frame.
pub fn frame_style(edge: u32) -> String {
    format!("width: {edge}px; height: {edge}px;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_busted() {
        assert_eq!(
            cache_busted("/stream.mjpg", 1699999999999),
            "/stream.mjpg?1699999999999"
        );
        assert_ne!(cache_busted("/stream.mjpg", 1), cache_busted("/stream.mjpg", 2));
    }

    #[test]
    fn test_cache_busted_keeps_existing_query() {
        assert_eq!(cache_busted("/stream.mjpg?cam=0", 7), "/stream.mjpg?cam=0&7");
    }

    #[test]
    fn test_photo_url() {
        assert_eq!(
            photo_url("/stream.mjpg", 1699999999999),
            "/stream.mjpg?mode=photo&t=1699999999999"
        );
    }

    #[test]
    fn test_frame_style() {
        assert_eq!(frame_style(480), "width: 480px; height: 480px;");
    }
}
