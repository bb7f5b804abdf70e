/// Error type for control endpoint operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(String),
    /// Response body did not match the device status schema
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// Connection failed
    #[error("Connection error: {0}")]
    Connection(String),
    /// Request timed out
    #[error("Timeout")]
    Timeout,
    /// Server returned an error status
    #[error("Server error (status {status}): {message}")]
    ServerError { status: u16, message: String },
}

#[cfg(target_arch = "wasm32")]
impl From<gloo_net::Error> for ControlError {
    fn from(err: gloo_net::Error) -> Self {
        match err {
            gloo_net::Error::SerdeError(e) => ControlError::MalformedResponse(e.to_string()),
            other => ControlError::Http(other.to_string()),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl From<reqwest::Error> for ControlError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ControlError::Timeout
        } else if err.is_connect() {
            ControlError::Connection(err.to_string())
        } else if err.is_decode() {
            ControlError::MalformedResponse(err.to_string())
        } else {
            ControlError::Http(err.to_string())
        }
    }
}
