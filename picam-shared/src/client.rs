//! HTTP client for the PiCam control endpoint.
//!
//! Works in both native Rust and WASM (panel) environments: requests go
//! through gloo-net in the browser and reqwest everywhere else. Every
//! request is bounded by the client's timeout and every non-2xx status is
//! reported as [`ControlError::ServerError`].

use std::time::Duration;

use crate::{ControlDelta, ControlError, DeviceStatus};

/// Path of the control endpoint.
pub const CONTROL_PATH: &str = "/control";

/// Request timeout used unless overridden with [`PicamClient::with_timeout`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the device control API.
#[derive(Debug, Clone)]
pub struct PicamClient {
    base_url: String,
    timeout: Duration,
    #[cfg(not(target_arch = "wasm32"))]
    http: reqwest::Client,
}

impl PicamClient {
    /// Create a new client pointing to the given base URL.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the device (e.g., "http://picam.local:8000")
    pub fn new(base_url: &str) -> Self {
        // Remove trailing slash if present
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            #[cfg(not(target_arch = "wasm32"))]
            http: build_http_client(DEFAULT_TIMEOUT),
        }
    }

    /// Create a client for same-origin web requests.
    ///
    /// Uses relative URLs (empty base) which works in WASM when the panel
    /// is served by the device itself. Panics if called outside WASM.
    pub fn for_web() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            Self::new("")
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            unreachable!("for_web() is only available in WASM builds")
        }
    }

    /// Replace the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.http = build_http_client(timeout);
        }
        self
    }

    /// Get the base URL this client is configured for.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Full URL of a control request for `delta`.
    pub fn control_url(&self, delta: &ControlDelta) -> String {
        let query = delta.to_query();
        if query.is_empty() {
            format!("{}{}", self.base_url, CONTROL_PATH)
        } else {
            format!("{}{}?{}", self.base_url, CONTROL_PATH, query)
        }
    }

    /// Send a delta to the control endpoint and return the validated status.
    pub async fn control(&self, delta: &ControlDelta) -> Result<DeviceStatus, ControlError> {
        let url = self.control_url(delta);
        let body = self.get_text(&url).await?;
        DeviceStatus::from_json(&body)
    }

    /// Query the current status without changing anything.
    pub async fn status(&self) -> Result<DeviceStatus, ControlError> {
        self.control(&ControlDelta::default()).await
    }

    /// Fetch a binary resource (e.g. a photo) from an absolute or
    /// same-origin URL.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ControlError> {
        self.get_bytes(url).await
    }

    // === Internal HTTP helpers ===

    #[cfg(not(target_arch = "wasm32"))]
    async fn get_checked(&self, url: &str) -> Result<reqwest::Response, ControlError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(ControlError::ServerError {
                status: status.as_u16(),
                message: response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string()),
            });
        }

        Ok(response)
    }

    #[cfg(not(target_arch = "wasm32"))]
    async fn get_text(&self, url: &str) -> Result<String, ControlError> {
        let response = self.get_checked(url).await?;
        Ok(response.text().await?)
    }

    #[cfg(not(target_arch = "wasm32"))]
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ControlError> {
        let response = self.get_checked(url).await?;
        Ok(response.bytes().await?.to_vec())
    }

    #[cfg(target_arch = "wasm32")]
    async fn get_checked(&self, url: &str) -> Result<gloo_net::http::Response, ControlError> {
        let response = gloo_net::http::Request::get(url).send().await?;

        if !response.ok() {
            return Err(ControlError::ServerError {
                status: response.status(),
                message: response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string()),
            });
        }

        Ok(response)
    }

    #[cfg(target_arch = "wasm32")]
    async fn get_text(&self, url: &str) -> Result<String, ControlError> {
        self.bounded(async {
            let response = self.get_checked(url).await?;
            Ok(response.text().await?)
        })
        .await
    }

    #[cfg(target_arch = "wasm32")]
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ControlError> {
        self.bounded(async {
            let response = self.get_checked(url).await?;
            Ok(response.binary().await?)
        })
        .await
    }

    /// Race `fut` against a browser timer.
    #[cfg(target_arch = "wasm32")]
    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, ControlError>>,
    ) -> Result<T, ControlError> {
        use futures::future::{select, Either};

        let millis = u32::try_from(self.timeout.as_millis()).unwrap_or(u32::MAX);
        let timer = gloo_timers::future::TimeoutFuture::new(millis);
        futures::pin_mut!(fut);

        match select(fut, timer).await {
            Either::Left((result, _)) => result,
            Either::Right(_) => Err(ControlError::Timeout),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
