use log::debug;
use std::future::Future;
use std::time::Duration;
use url::Url;

use crate::error::{BoxError, StationError, StationResult};
use crate::models::UploadResponse;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// One network round-trip to the upload endpoint.
///
/// Implementations report only transport-level failures as errors; any HTTP
/// status, including rejections, comes back as an `UploadResponse`.
pub trait Transport {
    fn get(&self, url: Url) -> impl Future<Output = Result<UploadResponse, BoxError>> + Send;
}

/// reqwest-backed transport with bounded connect and request timeouts.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> StationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StationError::configuration(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: Url) -> Result<UploadResponse, BoxError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!("Upload endpoint answered {} ({} bytes)", status, body.len());

        Ok(UploadResponse { status, body })
    }
}
