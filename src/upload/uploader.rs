/// Upload session: delivery mode, throttle clock and the network call
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::{sleep_until, Instant};
use url::Url;

use crate::error::{StationError, StationResult};
use crate::models::UploadResponse;
use crate::upload::request::{StationCredentials, TelemetryRequest};
use crate::upload::transport::{HttpTransport, Transport};
use crate::utils::format_dateutc;

pub const BATCH_ENDPOINT: &str =
    "https://weatherstation.wunderground.com/weatherstation/updateweatherstation.php";
pub const REALTIME_ENDPOINT: &str =
    "https://rtupdate.wunderground.com/weatherstation/updateweatherstation.php";

/// Shortest gap between realtime reports the upstream protocol accepts.
pub const REALTIME_MIN_INTERVAL: Duration = Duration::from_millis(2500);

const SOFTWARE_TYPE: &str = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UploadMode {
    Batch,
    Realtime { min_interval: Duration },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    pub batch: Url,
    pub realtime: Url,
}

impl Endpoints {
    pub fn new(batch: &str, realtime: &str) -> StationResult<Self> {
        let parse = |raw: &str| {
            Url::parse(raw).map_err(|e| {
                StationError::configuration(format!("invalid upload endpoint '{}': {}", raw, e))
            })
        };
        Ok(Self {
            batch: parse(batch)?,
            realtime: parse(realtime)?,
        })
    }

    pub fn wunderground() -> StationResult<Self> {
        Self::new(BATCH_ENDPOINT, REALTIME_ENDPOINT)
    }
}

/// Sends telemetry requests and owns the publish throttle.
///
/// The throttle clock only advances when a request actually reached the
/// endpoint and produced an HTTP response. Transport failures are returned
/// to the caller without retrying, so a retry on the next cycle is neither
/// delayed nor doubled up.
pub struct Uploader<T = HttpTransport> {
    credentials: Arc<StationCredentials>,
    transport: T,
    endpoints: Endpoints,
    mode: UploadMode,
    last_publish: Option<Instant>,
}

impl Uploader<HttpTransport> {
    pub fn new(credentials: StationCredentials, timeout: Duration) -> StationResult<Self> {
        let transport = HttpTransport::new(timeout)?;
        Self::with_transport(credentials, transport, Endpoints::wunderground()?)
    }
}

impl<T: Transport> Uploader<T> {
    pub fn with_transport(
        credentials: StationCredentials,
        transport: T,
        endpoints: Endpoints,
    ) -> StationResult<Self> {
        if credentials.station_id.trim().is_empty() || credentials.station_key.trim().is_empty() {
            return Err(StationError::configuration(
                "station id and station key must both be set",
            ));
        }

        Ok(Self {
            credentials: Arc::new(credentials),
            transport,
            endpoints,
            mode: UploadMode::Batch,
            last_publish: None,
        })
    }

    /// Switch to realtime delivery with at least `min_interval_secs` between
    /// reports. Values under the protocol floor, and values that are not a
    /// representable duration, fall back to the floor.
    pub fn use_realtime(mut self, min_interval_secs: f64) -> Self {
        let floor = REALTIME_MIN_INTERVAL.as_secs_f64();
        let min_interval = match Duration::try_from_secs_f64(min_interval_secs) {
            Ok(interval) if interval >= REALTIME_MIN_INTERVAL => interval,
            Ok(_) => {
                warn!(
                    "Realtime interval {}s below protocol minimum, using {}s",
                    min_interval_secs, floor
                );
                REALTIME_MIN_INTERVAL
            }
            Err(e) => {
                warn!(
                    "Realtime interval {}s is not a usable duration ({}), using {}s",
                    min_interval_secs, e, floor
                );
                REALTIME_MIN_INTERVAL
            }
        };

        self.mode = UploadMode::Realtime { min_interval };
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn mode(&self) -> UploadMode {
        self.mode
    }

    #[cfg(test)]
    pub fn last_publish(&self) -> Option<Instant> {
        self.last_publish
    }

    pub fn start_request(&self) -> TelemetryRequest {
        TelemetryRequest::new(Arc::clone(&self.credentials))
    }

    /// Full upload URL for `request`, including identity and mode parameters.
    /// `sent_at` becomes the observation time reported as `dateutc`.
    pub fn build_url(
        &self,
        request: &TelemetryRequest,
        sent_at: OffsetDateTime,
    ) -> StationResult<Url> {
        let payload = request.payload()?;
        let credentials = request.credentials();

        let mut url = match self.mode {
            UploadMode::Batch => self.endpoints.batch.clone(),
            UploadMode::Realtime { .. } => self.endpoints.realtime.clone(),
        };

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("ID", &credentials.station_id)
                .append_pair("PASSWORD", &credentials.station_key)
                .append_pair("dateutc", &format_dateutc(&sent_at));
            for (name, value) in &payload {
                query.append_pair(name, value);
            }
            query
                .append_pair("softwaretype", SOFTWARE_TYPE)
                .append_pair("action", "updateraw");
            if let UploadMode::Realtime { min_interval } = self.mode {
                query
                    .append_pair("realtime", "1")
                    .append_pair("rtfreq", &min_interval.as_secs_f64().to_string());
            }
        }

        Ok(url)
    }

    /// Wait out whatever remains of the realtime interval.
    async fn throttle(&self) {
        let (UploadMode::Realtime { min_interval }, Some(last)) = (self.mode, self.last_publish)
        else {
            return;
        };

        let ready_at = last + min_interval;
        let now = Instant::now();
        if now < ready_at {
            debug!("Throttling upload for {:?}", ready_at - now);
            sleep_until(ready_at).await;
        }
    }

    /// Validate, throttle and transmit one request.
    ///
    /// # Returns
    /// The endpoint's status and body for any HTTP response, accepted or not.
    /// `Validation` before any network activity, `Transport` when the endpoint
    /// could not be reached.
    pub async fn send(&mut self, request: TelemetryRequest) -> StationResult<UploadResponse> {
        // Validate before waiting so a bad request fails without delay
        request.validate()?;

        self.throttle().await;

        let url = self.build_url(&request, OffsetDateTime::now_utc())?;
        let endpoint = redact(&url);

        let started = Instant::now();
        let response = self
            .transport
            .get(url)
            .await
            .map_err(|source| StationError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;
        self.last_publish = Some(started);

        if response.is_success() {
            info!("Upload to {} accepted: {}", endpoint, response);
        } else {
            warn!("Upload to {} rejected: {}", endpoint, response);
        }

        Ok(response)
    }
}

/// Endpoint without the query string, safe to log.
fn redact(url: &Url) -> String {
    let mut bare = url.clone();
    bare.set_query(None);
    bare.to_string()
}
