/// Process-wide station state, built once at startup and driven by the main loop
use log::{debug, info, warn};
use std::sync::Arc;
use time::OffsetDateTime;

use crate::config::StationConfig;
use crate::error::{StationError, StationResult};
use crate::hardware::{EdgeHandlers, SensorSuite, SnapshotFileSensors, VaneMonitor};
use crate::models::{SensorReadings, UploadResponse};
use crate::tracking::{DirectionTable, RainTracker, VoltageDivider, WindTracker};
use crate::upload::transport::{HttpTransport, Transport};
use crate::upload::{Endpoints, TelemetryRequest, Uploader};
use crate::utils::format_datetime;

pub struct Station<S, T = HttpTransport> {
    rain: Arc<RainTracker>,
    wind: Arc<WindTracker>,
    vane: Arc<VaneMonitor>,
    divider: VoltageDivider,
    sensors: S,
    uploader: Uploader<T>,
    cycles: u64,
}

impl Station<SnapshotFileSensors, HttpTransport> {
    pub fn from_config(config: &StationConfig) -> StationResult<Self> {
        let table = DirectionTable::from_pairs(config.vane_calibration.iter().copied())?;
        if table.is_empty() {
            return Err(StationError::configuration("wind vane calibration is empty"));
        }

        let wind = WindTracker::with_calibration(
            Arc::new(table),
            config.wind_window,
            config.distance_per_pulse,
        );

        let endpoints = Endpoints::new(&config.batch_endpoint, &config.realtime_endpoint)?;
        let mut uploader = Uploader::new(config.credentials.clone(), config.http_timeout)?
            .with_endpoints(endpoints);
        if config.realtime {
            uploader = uploader.use_realtime(config.update_interval.as_secs_f64());
        }
        info!("Upload mode: {:?}", uploader.mode());

        Ok(Station::new(
            RainTracker::with_tip_volume(config.rain_mm_per_tip),
            wind,
            config.vane_divider,
            SnapshotFileSensors::new(&config.snapshot_path),
            uploader,
        ))
    }
}

impl<S: SensorSuite, T: Transport> Station<S, T> {
    pub fn new(
        rain: RainTracker,
        wind: WindTracker,
        divider: VoltageDivider,
        sensors: S,
        uploader: Uploader<T>,
    ) -> Self {
        Self {
            rain: Arc::new(rain),
            wind: Arc::new(wind),
            vane: Arc::new(VaneMonitor::new()),
            divider,
            sensors,
            uploader,
            cycles: 0,
        }
    }

    /// Callbacks for the edge listener, sharing this station's trackers.
    pub fn edge_handlers(&self, rain_pin: u32, wind_pin: u32) -> EdgeHandlers {
        EdgeHandlers {
            rain: Arc::clone(&self.rain),
            wind: Arc::clone(&self.wind),
            vane: Arc::clone(&self.vane),
            rain_pin,
            wind_pin,
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn read_sensors(&mut self) -> SensorReadings {
        match self.sensors.read() {
            Ok(readings) => readings,
            Err(e) => {
                warn!("Sensor readings unavailable this cycle: {}", e);
                SensorReadings::default()
            }
        }
    }

    /// Vane resistance for this cycle's divider voltage.
    fn vane_resistance(&self, readings: &SensorReadings) -> Option<f64> {
        let volts = readings.vane_volts?;
        match self.divider.resistance(volts) {
            Some(ohms) => {
                debug!("Vane {:.3} V = {:.0} ohm", volts, ohms);
                Some(ohms)
            }
            None => {
                warn!("Vane voltage {:.3} V out of range, direction unknown", volts);
                None
            }
        }
    }

    /// Poll the sensors, refresh the vane reading for the pulse handler and
    /// assemble this cycle's request.
    pub fn build_request(&mut self) -> TelemetryRequest {
        let readings = self.read_sensors();
        self.vane.update(self.vane_resistance(&readings));

        let now = OffsetDateTime::now_utc();
        let rain = self.rain.get_past_hour();
        let wind = self.wind.snapshot(now);

        info!(
            "Readings at {}: rain {:.2} mm/h, wind {:.1} m/s from {}",
            format_datetime(&now),
            rain,
            wind.speed,
            wind.direction
                .map(|d| format!("{:.0}°", d))
                .unwrap_or_else(|| "-".to_string())
        );

        let mut request = self
            .uploader
            .start_request()
            .hourly_rain_mm(rain)
            .wind(&wind);

        if let Some(temperature) = readings.temperature {
            request = request.temperature_celsius(temperature);
        }
        if let Some(humidity) = readings.humidity {
            request = request.humidity(humidity);
        }
        if let Some(pressure) = readings.pressure {
            request = request.pressure_hpa(pressure);
        }
        if let Some(uv) = readings.uv_index {
            request = request.uv_index(uv);
        }

        request
    }

    /// One reporting cycle: read, aggregate, send.
    pub async fn run_cycle(&mut self) -> StationResult<UploadResponse> {
        self.cycles += 1;
        let request = self.build_request();
        self.uploader.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use std::sync::Mutex;
    use url::Url;

    struct FixedSensors(Option<SensorReadings>);

    impl SensorSuite for FixedSensors {
        fn read(&mut self) -> Result<SensorReadings, BoxError> {
            self.0.ok_or_else(|| "driver offline".into())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingTransport {
        urls: Arc<Mutex<Vec<Url>>>,
    }

    impl Transport for RecordingTransport {
        async fn get(&self, url: Url) -> Result<UploadResponse, BoxError> {
            self.urls.lock().unwrap().push(url);
            Ok(UploadResponse {
                status: 200,
                body: "success".into(),
            })
        }
    }

    fn station(
        sensors: FixedSensors,
        transport: RecordingTransport,
    ) -> Station<FixedSensors, RecordingTransport> {
        let uploader = Uploader::with_transport(
            crate::upload::StationCredentials {
                station_id: "KTEST1".into(),
                station_key: "secret".into(),
            },
            transport,
            Endpoints::wunderground().unwrap(),
        )
        .unwrap();

        Station::new(
            RainTracker::new(),
            WindTracker::new(Arc::new(DirectionTable::standard_vane())),
            VoltageDivider::default(),
            sensors,
            uploader,
        )
    }

    fn query(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[tokio::test]
    async fn cycle_uploads_readings_and_aggregates() {
        let transport = RecordingTransport::default();
        let mut station = station(
            FixedSensors(Some(SensorReadings {
                temperature: Some(25.0),
                humidity: Some(50.0),
                pressure: Some(1013.25),
                uv_index: Some(4.0),
                vane_volts: Some(1.65),
            })),
            transport.clone(),
        );
        let handlers = station.edge_handlers(16, 5);

        // First cycle calibrates the vane; the pulse after it inherits 45°
        station.run_cycle().await.unwrap();
        handlers.on_edge(16, OffsetDateTime::now_utc());
        handlers.on_edge(5, OffsetDateTime::now_utc());
        let response = station.run_cycle().await.unwrap();

        assert!(response.is_success());
        assert_eq!(station.cycles(), 2);

        let urls = transport.urls.lock().unwrap().clone();
        let second = &urls[1];
        assert_eq!(query(second, "tempf").as_deref(), Some("77.0"));
        assert_eq!(query(second, "humidity").as_deref(), Some("50.0"));
        assert_eq!(query(second, "baromin").as_deref(), Some("29.921"));
        assert_eq!(query(second, "UV").as_deref(), Some("4.0"));
        assert_eq!(query(second, "rainin").as_deref(), Some("0.011"));
        assert_eq!(query(second, "winddir").as_deref(), Some("45"));
        assert!(query(second, "dewptf").is_some());
        assert_eq!(query(&urls[0], "winddir"), None);
    }

    #[tokio::test]
    async fn sensor_outage_still_reports_aggregates() {
        let transport = RecordingTransport::default();
        let mut station = station(FixedSensors(None), transport.clone());

        station.run_cycle().await.unwrap();

        let urls = transport.urls.lock().unwrap().clone();
        assert_eq!(query(&urls[0], "tempf"), None);
        assert_eq!(query(&urls[0], "rainin").as_deref(), Some("0.000"));
        assert_eq!(query(&urls[0], "windspeedmph").as_deref(), Some("0.0"));
    }

    #[tokio::test]
    async fn invalid_reading_fails_the_cycle_without_upload() {
        let transport = RecordingTransport::default();
        let mut station = station(
            FixedSensors(Some(SensorReadings {
                pressure: Some(f64::NAN),
                ..Default::default()
            })),
            transport.clone(),
        );

        let err = station.run_cycle().await.unwrap_err();
        assert!(matches!(err, StationError::Validation(_)));
        assert!(transport.urls.lock().unwrap().is_empty());
    }

    #[test]
    fn from_config_builds_realtime_station() {
        let config = StationConfig::from_lookup(|key| match key {
            "STATION_ID" => Some("KTEST1".to_string()),
            "STATION_KEY" => Some("abc".to_string()),
            _ => None,
        })
        .unwrap();

        let station = Station::from_config(&config).unwrap();
        assert!(matches!(
            station.uploader.mode(),
            crate::upload::uploader::UploadMode::Realtime { .. }
        ));
        assert_eq!(station.cycles(), 0);
    }
}
