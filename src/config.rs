use log::{info, warn};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{StationError, StationResult};
use crate::models::DEFAULT_RAIN_MM_PER_TIP;
use crate::tracking::direction::{VoltageDivider, DEFAULT_VANE_CALIBRATION};
use crate::tracking::wind::{DEFAULT_DISTANCE_PER_PULSE_M, DEFAULT_WIND_WINDOW};
use crate::upload::uploader::{BATCH_ENDPOINT, REALTIME_ENDPOINT, REALTIME_MIN_INTERVAL};
use crate::upload::StationCredentials;

const DEFAULT_RAIN_PIN: u32 = 16;
const DEFAULT_WIND_PIN: u32 = 5;
const DEFAULT_DEBOUNCE_MS: u64 = 100;
const DEFAULT_HTTP_TIMEOUT_SECS: f64 = 10.0;
const DEFAULT_SNAPSHOT_PATH: &str = "/run/weather-station/readings.env";

#[derive(Debug, Clone)]
pub struct StationConfig {
    pub credentials: StationCredentials,
    pub update_interval: Duration,
    pub realtime: bool,
    pub http_timeout: Duration,
    pub batch_endpoint: String,
    pub realtime_endpoint: String,
    pub rain_pin: u32,
    pub wind_pin: u32,
    pub debounce: Duration,
    pub rain_mm_per_tip: f64,
    pub wind_window: time::Duration,
    pub distance_per_pulse: f64,
    pub vane_calibration: Vec<(f64, f64)>,
    pub vane_divider: VoltageDivider,
    pub snapshot_path: PathBuf,
}

impl StationConfig {
    pub fn new() -> StationResult<Self> {
        // Load environment variables
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the process environment
    /// in production).
    pub fn from_lookup<F>(lookup: F) -> StationResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    StationError::configuration(format!("{} environment variable not set", key))
                })
        };

        let credentials = StationCredentials {
            station_id: required("STATION_ID")?,
            station_key: required("STATION_KEY")?,
        };

        let floor = REALTIME_MIN_INTERVAL.as_secs_f64();
        let mut update_secs: f64 = parse_or(&lookup, "UPDATE_FREQ", floor)?;
        if !update_secs.is_finite() || update_secs < floor {
            warn!(
                "UPDATE_FREQ {} is below the protocol minimum, using {}",
                update_secs, floor
            );
            update_secs = floor;
        }

        let http_timeout_secs: f64 =
            parse_or(&lookup, "HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        let http_timeout = Duration::try_from_secs_f64(http_timeout_secs)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .ok_or_else(|| {
                StationError::configuration(format!(
                    "HTTP_TIMEOUT_SECS must be a positive number of seconds, got {}",
                    http_timeout_secs
                ))
            })?;

        let wind_window_secs: i64 =
            parse_or(&lookup, "WIND_WINDOW_SECS", DEFAULT_WIND_WINDOW.whole_seconds())?;
        if wind_window_secs <= 0 {
            return Err(StationError::configuration("WIND_WINDOW_SECS must be positive"));
        }

        let vane_calibration = match lookup("VANE_CALIBRATION") {
            Some(raw) => parse_calibration(&raw)?,
            None => DEFAULT_VANE_CALIBRATION.to_vec(),
        };

        let update_interval = Duration::try_from_secs_f64(update_secs).map_err(|e| {
            StationError::configuration(format!(
                "UPDATE_FREQ {} is not a usable interval: {}",
                update_secs, e
            ))
        })?;

        let config = StationConfig {
            credentials,
            update_interval,
            realtime: parse_or(&lookup, "REALTIME", true)?,
            http_timeout,
            batch_endpoint: lookup("UPLOAD_URL").unwrap_or_else(|| BATCH_ENDPOINT.to_string()),
            realtime_endpoint: lookup("REALTIME_UPLOAD_URL")
                .unwrap_or_else(|| REALTIME_ENDPOINT.to_string()),
            rain_pin: parse_or(&lookup, "RAIN_PIN", DEFAULT_RAIN_PIN)?,
            wind_pin: parse_or(&lookup, "WIND_PIN", DEFAULT_WIND_PIN)?,
            debounce: Duration::from_millis(parse_or(
                &lookup,
                "DEBOUNCE_MS",
                DEFAULT_DEBOUNCE_MS,
            )?),
            rain_mm_per_tip: parse_positive(&lookup, "RAIN_MM_PER_TIP", DEFAULT_RAIN_MM_PER_TIP)?,
            wind_window: time::Duration::seconds(wind_window_secs),
            distance_per_pulse: parse_positive(
                &lookup,
                "WIND_DISTANCE_PER_PULSE_M",
                DEFAULT_DISTANCE_PER_PULSE_M,
            )?,
            vane_calibration,
            vane_divider: VoltageDivider::new(
                parse_positive(&lookup, "VANE_REFERENCE_VOLTS", 3.3)?,
                parse_positive(&lookup, "VANE_FIXED_OHMS", 10_000.0)?,
            ),
            snapshot_path: lookup("SENSOR_SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_PATH)),
        };

        if config.rain_pin == config.wind_pin {
            return Err(StationError::configuration(format!(
                "RAIN_PIN and WIND_PIN both set to {}",
                config.rain_pin
            )));
        }

        info!(
            "Station {} configured: update every {:.1}s, {} mode, rain pin {}, wind pin {}",
            config.credentials.station_id,
            config.update_interval.as_secs_f64(),
            if config.realtime { "realtime" } else { "batch" },
            config.rain_pin,
            config.wind_pin
        );

        Ok(config)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> StationResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|e| {
            StationError::configuration(format!("invalid value '{}' for {}: {}", raw, key, e))
        }),
        _ => Ok(default),
    }
}

/// Like [`parse_or`] for physical constants that must be finite and > 0.
fn parse_positive<F>(lookup: &F, key: &str, default: f64) -> StationResult<f64>
where
    F: Fn(&str) -> Option<String>,
{
    let value: f64 = parse_or(lookup, key, default)?;
    if !value.is_finite() || value <= 0.0 {
        return Err(StationError::configuration(format!(
            "{} must be a positive number, got {}",
            key, value
        )));
    }
    Ok(value)
}

/// Parse `angle:ohms` pairs separated by commas, e.g. `0:33000,22.5:6570`.
fn parse_calibration(raw: &str) -> StationResult<Vec<(f64, f64)>> {
    let mut pairs = Vec::new();
    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (angle, ohms) = pair.split_once(':').ok_or_else(|| {
            StationError::configuration(format!("calibration entry '{}' is not angle:ohms", pair))
        })?;
        let parse = |value: &str| {
            value.trim().parse::<f64>().map_err(|e| {
                StationError::configuration(format!("calibration entry '{}': {}", pair, e))
            })
        };
        pairs.push((parse(angle)?, parse(ohms)?));
    }

    if pairs.is_empty() {
        return Err(StationError::configuration("VANE_CALIBRATION has no entries"));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_credentials_are_set() {
        let config =
            StationConfig::from_lookup(lookup(&[("STATION_ID", "KTEST1"), ("STATION_KEY", "abc")]))
                .unwrap();

        assert_eq!(config.credentials.station_id, "KTEST1");
        assert_eq!(config.update_interval, Duration::from_millis(2500));
        assert!(config.realtime);
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.rain_pin, 16);
        assert_eq!(config.debounce, Duration::from_millis(100));
        assert_eq!(config.rain_mm_per_tip, 0.2794);
        assert_eq!(config.vane_calibration.len(), 16);
        assert_eq!(config.batch_endpoint, BATCH_ENDPOINT);
    }

    #[test]
    fn missing_credentials_are_fatal() {
        let err = StationConfig::from_lookup(lookup(&[("STATION_ID", "KTEST1")])).unwrap_err();
        assert!(err.is_fatal());
        let err = StationConfig::from_lookup(lookup(&[("STATION_ID", " "), ("STATION_KEY", "k")]))
            .unwrap_err();
        assert!(matches!(err, StationError::Configuration(_)));
    }

    #[test]
    fn update_frequency_is_floored() {
        let config = StationConfig::from_lookup(lookup(&[
            ("STATION_ID", "KTEST1"),
            ("STATION_KEY", "abc"),
            ("UPDATE_FREQ", "1"),
        ]))
        .unwrap();
        assert_eq!(config.update_interval, Duration::from_millis(2500));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = StationConfig::from_lookup(lookup(&[
            ("STATION_ID", "KTEST1"),
            ("STATION_KEY", "abc"),
            ("UPDATE_FREQ", "16"),
            ("REALTIME", "false"),
            ("HTTP_TIMEOUT_SECS", "2.5"),
            ("WIND_PIN", "6"),
            ("VANE_CALIBRATION", "0:100, 180:200"),
            ("UPLOAD_URL", "http://127.0.0.1:8080/update"),
        ]))
        .unwrap();

        assert_eq!(config.update_interval, Duration::from_secs(16));
        assert!(!config.realtime);
        assert_eq!(config.http_timeout, Duration::from_millis(2500));
        assert_eq!(config.wind_pin, 6);
        assert_eq!(config.vane_calibration, vec![(0.0, 100.0), (180.0, 200.0)]);
        assert_eq!(config.batch_endpoint, "http://127.0.0.1:8080/update");
    }

    #[test]
    fn malformed_values_are_rejected() {
        for (key, value) in [
            ("RAIN_PIN", "sixteen"),
            ("HTTP_TIMEOUT_SECS", "0"),
            ("WIND_WINDOW_SECS", "-5"),
            ("VANE_CALIBRATION", "0-100"),
            ("WIND_PIN", "16"),
            ("UPDATE_FREQ", "1e20"),
            ("RAIN_MM_PER_TIP", "-0.2794"),
            ("RAIN_MM_PER_TIP", "NaN"),
            ("WIND_DISTANCE_PER_PULSE_M", "-0.2794"),
            ("WIND_DISTANCE_PER_PULSE_M", "inf"),
            ("VANE_REFERENCE_VOLTS", "0"),
            ("VANE_REFERENCE_VOLTS", "NaN"),
            ("VANE_FIXED_OHMS", "-10000"),
        ] {
            let result = StationConfig::from_lookup(lookup(&[
                ("STATION_ID", "KTEST1"),
                ("STATION_KEY", "abc"),
                (key, value),
            ]));
            assert!(
                matches!(result, Err(StationError::Configuration(_))),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }
}
