/// Telemetry request builder and its wire serialization
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{StationError, StationResult};
use crate::models::WindSnapshot;
use crate::utils::{
    celsius_to_fahrenheit, dew_point_celsius, hpa_to_inhg, mm_to_inches, mps_to_mph,
};

/// Station identity sent with every upload. The key is never logged.
#[derive(Clone)]
pub struct StationCredentials {
    pub station_id: String,
    pub station_key: String,
}

impl std::fmt::Debug for StationCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StationCredentials")
            .field("station_id", &self.station_id)
            .field("station_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Metric {
    Temperature,
    Humidity,
    Pressure,
    UvIndex,
    HourlyRain,
    WindSpeed,
    WindDirection,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Pressure => "pressure",
            Metric::UvIndex => "uv index",
            Metric::HourlyRain => "hourly rain",
            Metric::WindSpeed => "wind speed",
            Metric::WindDirection => "wind direction",
        }
    }
}

/// One reporting cycle's worth of metrics.
///
/// Every setter is optional and overwrites any earlier value for the same
/// metric. Values are only checked when the request is sent, so a cycle can
/// be assembled from whatever readings happened to succeed.
#[derive(Debug, Clone)]
pub struct TelemetryRequest {
    credentials: Arc<StationCredentials>,
    fields: BTreeMap<Metric, f64>,
}

impl TelemetryRequest {
    pub(crate) fn new(credentials: Arc<StationCredentials>) -> Self {
        Self {
            credentials,
            fields: BTreeMap::new(),
        }
    }

    fn set(mut self, metric: Metric, value: f64) -> Self {
        self.fields.insert(metric, value);
        self
    }

    pub fn temperature_celsius(self, celsius: f64) -> Self {
        self.set(Metric::Temperature, celsius)
    }

    pub fn humidity(self, percent: f64) -> Self {
        self.set(Metric::Humidity, percent)
    }

    pub fn pressure_hpa(self, hpa: f64) -> Self {
        self.set(Metric::Pressure, hpa)
    }

    pub fn uv_index(self, index: f64) -> Self {
        self.set(Metric::UvIndex, index)
    }

    pub fn hourly_rain_mm(self, mm: f64) -> Self {
        self.set(Metric::HourlyRain, mm)
    }

    /// Speed always; direction only when the snapshot has one; otherwise
    /// any earlier direction is dropped.
    pub fn wind(mut self, snapshot: &WindSnapshot) -> Self {
        match snapshot.direction {
            Some(direction) => {
                self.fields.insert(Metric::WindDirection, direction);
            }
            None => {
                self.fields.remove(&Metric::WindDirection);
            }
        }
        self.set(Metric::WindSpeed, snapshot.speed)
    }

    #[cfg(test)]
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.fields.get(&metric).copied()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn credentials(&self) -> &StationCredentials {
        &self.credentials
    }

    /// Check every present value and return the cleaned set.
    ///
    /// Humidity is clamped to `[0, 100]`; every other metric outside its
    /// range is rejected.
    pub fn validate(&self) -> StationResult<BTreeMap<Metric, f64>> {
        let mut cleaned = BTreeMap::new();
        for (&metric, &value) in &self.fields {
            if !value.is_finite() {
                return Err(StationError::validation(format!(
                    "{} must be a finite number, got {}",
                    metric.name(),
                    value
                )));
            }

            let value = match metric {
                Metric::Humidity => value.clamp(0.0, 100.0),
                Metric::Temperature => check_range(metric, value, -90.0, 70.0)?,
                Metric::Pressure => check_range(metric, value, 300.0, 1100.0)?,
                Metric::UvIndex => check_range(metric, value, 0.0, 20.0)?,
                Metric::HourlyRain | Metric::WindSpeed => check_non_negative(metric, value)?,
                Metric::WindDirection => check_range(metric, value, 0.0, 360.0)?,
            };
            cleaned.insert(metric, value);
        }
        Ok(cleaned)
    }

    /// Validated metric fields in protocol units, without identity or
    /// delivery-mode parameters.
    pub fn payload(&self) -> StationResult<Vec<(&'static str, String)>> {
        let fields = self.validate()?;
        let mut payload = Vec::with_capacity(fields.len() + 1);

        for (&metric, &value) in &fields {
            let field = match metric {
                Metric::Temperature => ("tempf", format!("{:.1}", celsius_to_fahrenheit(value))),
                Metric::Humidity => ("humidity", format!("{:.1}", value)),
                Metric::Pressure => ("baromin", format!("{:.3}", hpa_to_inhg(value))),
                Metric::UvIndex => ("UV", format!("{:.1}", value)),
                Metric::HourlyRain => ("rainin", format!("{:.3}", mm_to_inches(value))),
                Metric::WindSpeed => ("windspeedmph", format!("{:.1}", mps_to_mph(value))),
                Metric::WindDirection => ("winddir", format!("{:.0}", value.round() % 360.0)),
            };
            payload.push(field);
        }

        if let (Some(&temperature), Some(&humidity)) =
            (fields.get(&Metric::Temperature), fields.get(&Metric::Humidity))
        {
            if let Some(dew_point) = dew_point_celsius(temperature, humidity) {
                payload.push(("dewptf", format!("{:.1}", celsius_to_fahrenheit(dew_point))));
            }
        }

        Ok(payload)
    }
}

fn check_range(metric: Metric, value: f64, min: f64, max: f64) -> StationResult<f64> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(StationError::validation(format!(
            "{} {} outside [{}, {}]",
            metric.name(),
            value,
            min,
            max
        )))
    }
}

fn check_non_negative(metric: Metric, value: f64) -> StationResult<f64> {
    if value >= 0.0 {
        Ok(value)
    } else {
        Err(StationError::validation(format!(
            "{} {} must not be negative",
            metric.name(),
            value
        )))
    }
}
