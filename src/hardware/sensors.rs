/// Instantaneous readings published by the external sensor drivers
use log::{debug, warn};
use std::path::PathBuf;

use crate::error::BoxError;
use crate::models::SensorReadings;

/// Source of the scalar readings polled once per reporting cycle.
pub trait SensorSuite {
    fn read(&mut self) -> Result<SensorReadings, BoxError>;
}

/// Reads a `KEY=value` snapshot file that the driver processes rewrite.
///
/// Recognised keys are `TEMPERATURE_C`, `HUMIDITY`, `PRESSURE_HPA`,
/// `UV_INDEX` and `VANE_VOLTS`. A missing or unparseable key leaves that
/// reading empty for the cycle.
#[derive(Debug, Clone)]
pub struct SnapshotFileSensors {
    path: PathBuf,
}

impl SnapshotFileSensors {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SensorSuite for SnapshotFileSensors {
    fn read(&mut self) -> Result<SensorReadings, BoxError> {
        let mut readings = SensorReadings::default();

        for entry in dotenv::from_path_iter(&self.path)? {
            let (key, raw) = entry?;
            let slot = match key.as_str() {
                "TEMPERATURE_C" => &mut readings.temperature,
                "HUMIDITY" => &mut readings.humidity,
                "PRESSURE_HPA" => &mut readings.pressure,
                "UV_INDEX" => &mut readings.uv_index,
                "VANE_VOLTS" => &mut readings.vane_volts,
                _ => {
                    debug!("Ignoring unknown snapshot key {}", key);
                    continue;
                }
            };

            match raw.trim().parse::<f64>() {
                Ok(value) => *slot = Some(value),
                Err(e) => warn!("Snapshot value {}={:?} unreadable: {}", key, raw, e),
            }
        }

        Ok(readings)
    }
}
