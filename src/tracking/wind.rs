use log::debug;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

use crate::error::StationResult;
use crate::models::{WindSample, WindSnapshot};
use crate::tracking::direction::DirectionTable;
use crate::tracking::window::EventWindow;
use crate::utils::{circular_mean, normalize_degrees};

/// Anemometer travel per switch closure: one closure per second is 2.4 km/h.
pub const DEFAULT_DISTANCE_PER_PULSE_M: f64 = 2.4 / 3.6;
pub const DEFAULT_WIND_WINDOW: Duration = Duration::MINUTE;

/// Rolling wind speed and direction built from anemometer pulses.
///
/// Each pulse carries the vane bearing read at the moment it fired, so the
/// averaged direction is weighted by wind run rather than by wall time.
/// Pulses recorded before any vane reading count towards speed only.
pub struct WindTracker {
    table: Arc<DirectionTable>,
    samples: EventWindow<Option<f64>>,
    window: Duration,
    distance_per_pulse: f64,
}

impl WindTracker {
    #[cfg(test)]
    pub fn new(table: Arc<DirectionTable>) -> Self {
        Self::with_calibration(table, DEFAULT_WIND_WINDOW, DEFAULT_DISTANCE_PER_PULSE_M)
    }

    pub fn with_calibration(
        table: Arc<DirectionTable>,
        window: Duration,
        distance_per_pulse: f64,
    ) -> Self {
        Self {
            table,
            samples: EventWindow::new(window),
            window,
            distance_per_pulse,
        }
    }

    pub fn add_event(&self, timestamp: OffsetDateTime, direction: f64) {
        let sample = WindSample {
            timestamp,
            direction: normalize_degrees(direction),
        };
        self.samples.push(sample.timestamp, Some(sample.direction));
    }

    /// Record a pulse whose vane bearing is unknown.
    pub fn add_undirected_event(&self, timestamp: OffsetDateTime) {
        self.samples.push(timestamp, None);
    }

    /// Translate the vane resistance through the calibration table and record
    /// the pulse.
    pub fn record_pulse(&self, timestamp: OffsetDateTime, resistance: f64) -> StationResult<f64> {
        let direction = self.table.get_direction(resistance)?;
        debug!("Wind pulse at {}: {:.0} ohm -> {}°", timestamp, resistance, direction);
        self.add_event(timestamp, direction);
        Ok(direction)
    }

    pub fn snapshot(&self, now: OffsetDateTime) -> WindSnapshot {
        let (pulses, directions) = self.samples.fold_since(
            now,
            self.window,
            (0usize, Vec::<f64>::new()),
            |(pulses, mut directions), &direction| {
                directions.extend(direction);
                (pulses + 1, directions)
            },
        );

        if pulses == 0 {
            return WindSnapshot::calm();
        }

        let window_secs = self.window.as_seconds_f64();
        let speed = if window_secs > 0.0 {
            pulses as f64 * self.distance_per_pulse / window_secs
        } else {
            0.0
        };

        WindSnapshot {
            speed,
            direction: circular_mean(directions),
            pulses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> WindTracker {
        WindTracker::with_calibration(
            Arc::new(DirectionTable::standard_vane()),
            Duration::seconds(10),
            1.0,
        )
    }

    #[test]
    fn no_pulses_means_calm_and_no_direction() {
        let snapshot = tracker().snapshot(OffsetDateTime::now_utc());
        assert_eq!(snapshot.speed, 0.0);
        assert_eq!(snapshot.direction, None);
        assert_eq!(snapshot.pulses, 0);
    }

    #[test]
    fn speed_is_pulse_rate_times_distance() {
        let wind = tracker();
        let now = OffsetDateTime::now_utc();
        for i in 0..20 {
            wind.add_event(now - Duration::milliseconds(i * 400), 90.0);
        }
        // Outside the 10 s window
        wind.add_event(now - Duration::seconds(30), 90.0);

        let snapshot = wind.snapshot(now);
        assert_eq!(snapshot.pulses, 20);
        assert!((snapshot.speed - 2.0).abs() < 1e-9);
        assert!((snapshot.direction.unwrap() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn direction_averages_across_north() {
        let wind = tracker();
        let now = OffsetDateTime::now_utc();
        wind.add_event(now - Duration::seconds(2), 350.0);
        wind.add_event(now - Duration::seconds(1), 10.0);

        let direction = wind.snapshot(now).direction.unwrap();
        assert!(direction < 1e-6 || direction > 360.0 - 1e-6, "got {direction}");
    }

    #[test]
    fn pulses_age_out_of_the_window() {
        let wind = tracker();
        let start = OffsetDateTime::now_utc();
        wind.add_event(start, 180.0);

        assert_eq!(wind.snapshot(start).pulses, 1);
        assert_eq!(wind.snapshot(start + Duration::seconds(11)), WindSnapshot::calm());
    }

    #[test]
    fn record_pulse_uses_calibration() {
        let wind = tracker();
        let now = OffsetDateTime::now_utc();
        assert_eq!(wind.record_pulse(now, 3_900.0).unwrap(), 180.0);

        let snapshot = wind.snapshot(now);
        assert!((snapshot.direction.unwrap() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn undirected_pulses_count_towards_speed_only() {
        let wind = tracker();
        let now = OffsetDateTime::now_utc();
        wind.add_undirected_event(now - Duration::seconds(1));
        wind.add_undirected_event(now - Duration::seconds(2));

        let snapshot = wind.snapshot(now);
        assert_eq!(snapshot.pulses, 2);
        assert!((snapshot.speed - 0.2).abs() < 1e-9);
        assert_eq!(snapshot.direction, None);

        wind.add_event(now, 45.0);
        assert!((wind.snapshot(now).direction.unwrap() - 45.0).abs() < 1e-9);
    }

    #[test]
    fn record_pulse_with_empty_table_fails() {
        let wind = WindTracker::new(Arc::new(DirectionTable::new()));
        assert!(wind.record_pulse(OffsetDateTime::now_utc(), 1_000.0).is_err());
        assert_eq!(wind.snapshot(OffsetDateTime::now_utc()).pulses, 0);
    }
}
