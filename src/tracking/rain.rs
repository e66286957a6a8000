use log::debug;
use time::{Duration, OffsetDateTime};

use crate::models::{RainEvent, DEFAULT_RAIN_MM_PER_TIP};
use crate::tracking::window::EventWindow;

const RAIN_WINDOW: Duration = Duration::HOUR;

/// Trailing-hour rainfall accumulator fed by tipping-bucket events.
pub struct RainTracker {
    window: EventWindow<f64>,
    mm_per_tip: f64,
}

impl RainTracker {
    pub fn new() -> Self {
        Self::with_tip_volume(DEFAULT_RAIN_MM_PER_TIP)
    }

    pub fn with_tip_volume(mm_per_tip: f64) -> Self {
        Self {
            window: EventWindow::new(RAIN_WINDOW),
            mm_per_tip,
        }
    }

    pub fn register_rain(&self, event: RainEvent) {
        self.window.add(event.amount, event.timestamp);
    }

    /// Record one bucket tip using the configured per-tip volume.
    pub fn record_tip(&self, timestamp: OffsetDateTime) {
        debug!("Rain tip at {}", timestamp);
        self.register_rain(RainEvent::new(self.mm_per_tip, timestamp));
    }

    pub fn get_past_hour(&self) -> f64 {
        self.get_past_hour_at(OffsetDateTime::now_utc())
    }

    /// Millimetres of rain recorded in the hour ending at `now`.
    pub fn get_past_hour_at(&self, now: OffsetDateTime) -> f64 {
        self.window.sum_since(now, RAIN_WINDOW)
    }
}

impl Default for RainTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn only_the_trailing_hour_counts() {
        let tracker = RainTracker::new();
        let now = OffsetDateTime::now_utc();

        tracker.register_rain(RainEvent::new(0.2794, now - Duration::minutes(30)));
        tracker.register_rain(RainEvent::new(0.2794, now - Duration::minutes(90)));

        assert_eq!(tracker.get_past_hour_at(now), 0.2794);
    }

    #[test]
    fn recent_tip_is_visible_through_wall_clock_query() {
        let tracker = RainTracker::with_tip_volume(0.5);
        tracker.record_tip(OffsetDateTime::now_utc() - Duration::seconds(5));

        assert_eq!(tracker.get_past_hour(), 0.5);
    }

    #[test]
    fn no_rain_reports_zero() {
        assert_eq!(RainTracker::default().get_past_hour(), 0.0);
    }

    #[test]
    fn tips_from_another_thread_are_all_counted() {
        let tracker = Arc::new(RainTracker::with_tip_volume(0.5));
        let now = OffsetDateTime::now_utc();

        let handle = {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                for i in 0..100 {
                    tracker.record_tip(now - Duration::seconds(i));
                }
            })
        };
        while !handle.is_finished() {
            let partial = tracker.get_past_hour_at(now);
            assert!(partial <= 50.0);
        }
        handle.join().unwrap();

        assert_eq!(tracker.get_past_hour_at(now), 50.0);
    }
}
