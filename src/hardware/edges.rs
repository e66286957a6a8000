/// Edge-event intake: parses the host's GPIO edge stream and dispatches
/// debounced rain tips and wind pulses to the trackers
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::hardware::vane::VaneMonitor;
use crate::tracking::{RainTracker, WindTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Falling,
    Rising,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeLine {
    pub kind: EdgeKind,
    pub offset: u32,
}

/// Parse one line of edge output.
///
/// Accepts the compact `gpiomon --format="%e %o"` form (`0 16`, where `0` is
/// a falling edge) and gpiomon's default
/// `event: FALLING EDGE offset: 16 timestamp: [...]` form.
pub fn parse_edge_line(line: &str) -> Option<EdgeLine> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix("event:") {
        let kind = if rest.contains("FALLING") {
            EdgeKind::Falling
        } else if rest.contains("RISING") {
            EdgeKind::Rising
        } else {
            return None;
        };
        let offset = rest
            .split_once("offset:")?
            .1
            .split_whitespace()
            .next()?
            .parse()
            .ok()?;
        return Some(EdgeLine { kind, offset });
    }

    let mut fields = line.split_whitespace();
    let kind = match fields.next()? {
        "0" => EdgeKind::Falling,
        "1" => EdgeKind::Rising,
        _ => return None,
    };
    let offset = fields.next()?.parse().ok()?;
    Some(EdgeLine { kind, offset })
}

/// Per-pin software debounce: edges closer than `period` to the last
/// accepted edge on the same pin are contact bounce.
#[derive(Debug)]
pub struct Debouncer {
    period: Duration,
    last_accepted: HashMap<u32, Instant>,
}

impl Debouncer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_accepted: HashMap::new(),
        }
    }

    pub fn accept(&mut self, pin: u32, at: Instant) -> bool {
        match self.last_accepted.get(&pin) {
            Some(&last) if at.saturating_duration_since(last) < self.period => false,
            _ => {
                self.last_accepted.insert(pin, at);
                true
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    Rain,
    Wind,
    Ignored,
}

/// The rain and wind callbacks. Each does one short append and returns.
#[derive(Clone)]
pub struct EdgeHandlers {
    pub rain: Arc<RainTracker>,
    pub wind: Arc<WindTracker>,
    pub vane: Arc<VaneMonitor>,
    pub rain_pin: u32,
    pub wind_pin: u32,
}

impl EdgeHandlers {
    pub fn on_edge(&self, pin: u32, timestamp: OffsetDateTime) -> EdgeOutcome {
        if pin == self.rain_pin {
            self.rain.record_tip(timestamp);
            EdgeOutcome::Rain
        } else if pin == self.wind_pin {
            match self.vane.current() {
                Some(ohms) => {
                    if let Err(e) = self.wind.record_pulse(timestamp, ohms) {
                        debug!("Wind pulse without bearing: {}", e);
                        self.wind.add_undirected_event(timestamp);
                    }
                }
                None => self.wind.add_undirected_event(timestamp),
            }
            EdgeOutcome::Wind
        } else {
            EdgeOutcome::Ignored
        }
    }
}

/// Consume edge lines until the stream closes.
///
/// # Arguments
/// * `reader` - Line-oriented edge stream (stdin in production)
/// * `handlers` - Tracker callbacks
/// * `debounce` - Minimum spacing between accepted edges per pin
///
/// # Returns
/// Number of edges dispatched to a tracker
pub async fn listen<R>(
    reader: R,
    handlers: EdgeHandlers,
    debounce: Duration,
) -> std::io::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut debouncer = Debouncer::new(debounce);
    let mut dispatched = 0u64;

    info!(
        "Listening for edges: rain pin {}, wind pin {}",
        handlers.rain_pin, handlers.wind_pin
    );

    while let Some(line) = lines.next_line().await? {
        let edge = match parse_edge_line(&line) {
            Some(edge) => edge,
            None => {
                if !line.trim().is_empty() {
                    warn!("Unrecognised edge line: {:?}", line);
                }
                continue;
            }
        };

        if edge.kind != EdgeKind::Falling {
            continue;
        }
        if !debouncer.accept(edge.offset, Instant::now()) {
            debug!("Debounced edge on pin {}", edge.offset);
            continue;
        }

        match handlers.on_edge(edge.offset, OffsetDateTime::now_utc()) {
            EdgeOutcome::Ignored => debug!("Edge on unmapped pin {}", edge.offset),
            outcome => {
                debug!("{:?} edge on pin {}", outcome, edge.offset);
                dispatched += 1;
            }
        }
    }

    Ok(dispatched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::DirectionTable;

    fn handlers() -> EdgeHandlers {
        EdgeHandlers {
            rain: Arc::new(RainTracker::new()),
            wind: Arc::new(WindTracker::new(Arc::new(DirectionTable::standard_vane()))),
            vane: Arc::new(VaneMonitor::new()),
            rain_pin: 16,
            wind_pin: 5,
        }
    }

    #[test]
    fn parses_compact_format() {
        assert_eq!(
            parse_edge_line("0 16"),
            Some(EdgeLine {
                kind: EdgeKind::Falling,
                offset: 16
            })
        );
        assert_eq!(parse_edge_line(" 1 5 \n").map(|e| e.kind), Some(EdgeKind::Rising));
        assert_eq!(parse_edge_line("2 16"), None);
        assert_eq!(parse_edge_line("0"), None);
    }

    #[test]
    fn parses_default_gpiomon_format() {
        let edge =
            parse_edge_line("event: FALLING EDGE offset: 16 timestamp: [1697040000.123456789]")
                .unwrap();
        assert_eq!(edge.kind, EdgeKind::Falling);
        assert_eq!(edge.offset, 16);
        assert_eq!(parse_edge_line("event: FALLING EDGE"), None);
    }

    #[test]
    fn debouncer_drops_bounces_per_pin() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let t0 = Instant::now();

        assert!(debouncer.accept(16, t0));
        assert!(!debouncer.accept(16, t0 + Duration::from_millis(40)));
        assert!(debouncer.accept(5, t0 + Duration::from_millis(40)));
        assert!(debouncer.accept(16, t0 + Duration::from_millis(100)));
    }

    #[test]
    fn wind_edge_uses_current_vane_reading() {
        let handlers = handlers();
        let now = OffsetDateTime::now_utc();

        handlers.vane.update(Some(2_200.0));
        assert_eq!(handlers.on_edge(5, now), EdgeOutcome::Wind);
        assert_eq!(handlers.on_edge(7, now), EdgeOutcome::Ignored);

        let snapshot = handlers.wind.snapshot(now);
        assert_eq!(snapshot.pulses, 1);
        assert!((snapshot.direction.unwrap() - 135.0).abs() < 1e-9);
    }

    #[test]
    fn wind_edge_without_vane_reading_counts_speed_only() {
        let handlers = handlers();
        let now = OffsetDateTime::now_utc();

        assert_eq!(handlers.on_edge(5, now), EdgeOutcome::Wind);

        let snapshot = handlers.wind.snapshot(now);
        assert_eq!(snapshot.pulses, 1);
        assert_eq!(snapshot.direction, None);
    }

    #[tokio::test]
    async fn listener_dispatches_debounced_falling_edges() {
        let handlers = handlers();
        let input: &[u8] = b"0 16\n0 16\n1 16\n0 5\nnoise\n0 9\n";

        let dispatched = listen(input, handlers.clone(), Duration::from_millis(100))
            .await
            .unwrap();

        assert_eq!(dispatched, 2);
        assert_eq!(handlers.rain.get_past_hour(), 0.2794);
        assert_eq!(handlers.wind.snapshot(OffsetDateTime::now_utc()).pulses, 1);
    }
}
