use std::sync::atomic::{AtomicU64, Ordering};

/// Last measured vane resistance in ohms, shared lock-free between the
/// polling loop (writer) and the wind pulse handler (reader).
#[derive(Debug)]
pub struct VaneMonitor {
    bits: AtomicU64,
}

impl VaneMonitor {
    pub fn new() -> Self {
        Self {
            bits: AtomicU64::new(f64::NAN.to_bits()),
        }
    }

    pub fn update(&self, ohms: Option<f64>) {
        let value = ohms.filter(|r| r.is_finite()).unwrap_or(f64::NAN);
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    pub fn current(&self) -> Option<f64> {
        let value = f64::from_bits(self.bits.load(Ordering::Acquire));
        (!value.is_nan()).then_some(value)
    }
}

impl Default for VaneMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown_and_tracks_updates() {
        let vane = VaneMonitor::new();
        assert_eq!(vane.current(), None);

        vane.update(Some(16_000.0));
        assert_eq!(vane.current(), Some(16_000.0));

        vane.update(None);
        assert_eq!(vane.current(), None);

        vane.update(Some(f64::INFINITY));
        assert_eq!(vane.current(), None);
    }
}
