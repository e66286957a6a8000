/// Wind-vane calibration: nearest-resistance lookup and the divider maths
use crate::error::{StationError, StationResult};

/// Resistance of the common 8-reed-switch wind vane at each of its 16
/// positions, from the manufacturer's datasheet. Adjacent switches closing
/// together give the half-step bearings.
pub const DEFAULT_VANE_CALIBRATION: [(f64, f64); 16] = [
    (0.0, 33_000.0),
    (22.5, 6_570.0),
    (45.0, 8_200.0),
    (67.5, 891.0),
    (90.0, 1_000.0),
    (112.5, 688.0),
    (135.0, 2_200.0),
    (157.5, 1_410.0),
    (180.0, 3_900.0),
    (202.5, 3_140.0),
    (225.0, 16_000.0),
    (247.5, 14_120.0),
    (270.0, 120_000.0),
    (292.5, 42_120.0),
    (315.0, 64_900.0),
    (337.5, 21_880.0),
];

#[derive(Debug, Clone, Copy, PartialEq)]
struct CalibrationPoint {
    angle: f64,
    resistance: f64,
}

/// Sampled resistance-to-bearing mapping.
///
/// The physical curve is not monotonic, so lookups pick the nearest sample
/// rather than interpolating. Entries keep their load order; on a tie the
/// earlier entry wins.
#[derive(Debug, Clone, Default)]
pub struct DirectionTable {
    points: Vec<CalibrationPoint>,
}

impl DirectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I>(pairs: I) -> StationResult<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut table = Self::new();
        table.load(pairs)?;
        Ok(table)
    }

    /// Table for the standard vane, see [`DEFAULT_VANE_CALIBRATION`].
    #[cfg(test)]
    pub fn standard_vane() -> Self {
        Self {
            points: DEFAULT_VANE_CALIBRATION
                .iter()
                .map(|&(angle, resistance)| CalibrationPoint { angle, resistance })
                .collect(),
        }
    }

    /// Replace the calibration set with `(angle, resistance)` pairs.
    ///
    /// The existing table is left untouched if any pair is invalid.
    pub fn load<I>(&mut self, pairs: I) -> StationResult<()>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut points = Vec::new();
        for (angle, resistance) in pairs {
            if !(0.0..360.0).contains(&angle) {
                return Err(StationError::configuration(format!(
                    "calibration angle {angle} outside [0, 360)"
                )));
            }
            if !resistance.is_finite() || resistance <= 0.0 {
                return Err(StationError::configuration(format!(
                    "calibration resistance {resistance} for {angle}° must be positive"
                )));
            }
            points.push(CalibrationPoint { angle, resistance });
        }
        self.points = points;
        Ok(())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bearing of the entry whose resistance is closest to `resistance`.
    pub fn get_direction(&self, resistance: f64) -> StationResult<f64> {
        let mut best: Option<(f64, f64)> = None; // (distance, angle)
        for point in &self.points {
            let distance = (point.resistance - resistance).abs();
            match best {
                Some((best_distance, _)) if distance >= best_distance => {}
                _ => best = Some((distance, point.angle)),
            }
        }

        best.map(|(_, angle)| angle).ok_or_else(|| {
            StationError::configuration("wind direction table is empty; load a calibration first")
        })
    }
}

/// Voltage divider between the ADC reference and the vane.
///
/// The vane sits on the low side: `v_out = v_ref * R_vane / (R_fixed + R_vane)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageDivider {
    pub reference_volts: f64,
    pub fixed_ohms: f64,
}

impl VoltageDivider {
    pub const fn new(reference_volts: f64, fixed_ohms: f64) -> Self {
        Self {
            reference_volts,
            fixed_ohms,
        }
    }

    /// Vane resistance for a measured divider voltage.
    ///
    /// Returns None for readings at or beyond the rails, which an open or
    /// shorted vane produces.
    pub fn resistance(&self, volts: f64) -> Option<f64> {
        if !volts.is_finite() || volts <= 0.0 || volts >= self.reference_volts {
            return None;
        }
        Some(self.fixed_ohms * volts / (self.reference_volts - volts))
    }
}

impl Default for VoltageDivider {
    fn default() -> Self {
        Self::new(3.3, 10_000.0)
    }
}
