use time::OffsetDateTime;

/// Volume collected by one tip of a standard tipping-bucket gauge.
pub const DEFAULT_RAIN_MM_PER_TIP: f64 = 0.2794;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainEvent {
    pub amount: f64, // mm
    pub timestamp: OffsetDateTime,
}

impl RainEvent {
    pub fn new(amount: f64, timestamp: OffsetDateTime) -> Self {
        Self { amount, timestamp }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindSample {
    pub timestamp: OffsetDateTime,
    pub direction: f64, // degrees
}

/// Rolling wind state at one instant. `direction` is `None` when no pulse
/// fell inside the window and must be omitted from the upload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindSnapshot {
    pub speed: f64, // m/s
    pub direction: Option<f64>,
    pub pulses: usize,
}

impl WindSnapshot {
    pub fn calm() -> Self {
        Self {
            speed: 0.0,
            direction: None,
            pulses: 0,
        }
    }
}

/// Instantaneous readings supplied by the external sensor drivers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorReadings {
    pub temperature: Option<f64>, // °C
    pub humidity: Option<f64>,    // %
    pub pressure: Option<f64>,    // hPa
    pub uv_index: Option<f64>,
    pub vane_volts: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub status: u16,
    pub body: String,
}

impl UploadResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Display for UploadResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {}: {}", self.status, self.body.trim())
    }
}
