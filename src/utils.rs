/// Utility functions for unit conversion, angular averaging and formatting
use time::{format_description, OffsetDateTime};

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    format_with(dt, "[day].[month].[year] - [hour]:[minute]:[second]")
}

/// Format a UTC timestamp the way the upload protocol expects `dateutc`
/// (YYYY-MM-DD HH:MM:SS).
pub fn format_dateutc(dt: &OffsetDateTime) -> String {
    format_with(
        &dt.to_offset(time::UtcOffset::UTC),
        "[year]-[month]-[day] [hour]:[minute]:[second]",
    )
}

fn format_with(dt: &OffsetDateTime, description: &str) -> String {
    match format_description::parse(description) {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn hpa_to_inhg(hpa: f64) -> f64 {
    hpa * 0.029_529_983_071_445
}

pub fn mm_to_inches(mm: f64) -> f64 {
    mm / 25.4
}

pub fn mps_to_mph(mps: f64) -> f64 {
    mps * 2.236_936_292_054_4
}

/// Normalize an angle in degrees to `[0, 360)`
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Calculate the circular mean of a set of bearings
///
/// Each angle is converted to a unit vector, the vectors are summed and the
/// bearing of the resultant is returned. A plain arithmetic mean of 350° and
/// 10° gives 180°; this gives 0°.
///
/// # Arguments
/// * `degrees` - Iterator of bearings in degrees
///
/// # Returns
/// Mean bearing in `[0, 360)`, or None if the input is empty or the vectors
/// cancel out exactly
pub fn circular_mean<I>(degrees: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut sin_sum = 0.0;
    let mut cos_sum = 0.0;
    let mut count = 0usize;

    for angle in degrees {
        let radians = angle.to_radians();
        sin_sum += radians.sin();
        cos_sum += radians.cos();
        count += 1;
    }

    if count == 0 {
        return None;
    }

    // Opposing bearings cancel; there is no meaningful mean direction then
    if sin_sum.hypot(cos_sum) < 1e-9 * count as f64 {
        return None;
    }

    Some(normalize_degrees(sin_sum.atan2(cos_sum).to_degrees()))
}

/// Dew point in °C from air temperature (°C) and relative humidity (%)
///
/// Uses the Magnus approximation with the Sonntag constants, accurate to
/// about 0.35 °C between -45 °C and 60 °C.
pub fn dew_point_celsius(temperature: f64, humidity: f64) -> Option<f64> {
    const B: f64 = 17.62;
    const C: f64 = 243.12;

    if humidity <= 0.0 {
        return None;
    }
    let gamma = (humidity / 100.0).ln() + B * temperature / (C + temperature);
    let dew_point = C * gamma / (B - gamma);
    dew_point.is_finite().then_some(dew_point)
}
