//! Track surface temperature estimation.
//!
//! Racing surfaces heat up well above air temperature in direct sun. The model
//! here is deliberately simple: solar gain scaled by UV index and attenuated by
//! cloud cover, minus an evaporative cooling term driven by dry air. The result
//! is floored at air temperature.
//!
//! Inputs outside their usual ranges are not rejected; the formula simply
//! extrapolates.

/// Surface heating per UV index point under clear sky, in °C.
const SOLAR_GAIN_PER_UV: f64 = 3.0;

/// Cooling at 0 % humidity, in °C.
const MAX_HUMIDITY_COOLING: f64 = 2.0;

/// Humidity at or above which a track is not considered to be drying.
pub const DRYING_HUMIDITY_THRESHOLD: i32 = 70;

/// Condition fragments that mean the track is getting wet.
const WET_KEYWORDS: &[&str] = &["rain", "drizzle", "shower", "thunderstorm"];

/// Estimate the track surface temperature in °C.
///
/// `surface = max(air + uv * 3 * (1 - cloud / 100) - (100 - humidity) / 100 * 2, air)`
#[must_use]
pub fn estimate_surface_temp(
    air_temp_c: f64,
    uv_index: f64,
    cloud_cover_pct: i32,
    humidity_pct: i32,
) -> f64 {
    let solar_gain = uv_index * SOLAR_GAIN_PER_UV * (1.0 - f64::from(cloud_cover_pct) / 100.0);
    let humidity_cooling = (100.0 - f64::from(humidity_pct)) / 100.0 * MAX_HUMIDITY_COOLING;

    let surface = air_temp_c + solar_gain - humidity_cooling;
    surface.max(air_temp_c)
}

/// Whether a wet track would be drying under these conditions.
///
/// True when humidity is below 70 % and the condition text contains none of
/// the wet keywords. Matching is a case-insensitive substring test, so
/// "Thunderstorm warning" and "Light rain showers" are both wet.
#[must_use]
pub fn is_drying(condition_text: &str, humidity_pct: i32) -> bool {
    humidity_pct < DRYING_HUMIDITY_THRESHOLD && !is_wet_condition(condition_text)
}

/// Whether the condition text mentions precipitation.
#[must_use]
pub fn is_wet_condition(condition_text: &str) -> bool {
    let lowered = condition_text.to_lowercase();
    WET_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}
