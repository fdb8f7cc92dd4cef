//! Core data types for trackcast.
//!
//! Users own tracks, tracks are the saved locations, observations are the
//! weather rows recorded against them, and [`RawWeatherPayload`] is what a
//! provider hands back before the racing metrics are derived.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::estimator;

/// Identifier of a saved location (a track row id).
pub type LocationId = i64;

/// Coordinates of a location to fetch weather for.
///
/// Coordinates are WGS84 degrees; range validation is the caller's job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Owning location id.
    pub id: LocationId,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Location {
    /// Create a location handle.
    #[must_use]
    pub fn new(id: LocationId, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            latitude,
            longitude,
        }
    }
}

/// Temperature unit a new user starts with.
pub const DEFAULT_TEMPERATURE_UNIT: &str = "Celsius";

/// Wind speed unit a new user starts with.
pub const DEFAULT_WIND_SPEED_UNIT: &str = "kph";

/// Someone who saves tracks.
///
/// The unit fields are display preferences stored as given; observations are
/// always recorded in °C and kph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Row id.
    pub id: i64,
    /// Unique name.
    pub username: String,
    /// Preferred temperature unit, e.g. "Celsius" or "Fahrenheit".
    pub temperature_unit: String,
    /// Preferred wind speed unit, e.g. "kph" or "mph".
    pub wind_speed_unit: String,
    /// When the user was created (epoch millis).
    pub date_joined_millis: i64,
}

/// Fields needed to create a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// Unique name.
    pub username: String,
    /// Preferred temperature unit.
    pub temperature_unit: String,
    /// Preferred wind speed unit.
    pub wind_speed_unit: String,
    /// Creation time (epoch millis).
    pub date_joined_millis: i64,
}

impl NewUser {
    /// A user with the default unit preferences.
    #[must_use]
    pub fn new(username: impl Into<String>, date_joined_millis: i64) -> Self {
        Self {
            username: username.into(),
            temperature_unit: DEFAULT_TEMPERATURE_UNIT.to_string(),
            wind_speed_unit: DEFAULT_WIND_SPEED_UNIT.to_string(),
            date_joined_millis,
        }
    }
}

/// A saved race track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Row id, also the weather location id.
    pub id: LocationId,
    /// Owning user.
    pub user_id: i64,
    /// Display name, e.g. "Spa-Francorchamps".
    pub name: String,
    /// Free-text place description.
    pub location: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Country name.
    pub country: String,
    /// Whether the user starred this track.
    pub is_favorite: bool,
    /// When the track was saved (epoch millis).
    pub date_added_millis: i64,
}

impl Track {
    /// The coordinates used for weather fetches.
    #[must_use]
    pub fn weather_location(&self) -> Location {
        Location::new(self.id, self.latitude, self.longitude)
    }
}

/// Fields needed to save a new track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrack {
    /// Owning user; there is no implicit default user.
    pub user_id: i64,
    /// Display name.
    pub name: String,
    /// Free-text place description.
    pub location: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Country name.
    pub country: String,
    /// Start out as a favorite.
    pub is_favorite: bool,
    /// When the track was saved (epoch millis).
    pub date_added_millis: i64,
}

/// Current conditions as reported by a weather provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWeatherPayload {
    /// Air temperature in °C.
    pub air_temperature_c: f64,
    /// UV index, typically 0–11.
    pub uv_index: f64,
    /// Cloud cover percentage.
    pub cloud_cover_pct: i32,
    /// Relative humidity percentage.
    pub humidity_pct: i32,
    /// Wind speed in km/h.
    pub wind_speed_kph: f64,
    /// Compass direction such as "NW".
    pub wind_direction: String,
    /// Human readable condition, e.g. "Partly cloudy".
    pub condition_text: String,
}

/// One point-in-time weather reading for a location.
///
/// Observations are immutable once recorded. `surface_temperature_c` is never
/// below `air_temperature_c`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    /// Row id assigned by the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Owning location.
    pub location_id: LocationId,
    /// Air temperature in °C.
    pub air_temperature_c: f64,
    /// Estimated track surface temperature in °C.
    pub surface_temperature_c: f64,
    /// Relative humidity percentage.
    pub humidity_pct: i32,
    /// Wind speed in km/h.
    pub wind_speed_kph: f64,
    /// Compass direction, passed through from the provider.
    pub wind_direction: String,
    /// Condition description, passed through from the provider.
    pub condition_text: String,
    /// Whether a wet track would be drying.
    pub is_drying: bool,
    /// When the reading was taken (epoch millis).
    pub observed_at_millis: i64,
}

impl WeatherObservation {
    /// Derive an observation from a provider payload.
    ///
    /// Runs the surface-temperature estimate and the drying check; the text
    /// fields are carried over unchanged.
    #[must_use]
    pub fn from_payload(
        location_id: LocationId,
        payload: &RawWeatherPayload,
        observed_at_millis: i64,
    ) -> Self {
        let surface_temperature_c = estimator::estimate_surface_temp(
            payload.air_temperature_c,
            payload.uv_index,
            payload.cloud_cover_pct,
            payload.humidity_pct,
        );
        let is_drying = estimator::is_drying(&payload.condition_text, payload.humidity_pct);

        Self {
            id: None,
            location_id,
            air_temperature_c: payload.air_temperature_c,
            surface_temperature_c,
            humidity_pct: payload.humidity_pct,
            wind_speed_kph: payload.wind_speed_kph,
            wind_direction: payload.wind_direction.clone(),
            condition_text: payload.condition_text.clone(),
            is_drying,
            observed_at_millis,
        }
    }

    /// The observation instant as a UTC timestamp.
    ///
    /// Returns `None` if the stored millis are outside chrono's range.
    #[must_use]
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.observed_at_millis)
    }

    /// Surface heating above air temperature in °C.
    #[must_use]
    pub fn surface_delta_c(&self) -> f64 {
        self.surface_temperature_c - self.air_temperature_c
    }
}
