//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::observation::{LocationId, Track, DEFAULT_TEMPERATURE_UNIT, DEFAULT_WIND_SPEED_UNIT};

/// User id assumed when `--user` is not given.
pub const DEFAULT_USER_ID: i64 = 1;

/// Track management commands.
#[derive(Debug, Subcommand)]
pub enum TrackCommand {
    /// Register a race track
    Add(AddTrackArgs),

    /// List tracks for a user
    List {
        /// Owner of the tracks
        #[arg(short, long, default_value_t = DEFAULT_USER_ID)]
        user: i64,

        /// Only show favorites
        #[arg(short, long)]
        favorites: bool,

        /// Case-insensitive name filter
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Change a track's name, place or coordinates
    Edit(EditTrackArgs),

    /// Remove a track and its weather history
    Remove {
        /// Track id
        id: LocationId,
    },

    /// Mark a track as favorite
    Favorite {
        /// Track id
        id: LocationId,

        /// Clear the favorite flag instead
        #[arg(long)]
        off: bool,
    },
}

/// Arguments for `track add`.
#[derive(Debug, Args)]
pub struct AddTrackArgs {
    /// Track name, e.g. "Spa-Francorchamps"
    #[arg(short, long)]
    pub name: String,

    /// Human-readable place, e.g. "Stavelot"
    #[arg(short, long)]
    pub location: String,

    /// Latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Country name
    #[arg(long, default_value = "")]
    pub country: String,

    /// Owner of the track
    #[arg(short, long, default_value_t = DEFAULT_USER_ID)]
    pub user: i64,

    /// Add as a favorite
    #[arg(short, long)]
    pub favorite: bool,
}

impl AddTrackArgs {
    /// Check that the coordinates are on the globe and the name is set.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        validate_track_fields(&self.name, self.lat, self.lon)
    }
}

/// Arguments for `track edit`. Omitted fields keep their stored value.
#[derive(Debug, Args)]
pub struct EditTrackArgs {
    /// Track id
    pub id: LocationId,

    /// New track name
    #[arg(short, long)]
    pub name: Option<String>,

    /// New human-readable place
    #[arg(short, long)]
    pub location: Option<String>,

    /// New latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// New longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// New country name
    #[arg(long)]
    pub country: Option<String>,
}

impl EditTrackArgs {
    /// Copy the given fields onto `track` and validate the result.
    ///
    /// `track` is left untouched when validation fails.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn apply(&self, track: &mut Track) -> Result<(), String> {
        let name = self.name.as_deref().unwrap_or(&track.name);
        let lat = self.lat.unwrap_or(track.latitude);
        let lon = self.lon.unwrap_or(track.longitude);
        validate_track_fields(name, lat, lon)?;

        if let Some(name) = &self.name {
            track.name.clone_from(name);
        }
        if let Some(location) = &self.location {
            track.location.clone_from(location);
        }
        if let Some(country) = &self.country {
            track.country.clone_from(country);
        }
        track.latitude = lat;
        track.longitude = lon;
        Ok(())
    }

    /// True when no field was given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.location.is_none()
            && self.lat.is_none()
            && self.lon.is_none()
            && self.country.is_none()
    }
}

/// Check the fields shared by `track add` and `track edit`.
///
/// # Errors
///
/// Returns a description of the first invalid field.
pub fn validate_track_fields(name: &str, lat: f64, lon: f64) -> Result<(), String> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("latitude {lat} is outside [-90, 90]"));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(format!("longitude {lon} is outside [-180, 180]"));
    }
    if name.trim().is_empty() {
        return Err("track name must not be empty".to_string());
    }
    Ok(())
}

/// User management commands.
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Create a user
    Add {
        /// Unique username
        username: String,

        /// Preferred temperature unit
        #[arg(long, default_value = DEFAULT_TEMPERATURE_UNIT)]
        temperature_unit: String,

        /// Preferred wind speed unit
        #[arg(long, default_value = DEFAULT_WIND_SPEED_UNIT)]
        wind_speed_unit: String,
    },

    /// List users
    List,

    /// Show one user
    Show {
        /// User id
        id: i64,
    },

    /// Change a user's name or unit preferences
    Set {
        /// User id
        id: i64,

        /// New username
        #[arg(long)]
        username: Option<String>,

        /// New temperature unit
        #[arg(long)]
        temperature_unit: Option<String>,

        /// New wind speed unit
        #[arg(long)]
        wind_speed_unit: Option<String>,
    },
}

/// Refresh command arguments.
#[derive(Debug, Args)]
pub struct RefreshCommand {
    /// Refresh a single track instead of all of the user's tracks
    #[arg(short, long)]
    pub track: Option<LocationId>,

    /// Owner of the tracks to refresh
    #[arg(short, long, default_value_t = DEFAULT_USER_ID)]
    pub user: i64,

    /// Override the configured staleness threshold
    #[arg(long)]
    pub max_age_hours: Option<u32>,

    /// Fetch even if the stored weather is still fresh
    #[arg(short, long)]
    pub force: bool,
}

/// Weather inspection commands.
#[derive(Debug, Subcommand)]
pub enum WeatherCommand {
    /// Show the newest observation for a track
    Latest {
        /// Track id
        track: LocationId,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show stored observations for a track, newest first
    History {
        /// Track id
        track: LocationId,

        /// Maximum number of observations
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
