//! `trackcast` - Race-track weather freshness and track-surface estimation
//!
//! This library keeps a bounded history of weather observations per race
//! track, decides when the newest one is too old, refreshes stale tracks from
//! a weather provider and derives the racing metrics (estimated asphalt
//! temperature and whether the surface is drying) from each raw payload.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod estimator;
pub mod logging;
pub mod observation;
pub mod provider;
pub mod staleness;
pub mod storage;

pub use config::Config;
pub use coordinator::{FetchError, FetchOutcome, FetchPolicy, WeatherFetchCoordinator};
pub use error::{Error, Result};
pub use estimator::{estimate_surface_temp, is_drying};
pub use logging::init_logging;
pub use observation::{
    Location, LocationId, NewTrack, NewUser, RawWeatherPayload, Track, User, WeatherObservation,
};
pub use provider::{ProviderError, WeatherApiClient, WeatherProvider};
pub use staleness::is_stale;
pub use storage::{Storage, StorageStats, WeatherRecordStore};
