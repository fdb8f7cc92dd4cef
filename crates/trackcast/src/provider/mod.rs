//! Weather provider abstraction.
//!
//! A provider turns coordinates into a [`RawWeatherPayload`]. Failures are
//! described in transport terms ([`ProviderError`]); turning them into fetch
//! outcomes is the coordinator's job.

mod weatherapi;

use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

use crate::observation::RawWeatherPayload;

pub use weatherapi::WeatherApiClient;

/// Errors surfaced by a weather provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider answered with a non-success HTTP status.
    #[error("provider returned HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body excerpt or reason.
        message: String,
    },

    /// No response was received (connect failure, timeout, reset).
    #[error("transport failure: {0}")]
    Transport(String),

    /// A response arrived but could not be decoded.
    #[error("invalid provider response: {0}")]
    Decode(String),

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

/// A source of current weather conditions.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch current conditions at the given coordinates.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] describing how the request failed.
    async fn fetch_current(
        &self,
        latitude: f64,
        longitude: f64,
        api_key: &str,
    ) -> Result<RawWeatherPayload, ProviderError>;
}

/// Format coordinates the way the provider's `q` parameter expects: `"lat,lon"`.
#[must_use]
pub fn format_coordinates(latitude: f64, longitude: f64) -> String {
    format!("{latitude},{longitude}")
}
