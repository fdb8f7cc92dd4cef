//! WeatherAPI.com client.
//!
//! Only the `current.json` endpoint is used. The fields pulled from it are the
//! ones the surface estimate needs (`uv`, `cloud`, `humidity`) plus the
//! pass-through display fields.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::observation::RawWeatherPayload;

use super::{format_coordinates, ProviderError, WeatherProvider};

const USER_AGENT: &str = concat!("trackcast/", env!("CARGO_PKG_VERSION"));

/// Longest response body excerpt kept in error messages.
const MAX_BODY_EXCERPT: usize = 200;

/// HTTP client for WeatherAPI.com.
#[derive(Debug, Clone)]
pub struct WeatherApiClient {
    base_url: String,
    http: Client,
}

impl WeatherApiClient {
    /// Build a client for `base_url` (e.g. `https://api.weatherapi.com/v1`).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// The endpoint URL for current conditions.
    #[must_use]
    pub fn current_url(&self) -> String {
        format!("{}/current.json", self.base_url)
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiClient {
    fn name(&self) -> &'static str {
        "weatherapi"
    }

    async fn fetch_current(
        &self,
        latitude: f64,
        longitude: f64,
        api_key: &str,
    ) -> Result<RawWeatherPayload, ProviderError> {
        let q = format_coordinates(latitude, longitude);
        debug!("Requesting current weather for {}", q);

        let response = self
            .http
            .get(self.current_url())
            .query(&[("key", api_key), ("q", q.as_str())])
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let parsed: WaResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Decode(format!("{e}: {}", truncate_body(&body))))?;

        debug!(
            "Received weather for {}, {} ({})",
            parsed.location.name, parsed.location.country, parsed.current.condition.text
        );
        Ok(parsed.current.into_payload())
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        ProviderError::Transport(err.to_string())
    } else if err.is_decode() {
        ProviderError::Decode(err.to_string())
    } else {
        ProviderError::Other(err.to_string())
    }
}

/// Prefer the provider's structured `error.message`, fall back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<WaErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| truncate_body(body))
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_BODY_EXCERPT {
        return body.to_string();
    }
    let mut end = MAX_BODY_EXCERPT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    uv: f64,
    cloud: i32,
    humidity: i32,
    wind_kph: f64,
    wind_dir: String,
    condition: WaCondition,
}

impl WaCurrent {
    fn into_payload(self) -> RawWeatherPayload {
        RawWeatherPayload {
            air_temperature_c: self.temp_c,
            uv_index: self.uv,
            cloud_cover_pct: self.cloud,
            humidity_pct: self.humidity,
            wind_speed_kph: self.wind_kph,
            wind_direction: self.wind_dir,
            condition_text: self.condition.text,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    location: WaLocation,
    current: WaCurrent,
}

#[derive(Debug, Deserialize)]
struct WaErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct WaErrorResponse {
    error: WaErrorBody,
}
