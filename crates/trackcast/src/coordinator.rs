//! Weather fetch coordination.
//!
//! For one location: read the newest stored observation, decide whether it is
//! stale, call the provider if so, derive the racing metrics and persist the
//! result with retention applied. Every path ends in a [`FetchOutcome`]; no
//! error escapes as `Err`.
//!
//! Calls for the same location are serialized through a per-location lock and
//! re-check staleness once they hold it, so concurrent callers collapse onto a
//! single provider request. Different locations never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::observation::{Location, LocationId, WeatherObservation};
use crate::provider::{ProviderError, WeatherProvider};
use crate::staleness::{self, DEFAULT_MAX_AGE_HOURS};
use crate::storage::{WeatherRecordStore, DEFAULT_RETENTION_LIMIT};

/// Per-call limits for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Maximum observation age before a refetch.
    pub max_age_hours: u32,
    /// Observations kept per location after a successful fetch.
    pub retention_limit: usize,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_age_hours: DEFAULT_MAX_AGE_HOURS,
            retention_limit: DEFAULT_RETENTION_LIMIT,
        }
    }
}

/// Why a fetch for a location did not produce a new observation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The provider rejected the credentials, or none are configured.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The coordinates resolved to no location.
    #[error("location not found: {0}")]
    NotFound(String),

    /// The provider quota is exhausted.
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// No response was received.
    #[error("network failure: {0}")]
    Transport(String),

    /// Any other provider failure.
    #[error("unknown error: {0}")]
    Unknown(String),

    /// Reading or writing the weather history failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl FetchError {
    /// Stable tag for display and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth_error",
            Self::NotFound(_) => "not_found",
            Self::RateLimited(_) => "rate_limited",
            Self::Transport(_) => "transport_error",
            Self::Unknown(_) => "unknown_error",
            Self::Storage(_) => "storage_error",
        }
    }
}

impl From<ProviderError> for FetchError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Status {
                status: 401 | 403,
                message,
            } => Self::Auth(message),
            ProviderError::Status {
                status: 404,
                message,
            } => Self::NotFound(message),
            ProviderError::Status {
                status: 429,
                message,
            } => Self::RateLimited(message),
            ProviderError::Status { status, message } => {
                Self::Unknown(format!("HTTP {status}: {message}"))
            }
            ProviderError::Transport(message) => Self::Transport(message),
            ProviderError::Decode(message) => Self::Unknown(format!("invalid response: {message}")),
            ProviderError::Other(message) => Self::Unknown(message),
        }
    }
}

/// Result of ensuring fresh weather for one location.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The stored observation was recent enough; nothing was fetched.
    Fresh {
        /// Location that was checked.
        location_id: LocationId,
        /// The cached observation.
        observation: WeatherObservation,
    },
    /// A new observation was fetched and stored.
    Done {
        /// Location that was refreshed.
        location_id: LocationId,
        /// Row id of the stored observation.
        record_id: i64,
        /// The stored observation.
        observation: WeatherObservation,
    },
    /// The fetch failed; the store is unchanged.
    Failed {
        /// Location that failed.
        location_id: LocationId,
        /// Classified failure.
        error: FetchError,
    },
}

impl FetchOutcome {
    /// Location this outcome belongs to.
    #[must_use]
    pub fn location_id(&self) -> LocationId {
        match self {
            Self::Fresh { location_id, .. }
            | Self::Done { location_id, .. }
            | Self::Failed { location_id, .. } => *location_id,
        }
    }

    /// True for `Fresh` and `Done`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// The current observation, whether cached or newly fetched.
    #[must_use]
    pub fn observation(&self) -> Option<&WeatherObservation> {
        match self {
            Self::Fresh { observation, .. } | Self::Done { observation, .. } => Some(observation),
            Self::Failed { .. } => None,
        }
    }

    /// The failure, if any.
    #[must_use]
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Orchestrates staleness checks, provider calls and persistence.
///
/// Cloning is cheap and clones share the same in-flight lock table.
#[derive(Clone)]
pub struct WeatherFetchCoordinator {
    store: Arc<dyn WeatherRecordStore>,
    provider: Arc<dyn WeatherProvider>,
    api_key: Option<Arc<str>>,
    in_flight: Arc<InFlight>,
}

impl std::fmt::Debug for WeatherFetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherFetchCoordinator")
            .field("store", &self.store)
            .field("provider", &self.provider.name())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl WeatherFetchCoordinator {
    /// Create a coordinator. A `None` or blank key makes every fetch fail
    /// with [`FetchError::Auth`] without contacting the provider.
    #[must_use]
    pub fn new(
        store: Arc<dyn WeatherRecordStore>,
        provider: Arc<dyn WeatherProvider>,
        api_key: Option<&str>,
    ) -> Self {
        Self {
            store,
            provider,
            api_key: api_key
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(Arc::from),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Make sure the location has an observation no older than
    /// `policy.max_age_hours`, fetching one if needed.
    pub async fn ensure_fresh_weather(
        &self,
        location: Location,
        now_millis: i64,
        policy: FetchPolicy,
    ) -> FetchOutcome {
        let _flight = self.in_flight.enter(location.id).await;

        let latest = match self.store.latest(location.id) {
            Ok(latest) => latest,
            Err(e) => return storage_failure(location.id, &e),
        };

        if let Some(observation) = latest.filter(|o| {
            !staleness::is_stale(Some(o.observed_at_millis), now_millis, policy.max_age_hours)
        }) {
            debug!(
                "Weather for location {} is fresh (observed at {})",
                location.id, observation.observed_at_millis
            );
            return FetchOutcome::Fresh {
                location_id: location.id,
                observation,
            };
        }

        debug!("Weather for location {} is stale, fetching", location.id);
        self.fetch_and_store(location, now_millis, policy).await
    }

    /// Fetch and store weather for a location regardless of staleness.
    pub async fn fetch_now(
        &self,
        location: Location,
        now_millis: i64,
        policy: FetchPolicy,
    ) -> FetchOutcome {
        let _flight = self.in_flight.enter(location.id).await;
        self.fetch_and_store(location, now_millis, policy).await
    }

    /// Run [`Self::ensure_fresh_weather`] for every location.
    ///
    /// Locations are processed as independent tasks, at most
    /// `max_concurrency` at a time. The returned outcomes line up with
    /// `locations`; one location failing never affects another.
    pub async fn refresh_all_stale(
        &self,
        locations: &[Location],
        now_millis: i64,
        policy: FetchPolicy,
        max_concurrency: usize,
    ) -> Vec<FetchOutcome> {
        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, location) in locations.iter().copied().enumerate() {
            let coordinator = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = coordinator
                    .ensure_fresh_weather(location, now_millis, policy)
                    .await;
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<FetchOutcome>> = vec![None; locations.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => warn!("Weather refresh task ended abnormally: {}", e),
            }
        }

        let results: Vec<FetchOutcome> = outcomes
            .into_iter()
            .zip(locations)
            .map(|(outcome, location)| {
                outcome.unwrap_or_else(|| FetchOutcome::Failed {
                    location_id: location.id,
                    error: FetchError::Unknown("refresh task did not complete".to_string()),
                })
            })
            .collect();

        let failed = results.iter().filter(|o| !o.is_success()).count();
        info!("Refreshed {} locations ({} failed)", results.len(), failed);
        results
    }

    async fn fetch_and_store(
        &self,
        location: Location,
        now_millis: i64,
        policy: FetchPolicy,
    ) -> FetchOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!(
                "No weather API key configured; skipping location {}",
                location.id
            );
            return FetchOutcome::Failed {
                location_id: location.id,
                error: FetchError::Auth("no API key configured".to_string()),
            };
        };

        let payload = match self
            .provider
            .fetch_current(location.latitude, location.longitude, api_key)
            .await
        {
            Ok(payload) => payload,
            Err(e) => {
                let error = FetchError::from(e);
                warn!(
                    "Weather fetch from {} failed for location {}: {}",
                    self.provider.name(),
                    location.id,
                    error
                );
                return FetchOutcome::Failed {
                    location_id: location.id,
                    error,
                };
            }
        };

        let observation = WeatherObservation::from_payload(location.id, &payload, now_millis);
        match self
            .store
            .insert_and_trim(&observation, policy.retention_limit)
        {
            Ok(record_id) => {
                info!(
                    "Stored weather for location {}: air {:.1}°C, surface {:.1}°C, drying {}",
                    location.id,
                    observation.air_temperature_c,
                    observation.surface_temperature_c,
                    observation.is_drying
                );
                FetchOutcome::Done {
                    location_id: location.id,
                    record_id,
                    observation: WeatherObservation {
                        id: Some(record_id),
                        ..observation
                    },
                }
            }
            Err(e) => storage_failure(location.id, &e),
        }
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }
}

fn storage_failure(location_id: LocationId, err: &crate::Error) -> FetchOutcome {
    warn!("Weather storage failed for location {}: {}", location_id, err);
    FetchOutcome::Failed {
        location_id,
        error: FetchError::Storage(err.to_string()),
    }
}

/// Per-location async locks, removed once no caller holds or awaits them.
#[derive(Debug, Default)]
struct InFlight {
    locks: Mutex<HashMap<LocationId, Arc<AsyncMutex<()>>>>,
}

impl InFlight {
    async fn enter(self: &Arc<Self>, location_id: LocationId) -> FlightGuard {
        let lock = self.handle(location_id);
        let guard = lock.lock_owned().await;
        FlightGuard {
            location_id,
            in_flight: Arc::clone(self),
            guard: Some(guard),
        }
    }

    fn handle(&self, location_id: LocationId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(location_id).or_default())
    }

    fn release(&self, location_id: LocationId, lock: &Arc<AsyncMutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the table's reference and the caller's remain
        if Arc::strong_count(lock) <= 2 {
            locks.remove(&location_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

struct FlightGuard {
    location_id: LocationId,
    in_flight: Arc<InFlight>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            let lock = Arc::clone(OwnedMutexGuard::mutex(&guard));
            drop(guard);
            self.in_flight.release(self.location_id, &lock);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::init_test_logging;
    use crate::observation::RawWeatherPayload;
    use crate::storage::Storage;
    use crate::Error;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const NOW: i64 = 1_720_000_000_000;
    const HOUR: i64 = 3_600_000;

    fn spa_payload() -> RawWeatherPayload {
        RawWeatherPayload {
            air_temperature_c: 18.0,
            uv_index: 6.0,
            cloud_cover_pct: 20,
            humidity_pct: 55,
            wind_speed_kph: 12.0,
            wind_direction: "NW".to_string(),
            condition_text: "Partly cloudy".to_string(),
        }
    }

    /// Answers by latitude; unknown coordinates succeed with the Spa payload.
    #[derive(Debug, Default)]
    struct ScriptedProvider {
        failures: HashMap<u64, ProviderError>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn failing_at(mut self, latitude: f64, err: ProviderError) -> Self {
            self.failures.insert(latitude.to_bits(), err);
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WeatherProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch_current(
            &self,
            latitude: f64,
            _longitude: f64,
            _api_key: &str,
        ) -> Result<RawWeatherPayload, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.failures.get(&latitude.to_bits()) {
                Some(err) => Err(err.clone()),
                None => Ok(spa_payload()),
            }
        }
    }

    /// Reads succeed with nothing stored; writes always fail.
    #[derive(Debug)]
    struct ReadOnlyStore;

    impl WeatherRecordStore for ReadOnlyStore {
        fn insert(&self, _observation: &WeatherObservation) -> crate::Result<i64> {
            Err(Error::internal("disk full"))
        }

        fn latest(&self, _location_id: LocationId) -> crate::Result<Option<WeatherObservation>> {
            Ok(None)
        }

        fn history(
            &self,
            _location_id: LocationId,
            _limit: Option<usize>,
        ) -> crate::Result<Vec<WeatherObservation>> {
            Ok(Vec::new())
        }

        fn trim_to_retention(
            &self,
            _location_id: LocationId,
            _limit: usize,
        ) -> crate::Result<usize> {
            Ok(0)
        }

        fn insert_and_trim(
            &self,
            _observation: &WeatherObservation,
            _limit: usize,
        ) -> crate::Result<i64> {
            Err(Error::internal("disk full"))
        }
    }

    fn setup(
        provider: ScriptedProvider,
    ) -> (Arc<Storage>, Arc<ScriptedProvider>, WeatherFetchCoordinator) {
        init_test_logging();
        let store = Arc::new(Storage::open_in_memory().unwrap());
        let provider = Arc::new(provider);
        let coordinator = WeatherFetchCoordinator::new(
            Arc::clone(&store) as Arc<dyn WeatherRecordStore>,
            Arc::clone(&provider) as Arc<dyn WeatherProvider>,
            Some("test-key"),
        );
        (store, provider, coordinator)
    }

    fn stored_at(store: &Storage, location_id: LocationId, observed_at_millis: i64) {
        let obs = WeatherObservation::from_payload(location_id, &spa_payload(), observed_at_millis);
        store.insert(&obs).unwrap();
    }

    fn spa() -> Location {
        Location::new(1, 50.4372, 5.9714)
    }

    #[tokio::test]
    async fn test_end_to_end_fetch_for_new_location() {
        let (store, provider, coordinator) = setup(ScriptedProvider::default());

        let outcome = coordinator
            .ensure_fresh_weather(spa(), NOW, FetchPolicy::default())
            .await;

        let FetchOutcome::Done {
            location_id,
            record_id,
            observation,
        } = outcome
        else {
            panic!("expected Done, got {outcome:?}");
        };
        assert_eq!(location_id, 1);
        assert_eq!(observation.id, Some(record_id));
        assert!((observation.air_temperature_c - 18.0).abs() < f64::EPSILON);
        assert!((observation.surface_temperature_c - 31.5).abs() < 1e-9);
        assert!(observation.is_drying);
        assert_eq!(observation.observed_at_millis, NOW);
        assert_eq!(provider.calls(), 1);

        let latest = store.latest(1).unwrap().unwrap();
        assert_eq!(latest, observation);
    }

    #[tokio::test]
    async fn test_fresh_observation_skips_provider() {
        let (store, provider, coordinator) = setup(ScriptedProvider::default());
        stored_at(&store, 1, NOW - HOUR / 2);

        let outcome = coordinator
            .ensure_fresh_weather(spa(), NOW, FetchPolicy::default())
            .await;

        assert!(matches!(outcome, FetchOutcome::Fresh { location_id: 1, .. }));
        assert_eq!(
            outcome.observation().map(|o| o.observed_at_millis),
            Some(NOW - HOUR / 2)
        );
        assert_eq!(provider.calls(), 0);
        assert_eq!(store.count_for(1).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_staleness_boundary() {
        let (store, provider, coordinator) = setup(ScriptedProvider::default());
        stored_at(&store, 1, NOW - HOUR);

        let at_threshold = coordinator
            .ensure_fresh_weather(spa(), NOW, FetchPolicy::default())
            .await;
        assert!(matches!(at_threshold, FetchOutcome::Fresh { .. }));
        assert_eq!(provider.calls(), 0);

        let past_threshold = coordinator
            .ensure_fresh_weather(spa(), NOW + 1, FetchPolicy::default())
            .await;
        assert!(matches!(past_threshold, FetchOutcome::Done { .. }));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_provider_errors_are_classified() {
        let cases = [
            (401, "auth_error"),
            (403, "auth_error"),
            (404, "not_found"),
            (429, "rate_limited"),
            (500, "unknown_error"),
            (502, "unknown_error"),
        ];
        for (status, kind) in cases {
            let provider = ScriptedProvider::default().failing_at(
                spa().latitude,
                ProviderError::Status {
                    status,
                    message: "nope".to_string(),
                },
            );
            let (store, _, coordinator) = setup(provider);

            let outcome = coordinator
                .ensure_fresh_weather(spa(), NOW, FetchPolicy::default())
                .await;
            assert_eq!(outcome.error().map(FetchError::kind), Some(kind), "HTTP {status}");
            assert!(store.latest(1).unwrap().is_none());
        }
    }

    #[test]
    fn test_non_status_errors_are_classified() {
        assert_eq!(
            FetchError::from(ProviderError::Transport("timed out".to_string())),
            FetchError::Transport("timed out".to_string())
        );
        assert!(matches!(
            FetchError::from(ProviderError::Decode("missing field `uv`".to_string())),
            FetchError::Unknown(message) if message.contains("missing field")
        ));
        assert!(matches!(
            FetchError::from(ProviderError::Other("boom".to_string())),
            FetchError::Unknown(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_calling_provider() {
        let store = Arc::new(Storage::open_in_memory().unwrap());
        let provider = Arc::new(ScriptedProvider::default());
        let coordinator = WeatherFetchCoordinator::new(
            store,
            Arc::clone(&provider) as Arc<dyn WeatherProvider>,
            Some("   "),
        );

        let outcome = coordinator
            .ensure_fresh_weather(spa(), NOW, FetchPolicy::default())
            .await;
        assert!(matches!(outcome.error(), Some(FetchError::Auth(_))));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported() {
        let provider = Arc::new(ScriptedProvider::default());
        let coordinator = WeatherFetchCoordinator::new(
            Arc::new(ReadOnlyStore),
            Arc::clone(&provider) as Arc<dyn WeatherProvider>,
            Some("key"),
        );

        let outcome = coordinator
            .ensure_fresh_weather(spa(), NOW, FetchPolicy::default())
            .await;
        assert!(matches!(
            outcome.error(),
            Some(FetchError::Storage(message)) if message.contains("disk full")
        ));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_all_isolates_failures() {
        let second = Location::new(2, 45.6156, 9.2811);
        let provider = ScriptedProvider::default()
            .failing_at(second.latitude, ProviderError::Transport("connection reset".to_string()));
        let (store, _, coordinator) = setup(provider);
        let locations = [spa(), second, Location::new(3, 52.0786, -1.0169)];

        let outcomes = coordinator
            .refresh_all_stale(&locations, NOW, FetchPolicy::default(), 4)
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0], FetchOutcome::Done { location_id: 1, .. }));
        assert!(matches!(
            &outcomes[1],
            FetchOutcome::Failed {
                location_id: 2,
                error: FetchError::Transport(_)
            }
        ));
        assert!(matches!(outcomes[2], FetchOutcome::Done { location_id: 3, .. }));
        assert!(store.latest(2).unwrap().is_none());
        assert!(store.latest(3).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_refresh_all_mixes_fresh_and_stale() {
        let (store, provider, coordinator) = setup(ScriptedProvider::default());
        stored_at(&store, 1, NOW - 10 * 60 * 1000);
        let locations = [spa(), Location::new(2, 1.0, 2.0)];

        let outcomes = coordinator
            .refresh_all_stale(&locations, NOW, FetchPolicy::default(), 1)
            .await;

        assert!(matches!(outcomes[0], FetchOutcome::Fresh { .. }));
        assert!(matches!(outcomes[1], FetchOutcome::Done { .. }));
        assert_eq!(provider.calls(), 1);
        assert_eq!(
            outcomes.iter().map(FetchOutcome::location_id).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn test_refresh_all_empty() {
        let (_, provider, coordinator) = setup(ScriptedProvider::default());
        let outcomes = coordinator
            .refresh_all_stale(&[], NOW, FetchPolicy::default(), 4)
            .await;
        assert!(outcomes.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_calls_for_same_location_share_one_fetch() {
        let (store, provider, coordinator) =
            setup(ScriptedProvider::default().with_delay(Duration::from_millis(50)));

        let (a, b) = tokio::join!(
            coordinator.ensure_fresh_weather(spa(), NOW, FetchPolicy::default()),
            coordinator.ensure_fresh_weather(spa(), NOW, FetchPolicy::default()),
        );

        let done = [&a, &b]
            .iter()
            .filter(|o| matches!(o, FetchOutcome::Done { .. }))
            .count();
        let fresh = [&a, &b]
            .iter()
            .filter(|o| matches!(o, FetchOutcome::Fresh { .. }))
            .count();
        assert_eq!((done, fresh), (1, 1));
        assert_eq!(provider.calls(), 1);
        assert_eq!(store.count_for(1).unwrap(), 1);
        assert_eq!(coordinator.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_different_locations_fetch_concurrently() {
        let (_, provider, coordinator) =
            setup(ScriptedProvider::default().with_delay(Duration::from_millis(20)));

        let monza = Location::new(2, 1.0, 1.0);
        let (a, b) = tokio::join!(
            coordinator.ensure_fresh_weather(spa(), NOW, FetchPolicy::default()),
            coordinator.ensure_fresh_weather(monza, NOW, FetchPolicy::default()),
        );

        assert!(matches!(a, FetchOutcome::Done { .. }));
        assert!(matches!(b, FetchOutcome::Done { .. }));
        assert_eq!(provider.calls(), 2);
        assert_eq!(coordinator.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_fetch_now_applies_retention() {
        let (store, provider, coordinator) = setup(ScriptedProvider::default());
        let policy = FetchPolicy {
            max_age_hours: 1,
            retention_limit: 3,
        };

        for n in 0..5 {
            let outcome = coordinator.fetch_now(spa(), NOW + n, policy).await;
            assert!(outcome.is_success());
        }

        assert_eq!(provider.calls(), 5);
        let kept: Vec<i64> = store
            .history(1, None)
            .unwrap()
            .iter()
            .map(|o| o.observed_at_millis)
            .collect();
        assert_eq!(kept, vec![NOW + 4, NOW + 3, NOW + 2]);
    }

    #[tokio::test]
    async fn test_cancelled_fetch_leaves_store_untouched() {
        let (store, provider, coordinator) =
            setup(ScriptedProvider::default().with_delay(Duration::from_secs(5)));

        let result = tokio::time::timeout(
            Duration::from_millis(20),
            coordinator.ensure_fresh_weather(spa(), NOW, FetchPolicy::default()),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(provider.calls(), 1);
        assert!(store.latest(1).unwrap().is_none());
        assert_eq!(coordinator.in_flight_len(), 0);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let coordinator = WeatherFetchCoordinator::new(
            Arc::new(ReadOnlyStore),
            Arc::new(ScriptedProvider::default()),
            Some("super-secret"),
        );
        let debug = format!("{coordinator:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_outcome_accessors() {
        let failed = FetchOutcome::Failed {
            location_id: 4,
            error: FetchError::RateLimited("quota".to_string()),
        };
        assert_eq!(failed.location_id(), 4);
        assert!(!failed.is_success());
        assert!(failed.observation().is_none());
        assert_eq!(failed.error().map(FetchError::kind), Some("rate_limited"));
    }
}
