//! Per-location weather history with bounded retention.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::Result;
use crate::observation::{LocationId, WeatherObservation};

use super::schema::OBSERVATION_COLUMNS;
use super::Storage;

/// Observations kept per location unless the caller asks otherwise.
pub const DEFAULT_RETENTION_LIMIT: usize = 100;

/// Append-only weather history for locations.
///
/// Callers insert observations for a location in time order. Reads are
/// newest-first by `observed_at_millis`, ties broken by insertion order.
pub trait WeatherRecordStore: Send + Sync + std::fmt::Debug {
    /// Append an observation and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn insert(&self, observation: &WeatherObservation) -> Result<i64>;

    /// The most recent observation for a location.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn latest(&self, location_id: LocationId) -> Result<Option<WeatherObservation>>;

    /// Observations for a location, newest first, optionally capped.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn history(
        &self,
        location_id: LocationId,
        limit: Option<usize>,
    ) -> Result<Vec<WeatherObservation>>;

    /// Delete all but the `limit` newest observations for a location.
    ///
    /// A `limit` of zero is treated as one: the newest row is never removed.
    /// Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn trim_to_retention(&self, location_id: LocationId, limit: usize) -> Result<usize>;

    /// Insert then trim as one unit.
    ///
    /// Either both happen or neither does; afterwards at most `limit` rows
    /// (minimum one) exist for the location and the new row is among them.
    ///
    /// # Errors
    ///
    /// Returns an error if either step fails; the insert is rolled back.
    fn insert_and_trim(&self, observation: &WeatherObservation, limit: usize) -> Result<i64>;
}

impl WeatherRecordStore for Storage {
    fn insert(&self, observation: &WeatherObservation) -> Result<i64> {
        let conn = self.lock()?;
        insert_row(&conn, observation)
    }

    fn latest(&self, location_id: LocationId) -> Result<Option<WeatherObservation>> {
        let conn = self.lock()?;
        let observation = conn
            .query_row(
                &format!(
                    "SELECT {OBSERVATION_COLUMNS} FROM weather_observations WHERE location_id = ?1 \
                     ORDER BY observed_at_millis DESC, id DESC LIMIT 1"
                ),
                [location_id],
                row_to_observation,
            )
            .optional()?;
        Ok(observation)
    }

    fn history(
        &self,
        location_id: LocationId,
        limit: Option<usize>,
    ) -> Result<Vec<WeatherObservation>> {
        // SQLite treats a negative LIMIT as unbounded
        let limit_i64 = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {OBSERVATION_COLUMNS} FROM weather_observations WHERE location_id = ?1 \
             ORDER BY observed_at_millis DESC, id DESC LIMIT ?2"
        ))?;
        let observations = stmt
            .query_map(params![location_id, limit_i64], row_to_observation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(observations)
    }

    fn trim_to_retention(&self, location_id: LocationId, limit: usize) -> Result<usize> {
        let conn = self.lock()?;
        trim_rows(&conn, location_id, limit)
    }

    fn insert_and_trim(&self, observation: &WeatherObservation, limit: usize) -> Result<i64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id = insert_row(&tx, observation)?;
        trim_rows(&tx, observation.location_id, limit)?;
        tx.commit()?;
        Ok(id)
    }
}

impl Storage {
    /// Get an observation by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_observation(&self, id: i64) -> Result<Option<WeatherObservation>> {
        let conn = self.lock()?;
        let observation = conn
            .query_row(
                &format!("SELECT {OBSERVATION_COLUMNS} FROM weather_observations WHERE id = ?1"),
                [id],
                row_to_observation,
            )
            .optional()?;
        Ok(observation)
    }

    /// The newest observation of every location that has one, by location id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn latest_for_all(&self) -> Result<Vec<WeatherObservation>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            r"
            SELECT {OBSERVATION_COLUMNS} FROM weather_observations AS w
            WHERE w.id = (
                SELECT i.id FROM weather_observations AS i
                WHERE i.location_id = w.location_id
                ORDER BY i.observed_at_millis DESC, i.id DESC LIMIT 1
            )
            ORDER BY w.location_id ASC
            "
        ))?;
        let observations = stmt
            .query_map([], row_to_observation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(observations)
    }

    /// Number of observations stored for a location.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_for(&self, location_id: LocationId) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM weather_observations WHERE location_id = ?1",
            [location_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn insert_row(conn: &Connection, observation: &WeatherObservation) -> Result<i64> {
    conn.execute(
        r"
        INSERT INTO weather_observations (
            location_id, air_temperature_c, surface_temperature_c, humidity_pct,
            wind_speed_kph, wind_direction, condition_text, is_drying, observed_at_millis
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ",
        params![
            observation.location_id,
            observation.air_temperature_c,
            observation.surface_temperature_c,
            observation.humidity_pct,
            observation.wind_speed_kph,
            observation.wind_direction,
            observation.condition_text,
            observation.is_drying,
            observation.observed_at_millis,
        ],
    )?;

    let id = conn.last_insert_rowid();
    debug!(
        "Inserted observation {} for location {}",
        id, observation.location_id
    );
    Ok(id)
}

fn trim_rows(conn: &Connection, location_id: LocationId, limit: usize) -> Result<usize> {
    let keep = i64::try_from(limit.max(1)).unwrap_or(i64::MAX);
    let affected = conn.execute(
        r"
        DELETE FROM weather_observations
        WHERE location_id = ?1 AND id NOT IN (
            SELECT id FROM weather_observations
            WHERE location_id = ?1
            ORDER BY observed_at_millis DESC, id DESC
            LIMIT ?2
        )
        ",
        params![location_id, keep],
    )?;

    if affected > 0 {
        info!(
            "Trimmed {} observations for location {} to keep {}",
            affected, location_id, keep
        );
    }
    Ok(affected)
}

fn row_to_observation(row: &rusqlite::Row) -> rusqlite::Result<WeatherObservation> {
    Ok(WeatherObservation {
        id: Some(row.get(0)?),
        location_id: row.get(1)?,
        air_temperature_c: row.get(2)?,
        surface_temperature_c: row.get(3)?,
        humidity_pct: row.get(4)?,
        wind_speed_kph: row.get(5)?,
        wind_direction: row.get(6)?,
        condition_text: row.get(7)?,
        is_drying: row.get(8)?,
        observed_at_millis: row.get(9)?,
    })
}
