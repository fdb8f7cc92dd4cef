//! Storage layer for trackcast.
//!
//! This module provides `SQLite`-based persistent storage for users, their
//! saved tracks and the tracks' weather history. Weather rows are accessed through the
//! [`WeatherRecordStore`] trait so the fetch coordinator does not depend on
//! `SQLite` directly.

pub mod migrations;
pub mod schema;
mod users;
mod weather;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::observation::{LocationId, NewTrack, Track};

pub use weather::{WeatherRecordStore, DEFAULT_RETENTION_LIMIT};

use schema::TRACK_COLUMNS;

/// `SQLite` storage for users, tracks and weather observations.
///
/// The connection sits behind a mutex: every operation, including the
/// composite insert-and-trim, sees a consistent view of the rows for a
/// location.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist,
    /// and migrates the schema to the current version.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let mut conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&mut conn)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&mut conn)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("database connection lock poisoned"))
    }

    /// Save a new track and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the owning user does not exist, or an
    /// error if the database operation fails.
    pub fn add_track(&self, track: &NewTrack) -> Result<Track> {
        let conn = self.lock()?;
        let owner_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            [track.user_id],
            |row| row.get(0),
        )?;
        if !owner_exists {
            return Err(Error::user_not_found(track.user_id));
        }
        conn.execute(
            r"
            INSERT INTO tracks (user_id, name, location, latitude, longitude, country,
                                is_favorite, date_added_millis)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                track.user_id,
                track.name,
                track.location,
                track.latitude,
                track.longitude,
                track.country,
                track.is_favorite,
                track.date_added_millis,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!("Inserted track {} ({})", id, track.name);
        Ok(Track {
            id,
            user_id: track.user_id,
            name: track.name.clone(),
            location: track.location.clone(),
            latitude: track.latitude,
            longitude: track.longitude,
            country: track.country.clone(),
            is_favorite: track.is_favorite,
            date_added_millis: track.date_added_millis,
        })
    }

    /// Get a track by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_track(&self, id: LocationId) -> Result<Option<Track>> {
        let conn = self.lock()?;
        let track = conn
            .query_row(
                &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?1"),
                [id],
                Self::row_to_track,
            )
            .optional()?;
        Ok(track)
    }

    /// All tracks saved by a user, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn tracks_for_user(&self, user_id: i64) -> Result<Vec<Track>> {
        self.query_tracks(
            &format!(
                "SELECT {TRACK_COLUMNS} FROM tracks WHERE user_id = ?1 ORDER BY name COLLATE NOCASE ASC"
            ),
            params![user_id],
        )
    }

    /// A user's favorite tracks, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn favorite_tracks(&self, user_id: i64) -> Result<Vec<Track>> {
        self.query_tracks(
            &format!(
                "SELECT {TRACK_COLUMNS} FROM tracks WHERE user_id = ?1 AND is_favorite = 1 \
                 ORDER BY name COLLATE NOCASE ASC"
            ),
            params![user_id],
        )
    }

    /// Search a user's tracks by name.
    ///
    /// Case-insensitive substring match. `%` and `_` in the query match
    /// themselves.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn search_tracks(&self, user_id: i64, query: &str) -> Result<Vec<Track>> {
        let pattern = format!("%{}%", escape_like(query));
        self.query_tracks(
            &format!(
                "SELECT {TRACK_COLUMNS} FROM tracks WHERE user_id = ?1 AND name LIKE ?2 \
                 ESCAPE '\\' ORDER BY name COLLATE NOCASE ASC"
            ),
            params![user_id, pattern],
        )
    }

    /// Every saved track regardless of owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn all_tracks(&self) -> Result<Vec<Track>> {
        self.query_tracks(
            &format!("SELECT {TRACK_COLUMNS} FROM tracks ORDER BY id ASC"),
            params![],
        )
    }

    /// Overwrite a track's editable fields.
    ///
    /// Name, location, coordinates, country and favorite flag are taken from
    /// `track`; the owner and date added never change. Returns `false` if no
    /// track has `track.id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn update_track(&self, track: &Track) -> Result<bool> {
        let conn = self.lock()?;
        let affected = conn.execute(
            r"
            UPDATE tracks
            SET name = ?1, location = ?2, latitude = ?3, longitude = ?4, country = ?5,
                is_favorite = ?6
            WHERE id = ?7
            ",
            params![
                track.name,
                track.location,
                track.latitude,
                track.longitude,
                track.country,
                track.is_favorite,
                track.id,
            ],
        )?;
        if affected > 0 {
            debug!("Updated track {} ({})", track.id, track.name);
        }
        Ok(affected > 0)
    }

    /// Mark or unmark a track as favorite.
    ///
    /// Returns `false` if the track does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_favorite(&self, id: LocationId, favorite: bool) -> Result<bool> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "UPDATE tracks SET is_favorite = ?1 WHERE id = ?2",
            params![favorite, id],
        )?;
        Ok(affected > 0)
    }

    /// Delete a track together with its weather history.
    ///
    /// Both deletes run in one transaction. Returns `false` if the track did
    /// not exist, in which case nothing is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_track(&self, id: LocationId) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let removed = tx.execute("DELETE FROM tracks WHERE id = ?1", [id])?;
        if removed == 0 {
            return Ok(false);
        }
        let observations = tx.execute(
            "DELETE FROM weather_observations WHERE location_id = ?1",
            [id],
        )?;
        tx.commit()?;

        info!(
            "Deleted track {} and {} weather observations",
            id, observations
        );
        Ok(true)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the database file
    /// cannot be inspected.
    pub fn stats(&self) -> Result<StorageStats> {
        let conn = self.lock()?;

        let track_count: i64 = conn.query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        let (observation_count, oldest_observation_millis, newest_observation_millis): (
            i64,
            Option<i64>,
            Option<i64>,
        ) = conn.query_row(
            "SELECT COUNT(*), MIN(observed_at_millis), MAX(observed_at_millis) FROM weather_observations",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path)?.len()
        };

        Ok(StorageStats {
            track_count,
            observation_count,
            oldest_observation_millis,
            newest_observation_millis,
            db_size_bytes,
        })
    }

    fn query_tracks(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Track>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let tracks = stmt
            .query_map(params, Self::row_to_track)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    /// Convert a database row to a Track struct.
    fn row_to_track(row: &rusqlite::Row) -> rusqlite::Result<Track> {
        Ok(Track {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            location: row.get(3)?,
            latitude: row.get(4)?,
            longitude: row.get(5)?,
            country: row.get(6)?,
            is_favorite: row.get(7)?,
            date_added_millis: row.get(8)?,
        })
    }
}

/// Escape `LIKE` wildcards so they match literally under `ESCAPE '\'`.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of saved tracks.
    pub track_count: i64,
    /// Number of weather observations across all tracks.
    pub observation_count: i64,
    /// Timestamp of the oldest observation.
    pub oldest_observation_millis: Option<i64>,
    /// Timestamp of the newest observation.
    pub newest_observation_millis: Option<i64>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
