//! `SQLite` schema definitions for trackcast.
//!
//! Tracks reference their owner in `users`. Observations carry a plain
//! `location_id` column with no declared foreign key; removing a track
//! deletes its observations explicitly (see
//! [`super::Storage::delete_track`]).

/// SQL statement to create the version 1 tracks table, which had no owner
/// constraint.
pub const CREATE_TRACKS_TABLE_V1: &str = r"
CREATE TABLE IF NOT EXISTS tracks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    location TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    country TEXT NOT NULL,
    is_favorite INTEGER NOT NULL DEFAULT 0,
    date_added_millis INTEGER NOT NULL
)
";

/// SQL statement to create an index on `user_id` for per-user listings.
pub const CREATE_TRACKS_USER_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_tracks_user ON tracks(user_id)
";

/// SQL statement to create the weather observations table.
pub const CREATE_OBSERVATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS weather_observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    location_id INTEGER NOT NULL,
    air_temperature_c REAL NOT NULL,
    surface_temperature_c REAL NOT NULL,
    humidity_pct INTEGER NOT NULL,
    wind_speed_kph REAL NOT NULL,
    wind_direction TEXT NOT NULL,
    condition_text TEXT NOT NULL,
    is_drying INTEGER NOT NULL,
    observed_at_millis INTEGER NOT NULL
)
";

/// Recency lookups and retention trims are always per location.
pub const CREATE_OBSERVATIONS_RECENCY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_observations_location_time
    ON weather_observations(location_id, observed_at_millis DESC, id DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// SQL statement to create the users table.
pub const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    temperature_unit TEXT NOT NULL DEFAULT 'Celsius',
    wind_speed_unit TEXT NOT NULL DEFAULT 'kph',
    date_joined_millis INTEGER NOT NULL
)
";

/// The CLI acts as user 1 unless told otherwise.
pub const SEED_DEFAULT_USER: &str = r"
INSERT OR IGNORE INTO users (id, username, date_joined_millis) VALUES (1, 'driver', 0)
";

/// Owners referenced by version 1 tracks become users.
pub const BACKFILL_TRACK_OWNERS: &str = r"
INSERT OR IGNORE INTO users (id, username, date_joined_millis)
SELECT DISTINCT user_id, 'user' || user_id, 0 FROM tracks
";

/// Tracks table with `user_id` referencing `users`.
pub const CREATE_TRACKS_TABLE: &str = r"
CREATE TABLE tracks_v2 (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    name TEXT NOT NULL,
    location TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    country TEXT NOT NULL,
    is_favorite INTEGER NOT NULL DEFAULT 0,
    date_added_millis INTEGER NOT NULL
)
";

/// Copy version 1 rows, ids included, into the constrained table.
pub const COPY_TRACKS_TO_V2: &str = r"
INSERT INTO tracks_v2 (id, user_id, name, location, latitude, longitude, country,
                       is_favorite, date_added_millis)
SELECT id, user_id, name, location, latitude, longitude, country,
       is_favorite, date_added_millis
FROM tracks
";

/// Statements making up schema version 1.
pub const V1_STATEMENTS: &[&str] = &[
    CREATE_TRACKS_TABLE_V1,
    CREATE_TRACKS_USER_INDEX,
    CREATE_OBSERVATIONS_TABLE,
    CREATE_OBSERVATIONS_RECENCY_INDEX,
];

/// Statements upgrading version 1 to version 2: users, and tracks rebuilt
/// with an owner reference.
pub const V2_STATEMENTS: &[&str] = &[
    CREATE_USERS_TABLE,
    SEED_DEFAULT_USER,
    BACKFILL_TRACK_OWNERS,
    CREATE_TRACKS_TABLE,
    COPY_TRACKS_TO_V2,
    "DROP TABLE tracks",
    "ALTER TABLE tracks_v2 RENAME TO tracks",
    CREATE_TRACKS_USER_INDEX,
];

/// Column list shared by every observation query, in `row_to_observation` order.
pub const OBSERVATION_COLUMNS: &str = "id, location_id, air_temperature_c, \
    surface_temperature_c, humidity_pct, wind_speed_kph, wind_direction, \
    condition_text, is_drying, observed_at_millis";

/// Column list shared by every track query, in `row_to_track` order.
pub const TRACK_COLUMNS: &str =
    "id, user_id, name, location, latitude, longitude, country, is_favorite, date_added_millis";

/// Column list shared by every user query, in `row_to_user` order.
pub const USER_COLUMNS: &str =
    "id, username, temperature_unit, wind_speed_unit, date_joined_millis";
