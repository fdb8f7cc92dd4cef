//! Error types for trackcast.
//!
//! [`Error`] covers the tracks database, configuration loading and the file
//! system. Weather fetch failures never surface here; the coordinator reports
//! them as [`crate::coordinator::FetchError`] values inside its outcomes.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the tracks database, configuration or file system.
#[derive(Error, Debug)]
pub enum Error {
    /// The database file could not be opened.
    #[error("cannot open track database {path}: {source}")]
    DatabaseOpen {
        /// Database file.
        path: PathBuf,
        /// SQLite's reason.
        #[source]
        source: rusqlite::Error,
    },

    /// A statement against the track database failed.
    #[error("track database error: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// The schema could not be brought to the current version.
    #[error("schema migration failed: {message}")]
    DatabaseMigration {
        /// What went wrong.
        message: String,
    },

    /// A referenced row does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of row that was looked up.
        entity: &'static str,
        /// Identifier that was looked up.
        id: i64,
    },

    /// A row with the same unique key already exists.
    #[error("{entity} {key} already exists")]
    Duplicate {
        /// Kind of row being created.
        entity: &'static str,
        /// The clashing key.
        key: String,
    },

    /// Figment could not assemble the configuration.
    #[error("cannot load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// A configured value is out of range.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Which setting and why.
        message: String,
    },

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The data directory could not be created.
    #[error("cannot create data directory {path}: {source}")]
    DirectoryCreate {
        /// Directory that was being created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// JSON output could not be produced.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An invariant inside trackcast was broken.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Shorthand for [`Error::Internal`].
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// A missing track.
    #[must_use]
    pub fn track_not_found(id: i64) -> Self {
        Self::NotFound { entity: "track", id }
    }

    /// A missing user.
    #[must_use]
    pub fn user_not_found(id: i64) -> Self {
        Self::NotFound { entity: "user", id }
    }
}
