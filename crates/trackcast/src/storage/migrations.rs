//! Schema versioning for the trackcast database.
//!
//! The version lives in the `metadata` table. Each migration step runs inside
//! its own transaction together with the version bump.

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::schema::{CREATE_METADATA_TABLE, V1_STATEMENTS, V2_STATEMENTS};

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// Ordered migration steps. Index `n` upgrades version `n` to `n + 1`.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "tracks and weather observations",
        statements: V1_STATEMENTS,
    },
    Migration {
        version: 2,
        description: "users, tracks owned by users",
        statements: V2_STATEMENTS,
    },
];

/// The schema version a fully migrated database reports.
pub const CURRENT_VERSION: i32 = 2;

#[derive(Debug)]
struct Migration {
    version: i32,
    description: &'static str,
    statements: &'static [&'static str],
}

/// Bring the database schema up to [`CURRENT_VERSION`].
///
/// Safe to call on every open.
///
/// # Errors
///
/// Returns an error if the stored version is unreadable, newer than this
/// build understands, or a migration statement fails.
pub fn initialize_schema(conn: &mut Connection) -> Result<()> {
    conn.execute(CREATE_METADATA_TABLE, [])?;

    let version = schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > version) {
        debug!(
            "Applying schema migration {} ({})",
            migration.version, migration.description
        );
        let tx = conn.transaction()?;
        for statement in migration.statements {
            tx.execute(statement, [])?;
        }
        set_schema_version(&tx, migration.version)?;
        tx.commit()?;
        info!("Database schema migrated to version {}", migration.version);
    }

    Ok(())
}

/// Read the stored schema version; a fresh database reports 0.
pub fn schema_version(conn: &Connection) -> Result<i32> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        None => Ok(0),
        Some(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}
