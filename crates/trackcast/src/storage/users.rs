//! Users and their unit preferences.

use rusqlite::{params, OptionalExtension};
use tracing::debug;

use crate::error::{Error, Result};
use crate::observation::{NewUser, User};

use super::schema::USER_COLUMNS;
use super::Storage;

impl Storage {
    /// Create a user and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Duplicate`] if the username is taken, or an error if
    /// the database operation fails.
    pub fn add_user(&self, user: &NewUser) -> Result<User> {
        let conn = self.lock()?;
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
            [&user.username],
            |row| row.get(0),
        )?;
        if taken {
            return Err(Error::Duplicate {
                entity: "user",
                key: user.username.clone(),
            });
        }

        conn.execute(
            r"
            INSERT INTO users (username, temperature_unit, wind_speed_unit, date_joined_millis)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![
                user.username,
                user.temperature_unit,
                user.wind_speed_unit,
                user.date_joined_millis,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!("Inserted user {} ({})", id, user.username);
        Ok(User {
            id,
            username: user.username.clone(),
            temperature_unit: user.temperature_unit.clone(),
            wind_speed_unit: user.wind_speed_unit.clone(),
            date_joined_millis: user.date_joined_millis,
        })
    }

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Get a user by exact username.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                [username],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Every user, by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn users(&self) -> Result<Vec<User>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Overwrite a user's username and unit preferences.
    ///
    /// The join date never changes. Returns `false` if no user has `user.id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Duplicate`] if another user already has the new
    /// username, or an error if the database operation fails.
    pub fn update_user(&self, user: &User) -> Result<bool> {
        let conn = self.lock()?;
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 AND id != ?2)",
            params![user.username, user.id],
            |row| row.get(0),
        )?;
        if taken {
            return Err(Error::Duplicate {
                entity: "user",
                key: user.username.clone(),
            });
        }

        let affected = conn.execute(
            "UPDATE users SET username = ?1, temperature_unit = ?2, wind_speed_unit = ?3 \
             WHERE id = ?4",
            params![
                user.username,
                user.temperature_unit,
                user.wind_speed_unit,
                user.id
            ],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        temperature_unit: row.get(2)?,
        wind_speed_unit: row.get(3)?,
        date_joined_millis: row.get(4)?,
    })
}
