//! Settings repository implementation

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};

/// Trait for key/value settings storage
pub trait SettingsRepository {
    /// Read a raw setting value
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a raw setting value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Read a boolean setting; absent or unparsable values are `false`
    fn get_bool(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some_and(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        }))
    }

    /// Write a boolean setting
    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set(key, if value { "true" } else { "false" })
    }
}

/// `SQLite` implementation of `SettingsRepository`
pub struct SqliteSettingsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSettingsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }
}
