//! Main store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension};
use time::OffsetDateTime;
use tracing::{debug, info};

use smarttank_types::KeyValueStore;

use crate::error::{Error, Result};
use crate::models::StoredSetting;
use crate::schema;

/// SQLite-backed store for setup values.
pub struct Store {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        schema::initialize(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every stored value, ordered by key.
    pub fn entries(&self) -> Result<Vec<StoredSetting>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key, value, updated_at FROM settings ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            let updated_at: i64 = row.get(2)?;
            Ok(StoredSetting {
                key: row.get(0)?,
                value: row.get(1)?,
                updated_at: OffsetDateTime::from_unix_timestamp(updated_at)
                    .unwrap_or(OffsetDateTime::UNIX_EPOCH),
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

fn upsert(conn: &Connection, key: &str, value: &str, now: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
        rusqlite::params![key, value, now],
    )
}

impl KeyValueStore for Store {
    type Error = Error;

    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row("SELECT value FROM settings WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        upsert(&self.conn(), key, value, now)?;
        debug!("Stored {}", key);
        Ok(())
    }

    /// Writes all pairs in one transaction.
    fn set_many(&self, pairs: &[(&str, String)]) -> Result<()> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for (key, value) in pairs {
            upsert(&tx, key, value, now)?;
        }
        tx.commit()?;
        debug!("Stored {} values", pairs.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM settings WHERE key = ?", [key])?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let removed = self.conn().execute("DELETE FROM settings", [])?;
        info!("Cleared {} stored values", removed);
        Ok(())
    }
}
