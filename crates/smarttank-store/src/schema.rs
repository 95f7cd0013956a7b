//! Database schema, versioned with SQLite's `user_version` pragma.

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::error::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

fn user_version(conn: &Connection) -> Result<i32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Create or upgrade the schema.
pub fn initialize(conn: &Connection) -> Result<()> {
    let version = user_version(conn)?;
    if version == SCHEMA_VERSION {
        return Ok(());
    }
    if version > SCHEMA_VERSION {
        warn!(
            "Database schema v{} is newer than this build (v{}); using it as is",
            version, SCHEMA_VERSION
        );
        return Ok(());
    }

    debug!("Upgrading schema v{} -> v{}", version, SCHEMA_VERSION);
    // One row per setup value, e.g. tank_height or device_setup_done.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS settings (
             key TEXT PRIMARY KEY,
             value TEXT NOT NULL,
             updated_at INTEGER NOT NULL
         );",
    )?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}
