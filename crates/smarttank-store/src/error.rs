//! Store errors.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// SQLite rejected a statement or could not open the file.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The directory holding the database file could not be created.
    #[error("Cannot create {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
