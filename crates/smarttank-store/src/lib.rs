//! Local persistence for SmartTank setup values.
//!
//! The setup wizard records what it configured (tank size, cost, whether
//! setup finished) so the app can skip setup on the next launch. This crate
//! keeps those values in a small SQLite database and implements
//! [`smarttank_types::KeyValueStore`] on top of it.
//!
//! # Example
//!
//! ```no_run
//! use smarttank_store::Store;
//! use smarttank_types::{KeyValueStore, keys};
//!
//! let store = Store::open_default()?;
//! if store.get(keys::DEVICE_SETUP_DONE)?.as_deref() == Some("true") {
//!     println!("Device already set up");
//! }
//! # Ok::<(), smarttank_store::Error>(())
//! ```

mod error;
mod models;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::StoredSetting;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/smarttank/settings.db`
/// - macOS: `~/Library/Application Support/smarttank/settings.db`
/// - Windows: `C:\Users\<user>\AppData\Local\smarttank\settings.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("smarttank")
        .join("settings.db")
}
