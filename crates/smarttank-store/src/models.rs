//! Rows returned by the store.

use time::OffsetDateTime;

/// A persisted setup value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSetting {
    /// Setting key, one of [`smarttank_types::keys`] for wizard values.
    pub key: String,
    /// Stored text.
    pub value: String,
    /// When the value was last written.
    pub updated_at: OffsetDateTime,
}
