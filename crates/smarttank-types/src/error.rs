//! Validation errors for user-entered setup values.

use thiserror::Error;

/// Errors raised while validating values entered in the setup wizard.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in smarttank-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// Tank dimensions are missing, non-numeric, or produce a non-positive size.
    #[error("Invalid tank dimensions: {0}")]
    InvalidDimensions(String),

    /// Cost amount is not a non-negative decimal.
    #[error("Invalid cost: {0}")]
    InvalidCost(String),

    /// Unrecognized length unit.
    #[error("Unknown unit: {0} (expected cm, ft or inches)")]
    UnknownUnit(String),

    /// Text that is not a known device command.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Unrecognized cost type.
    #[error("Unknown cost type: {0} (expected electricity or water)")]
    UnknownCostKind(String),
}

/// Result type alias using smarttank-types' ValidationError type.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;
