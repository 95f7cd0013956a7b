//! Error types for smarttank-core.
//!
//! Every operation of the setup wizard reports failures through [`Error`].
//! Most variants are terminal for the current operation but leave the
//! wizard where it was, so the user can correct the input or retry.
//!
//! | Error | Typical recovery |
//! |-------|------------------|
//! | [`Error::PermissionDenied`] | Ask again on the next scan |
//! | [`Error::PermissionPermanentlyDenied`] | Send the user to the system settings |
//! | [`Error::RadioUnavailable`] | Turn Bluetooth on and scan again |
//! | [`Error::NoDevicesFound`] | Scan again (soft, the wizard still advances) |
//! | [`Error::ConnectionFailed`] | Pick the device again; retries were already spent |
//! | [`Error::InvalidDimensions`] / [`Error::InvalidCost`] | Fix the input |
//! | [`Error::InvalidTransition`] | Programming error in the caller |

use std::time::Duration;

use thiserror::Error;

use smarttank_types::ValidationError;

use crate::provisioning::SetupStep;

/// Errors that can occur while provisioning a SmartTank device.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The user declined the Bluetooth permissions.
    #[error("Bluetooth permissions were denied")]
    PermissionDenied,

    /// The user declined the Bluetooth permissions and asked not to be asked again.
    #[error("Bluetooth permissions were permanently denied; enable them in the system settings")]
    PermissionPermanentlyDenied,

    /// The permission dialog could not be shown or was dismissed.
    #[error("Permission prompt failed: {0}")]
    Prompt(String),

    /// No adapter, or the adapter is not powered on.
    #[error("Bluetooth is unavailable or turned off")]
    RadioUnavailable,

    /// The advertisement stream reported an error.
    #[error("Scan failed: {0}")]
    ScanFailed(String),

    /// A scan completed without finding a matching device.
    #[error("No SmartTank devices found")]
    NoDevicesFound,

    /// Every connection attempt failed.
    #[error("Failed to connect to {identifier} after {attempts} attempt(s): {reason}")]
    ConnectionFailed {
        /// Device that could not be reached.
        identifier: String,
        /// Number of attempts made.
        attempts: u32,
        /// Error of the last attempt.
        reason: String,
    },

    /// A command could not be delivered.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// Tank dimensions were rejected.
    #[error("Invalid tank dimensions: {0}")]
    InvalidDimensions(String),

    /// The cost amount was rejected.
    #[error("Invalid cost: {0}")]
    InvalidCost(String),

    /// The identifier does not name a device from the last scan.
    #[error("Device not selected: {0}")]
    DeviceNotSelected(String),

    /// The operation is not allowed in the current step.
    #[error("Cannot {operation} while {step}")]
    InvalidTransition {
        /// Step the wizard is in.
        step: SetupStep,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// The key-value store rejected a write.
    #[error("Failed to persist setup: {0}")]
    Persistence(String),

    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// The connected device does not expose the control characteristic.
    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(String),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Wrap a key-value store error.
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    /// Whether the wizard still advances despite this error.
    pub fn is_soft(&self) -> bool {
        matches!(self, Error::NoDevicesFound)
    }

    /// Whether the user should be offered a link to the system settings.
    pub fn offers_settings_link(&self) -> bool {
        matches!(self, Error::PermissionPermanentlyDenied)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidDimensions(msg) => Error::InvalidDimensions(msg),
            ValidationError::UnknownUnit(_) => Error::InvalidDimensions(err.to_string()),
            ValidationError::InvalidCost(msg) => Error::InvalidCost(msg),
            ValidationError::UnknownCostKind(_) => Error::InvalidCost(err.to_string()),
            // Handle future ValidationError variants (non_exhaustive)
            _ => Error::CommandFailed(err.to_string()),
        }
    }
}

/// Result type alias using smarttank-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::ConnectionFailed {
            identifier: "AA:BB:CC:DD:EE:FF".to_string(),
            attempts: 3,
            reason: "connect timed out".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("AA:BB:CC:DD:EE:FF"));
        assert!(text.contains("3 attempt"));

        let err = Error::timeout("connect", Duration::from_secs(10));
        assert!(err.to_string().contains("10s"));

        let err = Error::InvalidTransition {
            step: SetupStep::Scanning,
            operation: "submit_cost",
        };
        assert_eq!(err.to_string(), "Cannot submit_cost while scanning");
    }

    #[test]
    fn test_soft_and_settings_link() {
        assert!(Error::NoDevicesFound.is_soft());
        assert!(!Error::RadioUnavailable.is_soft());
        assert!(Error::PermissionPermanentlyDenied.offers_settings_link());
        assert!(!Error::PermissionDenied.offers_settings_link());
    }

    #[test]
    fn test_validation_error_conversion() {
        let err: Error = ValidationError::InvalidDimensions("too short".to_string()).into();
        assert!(matches!(err, Error::InvalidDimensions(ref m) if m == "too short"));

        let err: Error = ValidationError::UnknownCostKind("gas".to_string()).into();
        assert!(matches!(err, Error::InvalidCost(_)));

        let err: Error = ValidationError::UnknownUnit("yards".to_string()).into();
        assert!(matches!(err, Error::InvalidDimensions(_)));
    }

    #[test]
    fn test_btleplug_error_conversion() {
        fn _assert_from_impl<T: From<btleplug::Error>>() {}
        _assert_from_impl::<Error>();
    }
}
