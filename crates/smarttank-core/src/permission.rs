//! Runtime permissions required before scanning.
//!
//! Desktop Bluetooth stacks have no runtime permission model, so the gate
//! grants immediately. Android needs location permissions, and from
//! Android 12 on also the dedicated Bluetooth scan and connect permissions:
//!
//! | Platform | Requested |
//! |----------|-----------|
//! | Desktop (macOS, Linux, Windows) | nothing |
//! | Android < 12 | coarse + fine location |
//! | Android >= 12 | Bluetooth scan + Bluetooth connect + fine location |
//!
//! Asking the user is delegated to a [`PermissionPrompt`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// The platform whose permission model applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioPlatform {
    /// macOS, Linux or Windows.
    #[default]
    Desktop,
    /// Android with the given major version.
    Android {
        /// Major OS version, e.g. `12`.
        version: u32,
    },
}

impl RadioPlatform {
    /// Whether a never-ask answer is reported as [`PermissionOutcome::PermanentlyDenied`].
    ///
    /// Only the Android 12+ Bluetooth permission flow does this; older
    /// releases report it as a plain denial.
    pub fn reports_permanent_denial(self) -> bool {
        matches!(self, RadioPlatform::Android { version } if version >= 12)
    }

    /// Permissions that must all be granted before scanning.
    pub fn required_permissions(self) -> &'static [Permission] {
        match self {
            RadioPlatform::Desktop => &[],
            RadioPlatform::Android { version } if version < 12 => &[
                Permission::AccessCoarseLocation,
                Permission::AccessFineLocation,
            ],
            RadioPlatform::Android { .. } => &[
                Permission::BluetoothScan,
                Permission::BluetoothConnect,
                Permission::AccessFineLocation,
            ],
        }
    }
}

impl fmt::Display for RadioPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioPlatform::Desktop => write!(f, "desktop"),
            RadioPlatform::Android { version } => write!(f, "android:{}", version),
        }
    }
}

impl FromStr for RadioPlatform {
    type Err = Error;

    /// Parse `desktop` or `android:<version>`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        if s == "desktop" {
            return Ok(RadioPlatform::Desktop);
        }
        if let Some(version) = s.strip_prefix("android:") {
            let version = version.parse::<u32>().map_err(|_| {
                Error::invalid_config(format!("invalid Android version '{}'", version))
            })?;
            return Ok(RadioPlatform::Android { version });
        }
        Err(Error::invalid_config(format!(
            "unknown platform '{}' (expected 'desktop' or 'android:<version>')",
            s
        )))
    }
}

/// A runtime permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// `ACCESS_COARSE_LOCATION`
    AccessCoarseLocation,
    /// `ACCESS_FINE_LOCATION`
    AccessFineLocation,
    /// `BLUETOOTH_SCAN`
    BluetoothScan,
    /// `BLUETOOTH_CONNECT`
    BluetoothConnect,
}

impl Permission {
    /// Android manifest name.
    pub fn android_name(self) -> &'static str {
        match self {
            Permission::AccessCoarseLocation => "android.permission.ACCESS_COARSE_LOCATION",
            Permission::AccessFineLocation => "android.permission.ACCESS_FINE_LOCATION",
            Permission::BluetoothScan => "android.permission.BLUETOOTH_SCAN",
            Permission::BluetoothConnect => "android.permission.BLUETOOTH_CONNECT",
        }
    }
}

/// The user's answer for one permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionDecision {
    /// Allowed.
    Granted,
    /// Refused this time.
    Denied,
    /// Refused, and the system will not ask again.
    NeverAskAgain,
}

/// Overall result of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionOutcome {
    /// Every required permission was granted.
    Granted,
    /// At least one permission was refused.
    Denied,
    /// At least one permission was refused permanently.
    PermanentlyDenied,
}

impl PermissionOutcome {
    /// Whether scanning may proceed.
    pub fn is_granted(self) -> bool {
        self == PermissionOutcome::Granted
    }

    /// Whether the caller should offer a link to the system settings.
    pub fn offers_settings_link(self) -> bool {
        self == PermissionOutcome::PermanentlyDenied
    }

    /// Convert a refusal into the matching error.
    pub fn into_result(self) -> Result<()> {
        match self {
            PermissionOutcome::Granted => Ok(()),
            PermissionOutcome::Denied => Err(Error::PermissionDenied),
            PermissionOutcome::PermanentlyDenied => Err(Error::PermissionPermanentlyDenied),
        }
    }
}

/// Asks the user for permissions.
#[async_trait]
pub trait PermissionPrompt: Send + Sync {
    /// Request all `permissions` at once and report the answer for each.
    ///
    /// A permission missing from the returned map counts as denied.
    async fn request(
        &self,
        permissions: &[Permission],
    ) -> Result<HashMap<Permission, PermissionDecision>>;
}

/// Decides whether scanning is allowed on the current platform.
#[derive(Clone)]
pub struct PermissionGate {
    platform: RadioPlatform,
    prompt: Option<Arc<dyn PermissionPrompt>>,
}

impl fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionGate")
            .field("platform", &self.platform)
            .field("has_prompt", &self.prompt.is_some())
            .finish()
    }
}

impl PermissionGate {
    /// Gate for a desktop platform; always grants.
    pub fn desktop() -> Self {
        Self {
            platform: RadioPlatform::Desktop,
            prompt: None,
        }
    }

    /// Gate for `platform` that asks through `prompt`.
    pub fn new(platform: RadioPlatform, prompt: Arc<dyn PermissionPrompt>) -> Self {
        Self {
            platform,
            prompt: Some(prompt),
        }
    }

    /// The platform this gate applies to.
    pub fn platform(&self) -> RadioPlatform {
        self.platform
    }

    /// Request whatever the platform requires.
    pub async fn request_permissions(&self) -> PermissionOutcome {
        let required = self.platform.required_permissions();
        if required.is_empty() {
            debug!("No runtime permissions required on {}", self.platform);
            return PermissionOutcome::Granted;
        }

        let Some(prompt) = &self.prompt else {
            warn!(
                "{} requires permissions but no prompt is configured",
                self.platform
            );
            return PermissionOutcome::Denied;
        };

        let decisions = match prompt.request(required).await {
            Ok(decisions) => decisions,
            Err(e) => {
                warn!("Permission prompt failed: {}", e);
                return PermissionOutcome::Denied;
            }
        };

        let outcome = evaluate(self.platform, required, &decisions);
        info!("Permission request on {}: {:?}", self.platform, outcome);
        outcome
    }
}

fn evaluate(
    platform: RadioPlatform,
    required: &[Permission],
    decisions: &HashMap<Permission, PermissionDecision>,
) -> PermissionOutcome {
    let mut outcome = PermissionOutcome::Granted;
    for permission in required {
        match decisions.get(permission) {
            Some(PermissionDecision::Granted) => {}
            Some(PermissionDecision::NeverAskAgain) if platform.reports_permanent_denial() => {
                return PermissionOutcome::PermanentlyDenied;
            }
            Some(_) | None => outcome = PermissionOutcome::Denied,
        }
    }
    outcome
}
