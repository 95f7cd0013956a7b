//! Text commands understood by the SmartTank firmware.
//!
//! Commands are plain ASCII tokens written to the control characteristic.
//! Arguments are separated by `:`; the pump command uses `=`.
//!
//! | Command | Wire form |
//! |---------|-----------|
//! | Enter setup mode | `SETUP_MODE` |
//! | Tank dimensions | `SET_TANK_DIMENSIONS:<height_cm>:<diameter_cm>` |
//! | Cost | `SET_COST:<electricity\|water>:<amount>` |
//! | Finish setup | `SETUP_DONE` |
//! | Wi-Fi handoff | `CONNECT_WIFI:<ssid>:<password>` |
//! | Pump | `PUMP=ON` / `PUMP=OFF` |
//! | Request config | `GET_CONFIG` |

use core::fmt;
use core::str::FromStr;

use crate::cost::{CostConfig, CostKind};
use crate::dimensions::NormalizedDimensions;
use crate::error::ValidationError;

/// A command sent to the device.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new commands
/// in future firmware versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Command {
    /// Put the device into setup mode.
    SetupMode,
    /// Configure the tank size. Values are sent with one decimal place.
    SetTankDimensions(NormalizedDimensions),
    /// Configure the cost used for usage estimates.
    SetCost(CostConfig),
    /// Mark setup as complete.
    SetupDone,
    /// Hand the device over to a Wi-Fi network.
    ConnectWifi {
        /// Network name.
        ssid: String,
        /// Network passphrase.
        password: String,
    },
    /// Switch the pump relay.
    Pump(bool),
    /// Ask the device to publish its stored configuration.
    GetConfig,
}

impl Command {
    /// Short name for logs, without arguments (credentials never appear).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetupMode => "SETUP_MODE",
            Command::SetTankDimensions(_) => "SET_TANK_DIMENSIONS",
            Command::SetCost(_) => "SET_COST",
            Command::SetupDone => "SETUP_DONE",
            Command::ConnectWifi { .. } => "CONNECT_WIFI",
            Command::Pump(_) => "PUMP",
            Command::GetConfig => "GET_CONFIG",
        }
    }

    /// The text written to the device.
    ///
    /// # Examples
    ///
    /// ```
    /// use smarttank_types::{Command, LengthUnit, TankDimensions};
    ///
    /// let dims = TankDimensions::new(150.0, LengthUnit::Cm, 60.0, LengthUnit::Cm)
    ///     .normalize()
    ///     .unwrap();
    /// assert_eq!(
    ///     Command::SetTankDimensions(dims).to_wire(),
    ///     "SET_TANK_DIMENSIONS:120.0:60.0"
    /// );
    /// ```
    #[must_use]
    pub fn to_wire(&self) -> String {
        match self {
            Command::SetupMode => "SETUP_MODE".to_string(),
            Command::SetTankDimensions(dims) => format!(
                "SET_TANK_DIMENSIONS:{}:{}",
                dims.height_text(),
                dims.diameter_text()
            ),
            Command::SetCost(cost) => format!("SET_COST:{}:{}", cost.kind(), cost.amount()),
            Command::SetupDone => "SETUP_DONE".to_string(),
            Command::ConnectWifi { ssid, password } => {
                format!("CONNECT_WIFI:{}:{}", ssid, password)
            }
            Command::Pump(true) => "PUMP=ON".to_string(),
            Command::Pump(false) => "PUMP=OFF".to_string(),
            Command::GetConfig => "GET_CONFIG".to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Keep the passphrase out of logs.
            Command::ConnectWifi { ssid, .. } => write!(f, "CONNECT_WIFI:{}:***", ssid),
            other => f.write_str(&other.to_wire()),
        }
    }
}

impl FromStr for Command {
    type Err = ValidationError;

    /// Parse the wire form, as the firmware does.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "SETUP_MODE" => return Ok(Command::SetupMode),
            "SETUP_DONE" => return Ok(Command::SetupDone),
            "GET_CONFIG" => return Ok(Command::GetConfig),
            "PUMP=ON" => return Ok(Command::Pump(true)),
            "PUMP=OFF" => return Ok(Command::Pump(false)),
            _ => {}
        }

        if let Some(args) = s.strip_prefix("SET_TANK_DIMENSIONS:") {
            let (height, diameter) = args.split_once(':').ok_or_else(|| {
                ValidationError::InvalidDimensions(format!("malformed command '{}'", s))
            })?;
            let parse = |v: &str| {
                v.parse::<f64>().map_err(|_| {
                    ValidationError::InvalidDimensions(format!("'{}' is not a number", v))
                })
            };
            return Ok(Command::SetTankDimensions(NormalizedDimensions {
                height_cm: parse(height)?,
                diameter_cm: parse(diameter)?,
            }));
        }

        if let Some(args) = s.strip_prefix("SET_COST:") {
            let (kind, amount) = args.split_once(':').ok_or_else(|| {
                ValidationError::InvalidCost(format!("malformed command '{}'", s))
            })?;
            let kind: CostKind = kind.parse()?;
            return Ok(Command::SetCost(CostConfig::new(kind, amount)?));
        }

        if let Some(args) = s.strip_prefix("CONNECT_WIFI:") {
            // Passwords may contain ':', SSIDs are split at the first one.
            let (ssid, password) = args.split_once(':').unwrap_or((args, ""));
            return Ok(Command::ConnectWifi {
                ssid: ssid.to_string(),
                password: password.to_string(),
            });
        }

        Err(ValidationError::UnknownCommand(one_line(s).to_string()))
    }
}

fn one_line(s: &str) -> &str {
    s.lines().next().unwrap_or_default()
}
