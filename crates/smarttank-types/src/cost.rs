//! Cost configuration used by the device's usage calculator.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// What the configured price applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CostKind {
    /// Price per electricity unit (kWh) consumed by the pump.
    #[default]
    Electricity,
    /// Price per liter of water.
    Water,
}

impl CostKind {
    /// Wire and storage name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CostKind::Electricity => "electricity",
            CostKind::Water => "water",
        }
    }

    /// Label describing what one unit of `amount` buys.
    #[must_use]
    pub fn per_unit_label(self) -> &'static str {
        match self {
            CostKind::Electricity => "per unit",
            CostKind::Water => "per liter",
        }
    }
}

impl fmt::Display for CostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CostKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "electricity" => Ok(CostKind::Electricity),
            "water" => Ok(CostKind::Water),
            other => Err(ValidationError::UnknownCostKind(other.to_string())),
        }
    }
}

/// A validated price configuration.
///
/// The amount is kept as the decimal string the user typed so it is sent to
/// the device and persisted exactly as entered.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CostConfig {
    kind: CostKind,
    amount: String,
}

impl CostConfig {
    /// Validate and create a cost configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use smarttank_types::{CostConfig, CostKind};
    ///
    /// let cost = CostConfig::new(CostKind::Electricity, " 20 ").unwrap();
    /// assert_eq!(cost.amount(), "20");
    /// assert!(CostConfig::new(CostKind::Water, "-1").is_err());
    /// ```
    pub fn new(kind: CostKind, amount: impl Into<String>) -> ValidationResult<Self> {
        let amount = amount.into().trim().to_string();
        if amount.is_empty() {
            return Err(ValidationError::InvalidCost("amount is required".to_string()));
        }
        // The firmware splits commands on ':', so reject anything that is not a plain decimal.
        if !amount.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(ValidationError::InvalidCost(format!(
                "'{}' is not a non-negative decimal",
                amount
            )));
        }
        match amount.parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => Ok(Self { kind, amount }),
            _ => Err(ValidationError::InvalidCost(format!(
                "'{}' is not a non-negative decimal",
                amount
            ))),
        }
    }

    /// What the price applies to.
    pub fn kind(&self) -> CostKind {
        self.kind
    }

    /// The price as entered.
    pub fn amount(&self) -> &str {
        &self.amount
    }

    /// The price as a number.
    pub fn amount_value(&self) -> f64 {
        // Validated in `new`.
        self.amount.parse().unwrap_or_default()
    }
}
