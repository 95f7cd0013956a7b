//! Tank dimensions, length units, and normalization to centimeters.
//!
//! The ultrasonic level sensor sits on the tank lid, so the usable height is
//! the measured height minus a fixed mounting clearance (the safety
//! deduction). Normalization converts both dimensions to centimeters and
//! applies that deduction to the height.
//!
//! | unit | factor (cm) | safety deduction (cm) |
//! |------|-------------|-----------------------|
//! | cm | 1 | 30 |
//! | ft | 30.48 | 30.48 |
//! | inches | 2.54 | 30.48 |

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// Unit a tank dimension was entered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LengthUnit {
    /// Centimeters.
    #[default]
    Cm,
    /// Feet.
    Ft,
    /// Inches.
    Inches,
}

impl LengthUnit {
    /// All supported units, in the order they are offered to the user.
    pub const ALL: [LengthUnit; 3] = [LengthUnit::Cm, LengthUnit::Ft, LengthUnit::Inches];

    /// Centimeters per one unit.
    #[must_use]
    pub fn cm_factor(self) -> f64 {
        match self {
            LengthUnit::Cm => 1.0,
            LengthUnit::Ft => 30.48,
            LengthUnit::Inches => 2.54,
        }
    }

    /// Mounting clearance subtracted from a height entered in this unit, in cm.
    ///
    /// Feet and inches both deduct one foot; centimeters deduct a flat 30.
    #[must_use]
    pub fn safety_deduction_cm(self) -> f64 {
        match self {
            LengthUnit::Cm => 30.0,
            LengthUnit::Ft | LengthUnit::Inches => 30.48,
        }
    }

    /// Convert a value in this unit to centimeters.
    #[must_use]
    pub fn to_cm(self, value: f64) -> f64 {
        value * self.cm_factor()
    }

    /// Convert a value in centimeters to this unit.
    #[must_use]
    pub fn from_cm(self, cm: f64) -> f64 {
        cm / self.cm_factor()
    }

    /// Short label used in the UI and in persisted configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LengthUnit::Cm => "cm",
            LengthUnit::Ft => "ft",
            LengthUnit::Inches => "inches",
        }
    }

    /// Human-readable description of the safety deduction.
    #[must_use]
    pub fn deduction_label(self) -> &'static str {
        match self {
            LengthUnit::Cm => "30cm",
            LengthUnit::Ft => "1ft",
            LengthUnit::Inches => "12in",
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LengthUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cm" | "centimeters" => Ok(LengthUnit::Cm),
            "ft" | "feet" | "foot" => Ok(LengthUnit::Ft),
            "in" | "inch" | "inches" => Ok(LengthUnit::Inches),
            other => Err(ValidationError::UnknownUnit(other.to_string())),
        }
    }
}

/// Tank dimensions as entered by the user.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TankDimensions {
    /// Height in `height_unit`.
    pub height_raw: f64,
    /// Unit of `height_raw`.
    pub height_unit: LengthUnit,
    /// Diameter in `diameter_unit`.
    pub diameter_raw: f64,
    /// Unit of `diameter_raw`.
    pub diameter_unit: LengthUnit,
}

impl TankDimensions {
    /// Create dimensions from already-parsed values.
    pub fn new(
        height_raw: f64,
        height_unit: LengthUnit,
        diameter_raw: f64,
        diameter_unit: LengthUnit,
    ) -> Self {
        Self {
            height_raw,
            height_unit,
            diameter_raw,
            diameter_unit,
        }
    }

    /// Parse dimensions from text fields.
    ///
    /// Both fields must be present and numeric.
    ///
    /// # Examples
    ///
    /// ```
    /// use smarttank_types::{LengthUnit, TankDimensions};
    ///
    /// let dims = TankDimensions::parse("150", LengthUnit::Cm, "60", LengthUnit::Cm).unwrap();
    /// assert_eq!(dims.height_raw, 150.0);
    /// assert!(TankDimensions::parse("", LengthUnit::Cm, "60", LengthUnit::Cm).is_err());
    /// ```
    pub fn parse(
        height: &str,
        height_unit: LengthUnit,
        diameter: &str,
        diameter_unit: LengthUnit,
    ) -> ValidationResult<Self> {
        let height_raw = parse_number("height", height)?;
        let diameter_raw = parse_number("diameter", diameter)?;
        Ok(Self::new(height_raw, height_unit, diameter_raw, diameter_unit))
    }

    /// Convert to centimeters and apply the safety deduction to the height.
    ///
    /// Rejects any result where the usable height or the diameter is not
    /// strictly positive, either as a number or as the one-decimal text sent
    /// to the device. A tank shorter than the mounting clearance never
    /// reaches the device, and neither does a size that renders as `0.0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use smarttank_types::{LengthUnit, TankDimensions};
    ///
    /// let dims = TankDimensions::new(100.0, LengthUnit::Cm, 80.0, LengthUnit::Cm);
    /// let normalized = dims.normalize().unwrap();
    /// assert_eq!(normalized.height_cm, 70.0);
    ///
    /// let short = TankDimensions::new(20.0, LengthUnit::Cm, 80.0, LengthUnit::Cm);
    /// assert!(short.normalize().is_err());
    /// ```
    pub fn normalize(&self) -> ValidationResult<NormalizedDimensions> {
        if !self.height_raw.is_finite() || !self.diameter_raw.is_finite() {
            return Err(ValidationError::InvalidDimensions(
                "dimensions must be finite numbers".to_string(),
            ));
        }

        let height_cm =
            self.height_unit.to_cm(self.height_raw) - self.height_unit.safety_deduction_cm();
        let diameter_cm = self.diameter_unit.to_cm(self.diameter_raw);

        if height_cm <= 0.0 || renders_non_positive(height_cm) {
            return Err(ValidationError::InvalidDimensions(format!(
                "height {} {} is not above the {} sensor clearance",
                self.height_raw,
                self.height_unit,
                self.height_unit.deduction_label()
            )));
        }
        if diameter_cm <= 0.0 || renders_non_positive(diameter_cm) {
            return Err(ValidationError::InvalidDimensions(format!(
                "diameter must be positive, got {} {}",
                self.diameter_raw, self.diameter_unit
            )));
        }

        Ok(NormalizedDimensions {
            height_cm,
            diameter_cm,
        })
    }
}

fn renders_non_positive(value: f64) -> bool {
    one_decimal(value)
        .parse::<f64>()
        .map_or(true, |rendered| rendered <= 0.0)
}

fn parse_number(field: &str, text: &str) -> ValidationResult<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidDimensions(format!(
            "{} is required",
            field
        )));
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ValidationError::InvalidDimensions(format!(
            "{} '{}' is not a number",
            field, trimmed
        ))),
    }
}

/// Tank dimensions in centimeters, with the safety deduction already applied.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NormalizedDimensions {
    /// Usable height in centimeters.
    pub height_cm: f64,
    /// Diameter in centimeters.
    pub diameter_cm: f64,
}

impl NormalizedDimensions {
    /// Height rendered with one decimal place, as transmitted to the device.
    #[must_use]
    pub fn height_text(&self) -> String {
        one_decimal(self.height_cm)
    }

    /// Diameter rendered with one decimal place, as transmitted to the device.
    #[must_use]
    pub fn diameter_text(&self) -> String {
        one_decimal(self.diameter_cm)
    }

    /// Capacity of a cylindrical tank of these dimensions, in liters.
    #[must_use]
    pub fn capacity_liters(&self) -> f64 {
        let radius = self.diameter_cm / 2.0;
        core::f64::consts::PI * radius * radius * self.height_cm / 1000.0
    }
}

/// Render a value with exactly one decimal place.
///
/// Rounds the exact binary value, so `1.45` (stored as `1.4499...`) becomes
/// `"1.4"`. Only exact ties, the quarter values, round away from zero:
/// `0.25` becomes `"0.3"` where `format!("{:.1}")` alone gives `"0.2"`.
#[must_use]
pub fn one_decimal(value: f64) -> String {
    let quarters = value * 4.0;
    if quarters.fract() == 0.0 && quarters % 2.0 != 0.0 {
        return format!("{:.1}", (value * 10.0).round() / 10.0);
    }
    format!("{:.1}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cm(h: f64, d: f64) -> TankDimensions {
        TankDimensions::new(h, LengthUnit::Cm, d, LengthUnit::Cm)
    }

    #[test]
    fn test_one_meter_tank() {
        let normalized = cm(100.0, 80.0).normalize().unwrap();
        assert_eq!(normalized.height_cm, 70.0);
        assert_eq!(normalized.height_text(), "70.0");
    }

    #[test]
    fn test_three_feet_rounds_up() {
        let dims = TankDimensions::new(3.0, LengthUnit::Ft, 2.0, LengthUnit::Ft);
        let normalized = dims.normalize().unwrap();
        assert!((normalized.height_cm - 60.96).abs() < 1e-9);
        assert_eq!(normalized.height_text(), "61.0");
        assert_eq!(normalized.diameter_text(), "61.0");
    }

    #[test]
    fn test_inches_deduct_one_foot() {
        let dims = TankDimensions::new(48.0, LengthUnit::Inches, 24.0, LengthUnit::Inches);
        let normalized = dims.normalize().unwrap();
        // 48in = 121.92cm, minus 30.48
        assert!((normalized.height_cm - 91.44).abs() < 1e-9);
        assert_eq!(normalized.height_text(), "91.4");
        assert_eq!(normalized.diameter_text(), "61.0");
    }

    #[test]
    fn test_diameter_uses_its_own_unit() {
        let dims = TankDimensions::new(150.0, LengthUnit::Cm, 2.0, LengthUnit::Ft);
        let normalized = dims.normalize().unwrap();
        assert_eq!(normalized.height_cm, 120.0);
        assert!((normalized.diameter_cm - 60.96).abs() < 1e-9);
    }

    #[test]
    fn test_height_below_deduction_rejected() {
        let err = cm(20.0, 60.0).normalize().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDimensions(_)));
        assert!(err.to_string().contains("30cm"));

        // Exactly the deduction leaves no usable height.
        assert!(cm(30.0, 60.0).normalize().is_err());

        let one_foot = TankDimensions::new(1.0, LengthUnit::Ft, 2.0, LengthUnit::Ft);
        assert!(one_foot.normalize().is_err());

        let ten_inches = TankDimensions::new(10.0, LengthUnit::Inches, 20.0, LengthUnit::Inches);
        assert!(ten_inches.normalize().is_err());
    }

    #[test]
    fn test_non_positive_diameter_rejected() {
        assert!(cm(100.0, 0.0).normalize().is_err());
        assert!(cm(100.0, -5.0).normalize().is_err());
    }

    #[test]
    fn test_parse_rejects_missing_and_non_numeric() {
        assert!(TankDimensions::parse("", LengthUnit::Cm, "60", LengthUnit::Cm).is_err());
        assert!(TankDimensions::parse("150", LengthUnit::Cm, "  ", LengthUnit::Cm).is_err());
        assert!(TankDimensions::parse("abc", LengthUnit::Cm, "60", LengthUnit::Cm).is_err());
        assert!(TankDimensions::parse("NaN", LengthUnit::Cm, "60", LengthUnit::Cm).is_err());
        assert!(TankDimensions::parse("inf", LengthUnit::Cm, "60", LengthUnit::Cm).is_err());

        let dims = TankDimensions::parse(" 150 ", LengthUnit::Cm, "60.5", LengthUnit::Ft).unwrap();
        assert_eq!(dims.height_raw, 150.0);
        assert_eq!(dims.diameter_raw, 60.5);
        assert_eq!(dims.diameter_unit, LengthUnit::Ft);
    }

    #[test]
    fn test_one_decimal_rounding() {
        assert_eq!(one_decimal(60.96), "61.0");
        assert_eq!(one_decimal(120.0), "120.0");
        assert_eq!(one_decimal(0.25), "0.3");
        assert_eq!(one_decimal(0.75), "0.8");
        assert_eq!(one_decimal(-2.25), "-2.3");
        assert_eq!(one_decimal(91.44), "91.4");
    }

    #[test]
    fn test_one_decimal_uses_the_stored_value() {
        // These decimals are stored just below the halfway point.
        assert_eq!(one_decimal(1.45), "1.4");
        assert_eq!(one_decimal(130.45), "130.4");
        assert_eq!(one_decimal(100.05), "100.0");
        assert_eq!(one_decimal(1.15), "1.1");
        // And this one just above it.
        assert_eq!(one_decimal(1.05), "1.1");
    }

    #[test]
    fn test_height_text_near_half() {
        let normalized = cm(160.45, 60.0).normalize().unwrap();
        assert_eq!(normalized.height_text(), "130.4");
    }

    #[test]
    fn test_sizes_rendering_as_zero_rejected() {
        let err = cm(30.01, 60.0).normalize().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDimensions(_)));
        assert!(cm(30.04, 60.0).normalize().is_err());
        assert_eq!(cm(30.05, 60.0).normalize().unwrap().height_text(), "0.1");

        assert!(cm(100.0, 0.04).normalize().is_err());
        assert!(cm(100.0, 0.049).normalize().is_err());
        assert_eq!(cm(100.0, 0.05).normalize().unwrap().diameter_text(), "0.1");
    }

    #[test]
    fn test_unit_from_str() {
        assert_eq!("cm".parse::<LengthUnit>().unwrap(), LengthUnit::Cm);
        assert_eq!("FT".parse::<LengthUnit>().unwrap(), LengthUnit::Ft);
        assert_eq!("in".parse::<LengthUnit>().unwrap(), LengthUnit::Inches);
        assert_eq!("inches".parse::<LengthUnit>().unwrap(), LengthUnit::Inches);
        assert!("yards".parse::<LengthUnit>().is_err());
    }

    #[test]
    fn test_unit_display_round_trips() {
        for unit in LengthUnit::ALL {
            assert_eq!(unit.to_string().parse::<LengthUnit>().unwrap(), unit);
        }
    }

    #[test]
    fn test_capacity_liters() {
        // 100cm tall usable, 80cm diameter: pi * 40^2 * 100 / 1000
        let normalized = NormalizedDimensions {
            height_cm: 100.0,
            diameter_cm: 80.0,
        };
        assert!((normalized.capacity_liters() - 502.654_824_574).abs() < 1e-6);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_unit_serializes_lowercase() {
        let json = serde_json::to_string(&LengthUnit::Inches).unwrap();
        assert_eq!(json, "\"inches\"");
    }

    fn any_unit() -> impl Strategy<Value = LengthUnit> {
        prop_oneof![
            Just(LengthUnit::Cm),
            Just(LengthUnit::Ft),
            Just(LengthUnit::Inches)
        ]
    }

    proptest! {
        #[test]
        fn prop_cm_conversion_round_trips(value in 0.001f64..100_000.0, unit in any_unit()) {
            let back = unit.from_cm(unit.to_cm(value));
            prop_assert!((back - value).abs() <= value * 1e-12);
        }

        #[test]
        fn prop_normalized_height_is_positive_or_rejected(
            height in -1_000.0f64..1_000.0,
            diameter in 0.1f64..1_000.0,
            unit in any_unit(),
        ) {
            let dims = TankDimensions::new(height, unit, diameter, unit);
            match dims.normalize() {
                Ok(n) => {
                    prop_assert!(n.height_cm > 0.0);
                    prop_assert!(n.height_text().parse::<f64>().unwrap() > 0.0);
                    prop_assert!(n.diameter_text().parse::<f64>().unwrap() > 0.0);
                }
                Err(e) => prop_assert!(matches!(e, ValidationError::InvalidDimensions(_))),
            }
        }
    }
}
