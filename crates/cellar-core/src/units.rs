//! Volume and mass units with fixed conversion factors.
//!
//! Conversions never round; display precision belongs to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Liters in one US gallon.
pub const LITERS_PER_GALLON: f64 = 3.78541;
/// Pounds in one kilogram.
pub const POUNDS_PER_KILOGRAM: f64 = 2.20462;

/// Physical quantity measured by a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Volume,
    Mass,
}

/// Units accepted on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// Liters
    #[serde(rename = "L")]
    Liter,
    /// US gallons
    #[serde(rename = "gal")]
    Gallon,
    /// Kilograms
    #[serde(rename = "kg")]
    Kilogram,
    /// Pounds
    #[serde(rename = "lb")]
    Pound,
}

impl Unit {
    pub fn dimension(self) -> Dimension {
        match self {
            Unit::Liter | Unit::Gallon => Dimension::Volume,
            Unit::Kilogram | Unit::Pound => Dimension::Mass,
        }
    }

    /// Wire symbol, e.g. "gal".
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Liter => "L",
            Unit::Gallon => "gal",
            Unit::Kilogram => "kg",
            Unit::Pound => "lb",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "L" | "l" => Ok(Unit::Liter),
            "gal" => Ok(Unit::Gallon),
            "kg" => Ok(Unit::Kilogram),
            "lb" => Ok(Unit::Pound),
            other => Err(UnitError::Unknown(other.to_string())),
        }
    }
}

/// Errors produced by unit conversion.
#[derive(Debug, Error, PartialEq)]
pub enum UnitError {
    /// Input value was NaN or infinite.
    #[error("non-finite value cannot be converted")]
    NonFinite,
    /// Volume cannot be converted into mass or vice versa.
    #[error("cannot convert {from} to {to}")]
    IncompatibleUnits { from: Unit, to: Unit },
    /// Unit symbol not recognised.
    #[error("unknown unit: {0}")]
    Unknown(String),
}

/// Convert `value` from one unit to another of the same dimension.
///
/// Example:
/// let l = convert(1.0, Unit::Gallon, Unit::Liter).unwrap();
/// assert_eq!(l, 3.78541);
pub fn convert(value: f64, from: Unit, to: Unit) -> Result<f64, UnitError> {
    if !value.is_finite() {
        return Err(UnitError::NonFinite);
    }
    if from.dimension() != to.dimension() {
        return Err(UnitError::IncompatibleUnits { from, to });
    }
    let out = match (from, to) {
        (Unit::Gallon, Unit::Liter) => value * LITERS_PER_GALLON,
        (Unit::Liter, Unit::Gallon) => value / LITERS_PER_GALLON,
        (Unit::Kilogram, Unit::Pound) => value * POUNDS_PER_KILOGRAM,
        (Unit::Pound, Unit::Kilogram) => value / POUNDS_PER_KILOGRAM,
        // same unit
        _ => value,
    };
    // 1e308 gal is finite but its liter equivalent is not
    if !out.is_finite() {
        return Err(UnitError::NonFinite);
    }
    Ok(out)
}

/// Express a volume in liters.
pub fn to_liters(value: f64, unit: Unit) -> Result<f64, UnitError> {
    convert(value, unit, Unit::Liter)
}

/// Express a volume in US gallons.
pub fn to_gallons(value: f64, unit: Unit) -> Result<f64, UnitError> {
    convert(value, unit, Unit::Gallon)
}

/// Express a mass in kilograms.
pub fn to_kilograms(value: f64, unit: Unit) -> Result<f64, UnitError> {
    convert(value, unit, Unit::Kilogram)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn gallon_to_liter_uses_fixed_factor() {
        assert_eq!(convert(1.0, Unit::Gallon, Unit::Liter).unwrap(), 3.78541);
        assert_eq!(convert(10.0, Unit::Kilogram, Unit::Pound).unwrap(), 22.0462);
    }

    #[test]
    fn same_unit_is_identity() {
        assert_eq!(convert(12.5, Unit::Liter, Unit::Liter).unwrap(), 12.5);
        assert_eq!(to_kilograms(3.0, Unit::Kilogram).unwrap(), 3.0);
    }

    #[test]
    fn rejects_non_finite_and_cross_dimension() {
        assert_eq!(
            convert(f64::NAN, Unit::Liter, Unit::Gallon),
            Err(UnitError::NonFinite)
        );
        assert_eq!(
            convert(f64::INFINITY, Unit::Pound, Unit::Kilogram),
            Err(UnitError::NonFinite)
        );
        assert_eq!(
            convert(1.0, Unit::Liter, Unit::Kilogram),
            Err(UnitError::IncompatibleUnits {
                from: Unit::Liter,
                to: Unit::Kilogram
            })
        );
    }

    #[test]
    fn overflowing_result_is_non_finite() {
        assert_eq!(
            convert(1e308, Unit::Gallon, Unit::Liter),
            Err(UnitError::NonFinite)
        );
        assert_eq!(
            to_liters(f64::MAX, Unit::Gallon),
            Err(UnitError::NonFinite)
        );
        assert!(convert(1e308, Unit::Liter, Unit::Gallon).unwrap().is_finite());
    }

    #[test]
    fn wire_symbols() {
        assert_eq!(serde_json::to_string(&Unit::Gallon).unwrap(), "\"gal\"");
        let u: Unit = serde_json::from_str("\"L\"").unwrap();
        assert_eq!(u, Unit::Liter);
        assert_eq!("lb".parse::<Unit>().unwrap(), Unit::Pound);
        assert!("oz".parse::<Unit>().is_err());
        assert_eq!(Unit::Kilogram.to_string(), "kg");
    }

    proptest! {
        #[test]
        fn volume_round_trip(x in 0.0f64..1_000_000.0) {
            let gal = convert(x, Unit::Liter, Unit::Gallon).unwrap();
            let back = convert(gal, Unit::Gallon, Unit::Liter).unwrap();
            prop_assert!((back - x).abs() <= 1e-9 * x.max(1.0));
        }

        #[test]
        fn mass_round_trip(x in 0.0f64..1_000_000.0) {
            let lb = convert(x, Unit::Kilogram, Unit::Pound).unwrap();
            let back = convert(lb, Unit::Pound, Unit::Kilogram).unwrap();
            prop_assert!((back - x).abs() <= 1e-9 * x.max(1.0));
        }
    }
}
