//! Compile-time unit safety for electrical quantities.
//!
//! Prevents mixing incompatible units like watts and vars, or volts and
//! per-unit voltages. All types use `#[repr(transparent)]` so they have the
//! same memory layout as `f64` and the wrappers cost nothing at runtime.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Macro to implement common arithmetic operations for unit types
macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Mul<$type> for f64 {
            type Output = $type;
            fn mul(self, rhs: $type) -> Self::Output {
                <$type>::new(self * rhs.0)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl Div<$type> for $type {
            type Output = f64;
            fn div(self, rhs: $type) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            /// Create a new value
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Get the raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            /// Absolute value
            #[inline]
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }
        }
    };
}

/// Voltage in volts (line-to-line for three-phase equipment)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Volts(pub f64);
impl_unit_ops!(Volts, "V");

/// Active power in watts
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Watts(pub f64);
impl_unit_ops!(Watts, "W");

/// Reactive power in volt-amperes reactive
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Vars(pub f64);
impl_unit_ops!(Vars, "var");

/// Current in amperes
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Amperes(pub f64);
impl_unit_ops!(Amperes, "A");

/// Dimensionless per-unit quantity (voltage magnitude, loading fraction)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct PerUnit(pub f64);
impl_unit_ops!(PerUnit, "pu");

/// Angle in radians
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Radians(pub f64);
impl_unit_ops!(Radians, "rad");

/// Energy in kilowatt-hours
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct KilowattHours(pub f64);
impl_unit_ops!(KilowattHours, "kWh");

impl Radians {
    /// Convert to degrees
    pub fn to_degrees(self) -> f64 {
        self.0.to_degrees()
    }
}

impl Volts {
    /// Express in kilovolts
    pub fn kilovolts(self) -> f64 {
        self.0 / 1e3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let p = Watts(1.5e6) + Watts(0.5e6);
        assert_eq!(p.value(), 2.0e6);
        assert_eq!((p / 2.0).value(), 1.0e6);
        assert_eq!(p / Watts(1.0e6), 2.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", PerUnit(1.0)), "1.0000 pu");
        assert_eq!(format!("{}", Amperes(-12.5)), "-12.5000 A");
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Volts(10_500.0).kilovolts(), 10.5);
        assert!((Radians(std::f64::consts::PI).to_degrees() - 180.0).abs() < 1e-12);
    }
}
