//! This module defines the physical quantities used by the dispatcher and evaluator.
//!
//! Electrical and thermal power are both expressed in MW and share the [`Power`] type.
use serde::{Deserialize, Serialize};

/// A quantity with an underlying `f64` value
pub trait UnitType: Copy + PartialOrd {
    /// Create a new instance from a raw value
    fn new(value: f64) -> Self;

    /// Get the raw value
    fn value(&self) -> f64;

    /// Whether the underlying value is finite
    fn is_finite(&self) -> bool {
        self.value().is_finite()
    }

    /// Clamp to the range `[lo, hi]`.
    ///
    /// Unlike [`f64::clamp`] this doesn't panic if `lo > hi`; `hi` wins, which matches how the
    /// set-point clipping steps are ordered.
    fn clip(self, lo: Self, hi: Self) -> Self {
        Self::new(self.value().max(lo.value()).min(hi.value()))
    }

    /// The larger of two values
    fn max(self, other: Self) -> Self {
        Self::new(self.value().max(other.value()))
    }

    /// The smaller of two values
    fn min(self, other: Self) -> Self {
        Self::new(self.value().min(other.value()))
    }

    /// Absolute value
    fn abs(self) -> Self {
        Self::new(self.value().abs())
    }
}

/// Represents a dimensionless quantity.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    PartialOrd,
    Default,
    Serialize,
    Deserialize,
    derive_more::Add,
    derive_more::Sub,
    derive_more::Display,
)]
pub struct Dimensionless(pub f64);

impl UnitType for Dimensionless {
    fn new(value: f64) -> Self {
        Self(value)
    }

    fn value(&self) -> f64 {
        self.0
    }
}

impl std::ops::Mul for Dimensionless {
    type Output = Dimensionless;

    fn mul(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 * rhs.0)
    }
}

impl std::ops::Div for Dimensionless {
    type Output = Dimensionless;

    fn div(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 / rhs.0)
    }
}

impl Dimensionless {
    /// Raise to an integer power
    pub fn powi(self, rhs: i32) -> Self {
        Dimensionless(self.0.powi(rhs))
    }
}

impl From<f64> for Dimensionless {
    fn from(val: f64) -> Self {
        Self(val)
    }
}

impl From<Dimensionless> for f64 {
    fn from(val: Dimensionless) -> Self {
        val.0
    }
}

macro_rules! unit_struct {
    ($name:ident) => {
        /// Represents a type of quantity.
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Default,
            Serialize,
            Deserialize,
            derive_more::Add,
            derive_more::Sub,
            derive_more::AddAssign,
            derive_more::SubAssign,
            derive_more::Sum,
            derive_more::Display,
        )]
        pub struct $name(pub f64);

        impl UnitType for $name {
            fn new(value: f64) -> Self {
                Self(value)
            }

            fn value(&self) -> f64 {
                self.0
            }
        }

        impl std::ops::Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Mul<$name> for Dimensionless {
            type Output = $name;
            fn mul(self, rhs: $name) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Div<Dimensionless> for $name {
            type Output = $name;
            fn div(self, rhs: Dimensionless) -> $name {
                $name(self.0 / rhs.0)
            }
        }

        impl std::ops::Div for $name {
            type Output = Dimensionless;
            fn div(self, rhs: $name) -> Dimensionless {
                Dimensionless(self.0 / rhs.0)
            }
        }
    };
}

macro_rules! impl_div {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Div<$Rhs> for $Lhs {
            type Output = $Out;
            fn div(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 / rhs.0)
            }
        }
    };
}

// Base quantities
unit_struct!(Power);
unit_struct!(ReactivePower);
unit_struct!(Energy);
unit_struct!(Temperature);
unit_struct!(Money);
unit_struct!(CarbonMass);
unit_struct!(CurrentSquared);

// Derived quantities
unit_struct!(MoneyPerEnergy);
unit_struct!(MoneyPerCarbon);
unit_struct!(CarbonIntensity);
unit_struct!(TemperaturePerPower);

// Division rules
impl_div!(Temperature, TemperaturePerPower, Power);

impl ReactivePower {
    /// Reactive power drawn alongside `active` at the given power factor
    pub fn at_power_factor(active: Power, power_factor: Dimensionless) -> Self {
        Self(active.0 * power_factor.0.acos().tan())
    }
}

/// Relative error of `actual` against `reference`.
///
/// The denominator is floored at `floor` so that near-zero references don't blow up.
pub fn relative_error<T: UnitType>(actual: T, reference: T, floor: f64) -> Dimensionless {
    Dimensionless((actual.value() - reference.value()).abs() / reference.value().max(floor))
}
