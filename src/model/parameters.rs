//! Defines the scalar parameters of a model: policy settings, reward thresholds and physical
//! limits.
use crate::unit::Bounds;
use crate::units::{
    CarbonMass, CurrentSquared, Dimensionless, Energy, Money, MoneyPerEnergy, Power, Temperature,
    UnitType,
};
use anyhow::{Context, Result, ensure};
use serde::Deserialize;

/// Floor applied to denominators when computing relative imbalances
pub const RELATIVE_ERROR_FLOOR: f64 = 1e-6;

macro_rules! define_unit_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            <$type>::new($value)
        }
    };
}

macro_rules! define_bounds_param_default {
    ($name:ident, $type: ty, $min: expr, $max: expr) => {
        fn $name() -> Bounds<$type> {
            Bounds::new(<$type>::new($min), <$type>::new($max))
        }
    };
}

define_unit_param_default!(default_adjustable_ratio, Dimensionless, 0.20);
define_unit_param_default!(default_shift_ratio, Dimensionless, 0.05);
define_unit_param_default!(default_high_price, MoneyPerEnergy, 100.0);
define_unit_param_default!(default_low_price, MoneyPerEnergy, 50.0);
define_unit_param_default!(default_current_squared_max, CurrentSquared, 400.0);
define_unit_param_default!(default_power_balance_tolerance, Dimensionless, 0.01);
define_unit_param_default!(default_thermal_balance_tolerance, Dimensionless, 0.02);
define_unit_param_default!(default_fallback_grid_import, Power, 5.0);
define_bounds_param_default!(default_voltage, Dimensionless, 0.95, 1.05);
define_bounds_param_default!(default_supply_temperature, Temperature, 60.0, 90.0);
define_bounds_param_default!(default_return_temperature, Temperature, 40.0, 60.0);
define_bounds_param_default!(default_indoor_temperature, Temperature, 20.0, 24.0);

/// Price-driven load shifting policy
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DemandResponseParameters {
    /// Proportion of a node's load which may be shifted in either direction
    #[serde(default = "default_adjustable_ratio")]
    pub adjustable_ratio: Dimensionless,
    /// Proportion of a node's load actually shifted when the price signal triggers
    #[serde(default = "default_shift_ratio")]
    pub shift_ratio: Dimensionless,
    /// Load is shed above this price
    #[serde(default = "default_high_price")]
    pub high_price: MoneyPerEnergy,
    /// Load is increased below this price
    #[serde(default = "default_low_price")]
    pub low_price: MoneyPerEnergy,
}

impl Default for DemandResponseParameters {
    fn default() -> Self {
        Self {
            adjustable_ratio: default_adjustable_ratio(),
            shift_ratio: default_shift_ratio(),
            high_price: default_high_price(),
            low_price: default_low_price(),
        }
    }
}

/// Scenario-calibrated limits on the objectives.
///
/// Each limit is the calibrated value multiplied by its safety margin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Thresholds {
    /// Calibrated total operating cost
    pub cost: Money,
    /// Safety margin applied to `cost`
    pub cost_margin: Dimensionless,
    /// Calibrated total carbon emission
    pub carbon: CarbonMass,
    /// Safety margin applied to `carbon`
    pub carbon_margin: Dimensionless,
    /// Calibrated renewable curtailment
    pub curtailment: Energy,
    /// Safety margin applied to `curtailment`
    pub curtailment_margin: Dimensionless,
}

impl Thresholds {
    /// Maximum permitted operating cost
    pub fn cost_limit(&self) -> Money {
        self.cost * self.cost_margin
    }

    /// Maximum permitted carbon emission
    pub fn carbon_limit(&self) -> CarbonMass {
        self.carbon * self.carbon_margin
    }

    /// Maximum permitted renewable curtailment
    pub fn curtailment_limit(&self) -> Energy {
        self.curtailment * self.curtailment_margin
    }
}

/// Fixed physical operating limits
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PhysicalLimits {
    /// Node voltage band (p.u.)
    #[serde(default = "default_voltage")]
    pub voltage: Bounds<Dimensionless>,
    /// Maximum squared line current
    #[serde(default = "default_current_squared_max")]
    pub current_squared_max: CurrentSquared,
    /// Supply network temperature band
    #[serde(default = "default_supply_temperature")]
    pub supply_temperature: Bounds<Temperature>,
    /// Return network temperature band
    #[serde(default = "default_return_temperature")]
    pub return_temperature: Bounds<Temperature>,
    /// Indoor temperature band for every TCL
    #[serde(default = "default_indoor_temperature")]
    pub indoor_temperature: Bounds<Temperature>,
    /// Tolerance on relative active and reactive power imbalance
    #[serde(default = "default_power_balance_tolerance")]
    pub power_balance_tolerance: Dimensionless,
    /// Tolerance on relative thermal imbalance
    #[serde(default = "default_thermal_balance_tolerance")]
    pub thermal_balance_tolerance: Dimensionless,
}

impl Default for PhysicalLimits {
    fn default() -> Self {
        Self {
            voltage: default_voltage(),
            current_squared_max: default_current_squared_max(),
            supply_temperature: default_supply_temperature(),
            return_temperature: default_return_temperature(),
            indoor_temperature: default_indoor_temperature(),
            power_balance_tolerance: default_power_balance_tolerance(),
            thermal_balance_tolerance: default_thermal_balance_tolerance(),
        }
    }
}

impl PhysicalLimits {
    /// The voltage band expressed in squared p.u., as reported by the power-flow model
    pub fn voltage_squared(&self) -> Bounds<Dimensionless> {
        Bounds::new(self.voltage.min.powi(2), self.voltage.max.powi(2))
    }

    /// Permitted range of squared line current
    pub fn current_squared(&self) -> Bounds<CurrentSquared> {
        Bounds::new(CurrentSquared(0.0), self.current_squared_max)
    }
}

/// The action used when the dispatcher can't produce one
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FallbackParameters {
    /// Fixed grid import
    #[serde(default = "default_fallback_grid_import")]
    pub grid_import: Power,
}

impl Default for FallbackParameters {
    fn default() -> Self {
        Self {
            grid_import: default_fallback_grid_import(),
        }
    }
}

/// Every scalar parameter of a model
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelParameters {
    /// Demand response policy
    #[serde(default)]
    pub demand_response: DemandResponseParameters,
    /// Objective thresholds
    pub thresholds: Thresholds,
    /// Physical limits
    #[serde(default)]
    pub limits: PhysicalLimits,
    /// Fallback action settings
    #[serde(default)]
    pub fallback: FallbackParameters,
}

/// Check that a proportion is finite and non-negative
fn check_non_negative<T: UnitType + std::fmt::Display>(name: &str, value: T) -> Result<()> {
    ensure!(
        value.is_finite() && value.value() >= 0.0,
        "{name} must be a finite non-negative number (got {value})"
    );

    Ok(())
}

/// Check that the demand response parameters are valid
fn check_demand_response(params: &DemandResponseParameters) -> Result<()> {
    check_non_negative("adjustable_ratio", params.adjustable_ratio)?;
    check_non_negative("shift_ratio", params.shift_ratio)?;
    ensure!(
        params.low_price.is_finite() && params.high_price.is_finite(),
        "Demand response prices must be finite"
    );
    ensure!(
        params.low_price <= params.high_price,
        "low_price ({}) must not exceed high_price ({})",
        params.low_price,
        params.high_price
    );

    Ok(())
}

/// Check that the thresholds are valid
fn check_thresholds(thresholds: &Thresholds) -> Result<()> {
    check_non_negative("cost", thresholds.cost)?;
    check_non_negative("carbon", thresholds.carbon)?;
    check_non_negative("curtailment", thresholds.curtailment)?;
    for (name, margin) in [
        ("cost_margin", thresholds.cost_margin),
        ("carbon_margin", thresholds.carbon_margin),
        ("curtailment_margin", thresholds.curtailment_margin),
    ] {
        ensure!(
            margin.is_finite() && margin.value() >= 1.0,
            "{name} must be a finite number no less than one (got {margin})"
        );
    }

    Ok(())
}

/// Check that the physical limits are valid
fn check_limits(limits: &PhysicalLimits) -> Result<()> {
    limits.voltage.validate().context("Invalid voltage band")?;
    ensure!(
        limits.voltage.min.value() >= 0.0,
        "Voltage band must be non-negative"
    );
    check_non_negative("current_squared_max", limits.current_squared_max)?;
    limits
        .supply_temperature
        .validate()
        .context("Invalid supply temperature band")?;
    limits
        .return_temperature
        .validate()
        .context("Invalid return temperature band")?;
    limits
        .indoor_temperature
        .validate()
        .context("Invalid indoor temperature band")?;
    check_non_negative("power_balance_tolerance", limits.power_balance_tolerance)?;
    check_non_negative(
        "thermal_balance_tolerance",
        limits.thermal_balance_tolerance,
    )?;

    Ok(())
}

impl ModelParameters {
    /// Validate parameters after reading in file
    pub(crate) fn validate(&self) -> Result<()> {
        check_demand_response(&self.demand_response)?;
        check_thresholds(&self.thresholds)?;
        check_limits(&self.limits)?;
        check_non_negative("fallback grid_import", self.fallback.grid_import)?;

        Ok(())
    }
}
