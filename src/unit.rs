//! Technical specifications for the units making up the energy system.
//!
//! All units are held in a single [`UnitRegistry`], which is shared by the dispatcher and the
//! evaluator so that the two can't disagree about unit limits.
use crate::id::{collect_by_id, define_id_getter, define_id_type};
use crate::units::{
    CarbonIntensity, Dimensionless, Power, Temperature, TemperaturePerPower, UnitType,
};
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::fmt::Display;

define_id_type! {UnitID}

/// The category of agent a unit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum UnitCategory {
    /// Wind turbines and PV arrays
    #[strum(serialize = "Renewable")]
    Renewable,
    /// Dispatchable (fuel-based) generators
    #[strum(serialize = "DG")]
    Generator,
    /// Combined heat and power units
    #[strum(serialize = "CHP")]
    Chp,
    /// Electric boilers
    #[strum(serialize = "EB")]
    Boiler,
    /// Thermostatically controlled loads
    #[strum(serialize = "TCL")]
    Tcl,
}

/// An inclusive range of permitted values
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Bounds<T> {
    /// Lower limit
    pub min: T,
    /// Upper limit
    pub max: T,
}

impl<T: UnitType> Bounds<T> {
    /// Create a new range
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    /// Clamp a value into this range
    pub fn clip(&self, value: T) -> T {
        value.clip(self.min, self.max)
    }

    /// Whether the value lies within the range. Non-finite values never do.
    pub fn contains(&self, value: T) -> bool {
        (self.min.value()..=self.max.value()).contains(&value.value())
    }

    /// Check that both limits are finite and `min <= max`
    pub(crate) fn validate(&self) -> Result<()>
    where
        T: Display,
    {
        ensure!(
            self.min.is_finite() && self.max.is_finite(),
            "Bounds must be finite (got [{}, {}])",
            self.min,
            self.max
        );
        ensure!(
            self.min <= self.max,
            "Lower bound ({}) exceeds upper bound ({})",
            self.min,
            self.max
        );

        Ok(())
    }
}

/// A wind turbine or PV array
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RenewableSpec {
    /// Unique identifier (e.g. "WT_1")
    pub id: UnitID,
    /// Nameplate capacity
    pub p_max: Power,
}
define_id_getter! {RenewableSpec, UnitID}

/// A dispatchable generator
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratorSpec {
    /// Unique identifier (e.g. "DG_1")
    pub id: UnitID,
    /// Active power limits
    pub p: Bounds<Power>,
    /// Reactive power limits
    pub q: Bounds<Power>,
    /// Maximum change in active power between consecutive steps
    pub ramp_rate: Power,
    /// Generator carbon intensity, used as the merit-order key
    pub carbon_intensity: CarbonIntensity,
}
define_id_getter! {GeneratorSpec, UnitID}

/// A combined heat and power unit.
///
/// For a heat output `H`, the feasible electrical output is `[c_m·H + c_k, P_max − c_v·H]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChpSpec {
    /// Unique identifier (e.g. "CHP_1")
    pub id: UnitID,
    /// Electrical output limits
    pub p: Bounds<Power>,
    /// Heat output limits
    pub h: Bounds<Power>,
    /// Maximum change in electrical output between consecutive steps
    pub ramp_rate: Power,
    /// Slope of the lower (back-pressure) boundary
    pub c_m: Dimensionless,
    /// Intercept of the lower boundary
    pub c_k: Power,
    /// Slope of the upper (extraction) boundary
    pub c_v: Dimensionless,
}
define_id_getter! {ChpSpec, UnitID}

impl ChpSpec {
    /// The feasible electrical output range for the given heat output
    pub fn coupled_range(&self, h: Power) -> Bounds<Power> {
        Bounds::new(self.c_m * h + self.c_k, self.p.max - self.c_v * h)
    }

    /// The largest heat output at which some electrical output satisfies both the box limits
    /// and the coupled region
    pub fn max_feasible_heat(&self) -> Power {
        let mut h_max = self
            .h
            .max
            .min((self.p.max - self.c_k) / (self.c_m + self.c_v));
        if self.c_v.value() > 0.0 {
            h_max = h_max.min((self.p.max - self.p.min) / self.c_v);
        }

        h_max
    }

    /// Whether `(p, h)` lies in the coupled feasible region
    pub fn in_coupled_region(&self, p: Power, h: Power) -> bool {
        self.coupled_range(h).contains(p)
    }

    fn validate(&self) -> Result<()> {
        self.p.validate().context("Invalid electrical limits")?;
        self.h.validate().context("Invalid heat limits")?;
        check_ramp_rate(self.ramp_rate)?;
        ensure!(
            self.c_m.value() >= 0.0
                && self.c_v.value() >= 0.0
                && self.c_m + self.c_v > Dimensionless(0.0),
            "Coupling slopes must be non-negative and not both zero"
        );
        ensure!(
            self.max_feasible_heat() >= self.h.min,
            "Coupled feasible region is empty at minimum heat output"
        );

        Ok(())
    }
}

/// An electric boiler
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoilerSpec {
    /// Unique identifier (e.g. "EB_1")
    pub id: UnitID,
    /// Electrical input limits
    pub p: Bounds<Power>,
    /// Maximum heat output
    pub h_max: Power,
    /// Conversion efficiency from electricity to heat
    pub efficiency: Dimensionless,
}
define_id_getter! {BoilerSpec, UnitID}

/// A thermostatically controlled load.
///
/// Indoor temperature evolves as `T' = alpha·T + gamma·T_outdoor + beta·H`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TclSpec {
    /// Unique identifier (e.g. "TCL_1")
    pub id: UnitID,
    /// Thermal inertia
    pub alpha: Dimensionless,
    /// Temperature response to heating
    pub beta: TemperaturePerPower,
    /// Coupling to the outdoor temperature
    pub gamma: Dimensionless,
    /// Heating limits
    pub h: Bounds<Power>,
    /// Comfort band for indoor temperature
    pub comfort: Bounds<Temperature>,
    /// Indoor temperature assumed when none is observed
    pub initial_temperature: Temperature,
}
define_id_getter! {TclSpec, UnitID}

impl TclSpec {
    /// The middle of the comfort band
    pub fn target_temperature(&self) -> Temperature {
        Temperature((self.comfort.min.value() + self.comfort.max.value()) / 2.0)
    }
}

/// Connection to the upstream grid
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GridSpec {
    /// Import capacity as a proportion of installed local electrical capacity
    pub import_ratio: Dimensionless,
    /// Fixed power factor of grid imports
    pub power_factor: Dimensionless,
}

/// Size of the electrical and thermal networks
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NetworkSpec {
    /// Number of electrical load nodes
    pub electrical_nodes: usize,
    /// Number of thermal load nodes
    pub thermal_nodes: usize,
}

/// Raw registry contents, as read from the model file
#[derive(Debug, Deserialize)]
pub(crate) struct UnitRegistryRaw {
    pub network: NetworkSpec,
    #[serde(default)]
    pub renewables: Vec<RenewableSpec>,
    #[serde(default)]
    pub generators: Vec<GeneratorSpec>,
    #[serde(default)]
    pub chps: Vec<ChpSpec>,
    #[serde(default)]
    pub boilers: Vec<BoilerSpec>,
    #[serde(default)]
    pub tcls: Vec<TclSpec>,
    pub grid: GridSpec,
}

/// Every unit in the system, in registration order
#[derive(Debug, Clone, PartialEq)]
pub struct UnitRegistry {
    /// Network dimensions
    pub network: NetworkSpec,
    /// Renewable units. Forecasts are indexed in this order.
    pub renewables: IndexMap<UnitID, RenewableSpec>,
    /// Dispatchable generators
    pub generators: IndexMap<UnitID, GeneratorSpec>,
    /// CHP units
    pub chps: IndexMap<UnitID, ChpSpec>,
    /// Electric boilers
    pub boilers: IndexMap<UnitID, BoilerSpec>,
    /// TCLs. Indoor temperatures are indexed in this order.
    pub tcls: IndexMap<UnitID, TclSpec>,
    /// Grid interconnection
    pub grid: GridSpec,
}

fn check_ramp_rate(ramp_rate: Power) -> Result<()> {
    ensure!(
        ramp_rate.is_finite() && ramp_rate >= Power(0.0),
        "Ramp rate must be a finite non-negative number (got {ramp_rate})"
    );

    Ok(())
}

/// Validate each unit in turn, naming the offending unit on failure
fn validate_each<T, F>(units: &IndexMap<UnitID, T>, validate: F) -> Result<()>
where
    F: Fn(&T) -> Result<()>,
{
    for (id, unit) in units {
        validate(unit).with_context(|| format!("Invalid parameters for unit {id}"))?;
    }

    Ok(())
}

impl UnitRegistry {
    /// Build a registry from its raw form, checking that it is internally consistent
    pub(crate) fn from_raw(raw: UnitRegistryRaw) -> Result<Self> {
        let registry = Self {
            network: raw.network,
            renewables: collect_by_id(raw.renewables)?,
            generators: collect_by_id(raw.generators)?,
            chps: collect_by_id(raw.chps)?,
            boilers: collect_by_id(raw.boilers)?,
            tcls: collect_by_id(raw.tcls)?,
            grid: raw.grid,
        };
        registry.validate()?;

        Ok(registry)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.network.electrical_nodes > 0,
            "There must be at least one electrical node"
        );
        ensure!(
            self.network.thermal_nodes > 0,
            "There must be at least one thermal node"
        );

        // IDs must be unique across categories too
        let mut seen = IndexSet::new();
        for id in self.all_ids() {
            ensure!(seen.insert(id), "Unit ID {id} is used more than once");
        }

        validate_each(&self.renewables, |unit| {
            ensure!(
                unit.p_max.is_finite() && unit.p_max >= Power(0.0),
                "Nameplate capacity must be a finite non-negative number"
            );
            Ok(())
        })?;
        validate_each(&self.generators, |unit| {
            unit.p.validate().context("Invalid active power limits")?;
            unit.q.validate().context("Invalid reactive power limits")?;
            check_ramp_rate(unit.ramp_rate)
        })?;
        validate_each(&self.chps, ChpSpec::validate)?;
        validate_each(&self.boilers, |unit| {
            unit.p.validate().context("Invalid electrical limits")?;
            ensure!(
                unit.efficiency.value() > 0.0 && unit.efficiency.value() <= 1.0,
                "Efficiency must be in the range (0, 1]"
            );
            ensure!(
                unit.h_max.is_finite() && unit.h_max >= Power(0.0),
                "Maximum heat output must be a finite non-negative number"
            );
            Ok(())
        })?;
        validate_each(&self.tcls, |unit| {
            unit.h.validate().context("Invalid heating limits")?;
            unit.comfort.validate().context("Invalid comfort band")?;
            ensure!(
                unit.beta.is_finite() && unit.beta.value() > 0.0,
                "beta must be a finite positive number"
            );
            Ok(())
        })?;

        let grid = &self.grid;
        ensure!(
            grid.import_ratio.is_finite() && grid.import_ratio >= Dimensionless(0.0),
            "Grid import ratio must be a finite non-negative number"
        );
        ensure!(
            grid.power_factor.value() > 0.0 && grid.power_factor.value() <= 1.0,
            "Grid power factor must be in the range (0, 1]"
        );

        Ok(())
    }

    /// Iterate over the IDs of every unit
    pub fn all_ids(&self) -> impl Iterator<Item = &UnitID> {
        self.renewables
            .keys()
            .chain(self.generators.keys())
            .chain(self.chps.keys())
            .chain(self.boilers.keys())
            .chain(self.tcls.keys())
    }

    /// The category of the unit with the given ID, if known
    pub fn category_of(&self, id: &str) -> Option<UnitCategory> {
        if self.renewables.contains_key(id) {
            Some(UnitCategory::Renewable)
        } else if self.generators.contains_key(id) {
            Some(UnitCategory::Generator)
        } else if self.chps.contains_key(id) {
            Some(UnitCategory::Chp)
        } else if self.boilers.contains_key(id) {
            Some(UnitCategory::Boiler)
        } else if self.tcls.contains_key(id) {
            Some(UnitCategory::Tcl)
        } else {
            None
        }
    }

    /// Total nameplate capacity of local electricity sources (renewables, DGs and CHPs)
    pub fn installed_electrical_capacity(&self) -> Power {
        self.renewables.values().map(|unit| unit.p_max).sum::<Power>()
            + self.generators.values().map(|unit| unit.p.max).sum::<Power>()
            + self.chps.values().map(|unit| unit.p.max).sum::<Power>()
    }

    /// Maximum power that can be imported from the grid
    pub fn grid_import_capacity(&self) -> Power {
        self.installed_electrical_capacity() * self.grid.import_ratio
    }

    /// Generators sorted by ascending carbon intensity.
    ///
    /// The sort is stable, so ties keep registration order.
    pub fn generators_in_merit_order(&self) -> Vec<&GeneratorSpec> {
        let mut generators: Vec<_> = self.generators.values().collect();
        generators.sort_by(|a, b| {
            a.carbon_intensity
                .value()
                .total_cmp(&b.carbon_intensity.value())
        });
        generators
    }
}
