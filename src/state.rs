//! The physical state reported by the simulator after an action has been applied.
//!
//! States arrive as a [`SystemStateRaw`] in which every key is optional. Missing keys are filled
//! in with defaults when the state is resolved into a [`SystemState`]. The defaults for cost and
//! carbon are infinite, so a state that doesn't report them can never be rewarded.
use crate::action::{Action, ChpSetPoint, DemandResponseSetPoint};
use crate::unit::{UnitID, UnitRegistry};
use crate::units::{
    CarbonMass, CurrentSquared, Dimensionless, Energy, Money, Power, ReactivePower, Temperature,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Supply network temperature assumed when none is reported (°C)
const DEFAULT_SUPPLY_TEMPERATURE: f64 = 75.0;

/// Return network temperature assumed when none is reported (°C)
const DEFAULT_RETURN_TEMPERATURE: f64 = 50.0;

/// Indoor temperature assumed for every TCL when none is reported (°C)
const DEFAULT_INDOOR_TEMPERATURE: f64 = 22.0;

/// Realised outputs of the units, grouped by agent category
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UnitOutputs {
    /// CHP outputs
    #[serde(rename = "CHP", default)]
    pub chp: IndexMap<UnitID, ChpSetPoint>,
    /// Dispatchable generator outputs
    #[serde(rename = "DG", default)]
    pub dg: IndexMap<UnitID, Power>,
    /// Electric boiler inputs
    #[serde(rename = "EB", default)]
    pub eb: IndexMap<UnitID, Power>,
    /// Demand response, keyed by node
    #[serde(rename = "DR", default)]
    pub dr: IndexMap<UnitID, DemandResponseSetPoint>,
}

impl UnitOutputs {
    /// Take an action's set points as the realised outputs
    pub fn from_action(action: &Action) -> Self {
        Self {
            chp: action.chp.clone(),
            dg: action.dg.clone(),
            eb: action.eb.clone(),
            dr: action.dr.clone(),
        }
    }
}

/// A system state as received from the simulator
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemStateRaw {
    /// Total operating cost ($)
    pub total_cost: Option<f64>,
    /// Total carbon emission (t)
    pub carbon_emission: Option<f64>,
    /// Curtailed renewable energy (MWh)
    pub renewable_curtailment: Option<f64>,
    /// Total active power generation (MW)
    pub p_gen_total: Option<f64>,
    /// Total active power load (MW)
    pub p_load_total: Option<f64>,
    /// Total reactive power generation (MVAr)
    pub q_gen_total: Option<f64>,
    /// Total reactive power load (MVAr)
    pub q_load_total: Option<f64>,
    /// Total heat generation (MW)
    pub h_gen_total: Option<f64>,
    /// Total heat load (MW)
    pub h_load_total: Option<f64>,
    /// Squared node voltages (p.u.²)
    pub voltage_squared: Option<Vec<f64>>,
    /// Squared line currents
    pub current_squared: Option<Vec<f64>>,
    /// Supply network temperatures (°C)
    pub temperature_supply: Option<Vec<f64>>,
    /// Return network temperatures (°C)
    pub temperature_return: Option<Vec<f64>>,
    /// Indoor temperature of each TCL (°C)
    pub temperature_indoor: Option<Vec<f64>>,
    /// Active power imbalance at each node (MW)
    pub p_imbalance: Option<Vec<f64>>,
    /// Reactive power imbalance at each node (MVAr)
    pub q_imbalance: Option<Vec<f64>>,
    /// Thermal imbalance at each node (MW)
    pub h_imbalance: Option<Vec<f64>>,
    /// Names of constraints the simulator flagged as violated
    pub constraints_violated: Option<Vec<String>>,
    /// Number of units the simulator found to break their ramp limits
    pub ramping_violations: Option<u32>,
    /// Realised outputs of the units
    pub unit_outputs: Option<UnitOutputs>,
}

/// A system state with defaults filled in
#[derive(Debug, Clone, PartialEq)]
pub struct SystemState {
    /// Total operating cost
    pub total_cost: Money,
    /// Total carbon emission
    pub carbon_emission: CarbonMass,
    /// Curtailed renewable energy
    pub renewable_curtailment: Energy,
    /// Total active power generation
    pub p_gen_total: Power,
    /// Total active power load
    pub p_load_total: Power,
    /// Total reactive power generation
    pub q_gen_total: ReactivePower,
    /// Total reactive power load
    pub q_load_total: ReactivePower,
    /// Total heat generation
    pub h_gen_total: Power,
    /// Total heat load
    pub h_load_total: Power,
    /// Squared node voltages
    pub voltage_squared: Vec<Dimensionless>,
    /// Squared line currents
    pub current_squared: Vec<CurrentSquared>,
    /// Supply network temperatures
    pub supply_temperatures: Vec<Temperature>,
    /// Return network temperatures
    pub return_temperatures: Vec<Temperature>,
    /// Indoor temperature of each TCL
    pub indoor_temperatures: Vec<Temperature>,
    /// Active power imbalance at each node
    pub p_imbalance: Vec<Power>,
    /// Reactive power imbalance at each node
    pub q_imbalance: Vec<ReactivePower>,
    /// Thermal imbalance at each node
    pub h_imbalance: Vec<Power>,
    /// Names of constraints the simulator flagged as violated
    pub constraints_violated: Vec<String>,
    /// Number of units the simulator found to break their ramp limits
    pub ramping_violations: u32,
    /// Realised outputs of the units
    pub unit_outputs: UnitOutputs,
}

fn wrap<T>(values: Option<&Vec<f64>>, default: Vec<f64>, f: fn(f64) -> T) -> Vec<T> {
    values.cloned().unwrap_or(default).into_iter().map(f).collect()
}

impl SystemState {
    /// Fill in the missing keys of a raw state.
    ///
    /// If the state doesn't report any unit outputs, the set points of `action` are taken as the
    /// realised outputs.
    pub fn from_raw(raw: &SystemStateRaw, units: &UnitRegistry, action: &Action) -> Self {
        Self {
            total_cost: Money(raw.total_cost.unwrap_or(f64::INFINITY)),
            carbon_emission: CarbonMass(raw.carbon_emission.unwrap_or(f64::INFINITY)),
            renewable_curtailment: Energy(raw.renewable_curtailment.unwrap_or(0.0)),
            p_gen_total: Power(raw.p_gen_total.unwrap_or(0.0)),
            p_load_total: Power(raw.p_load_total.unwrap_or(1.0)),
            q_gen_total: ReactivePower(raw.q_gen_total.unwrap_or(0.0)),
            q_load_total: ReactivePower(raw.q_load_total.unwrap_or(1.0)),
            h_gen_total: Power(raw.h_gen_total.unwrap_or(0.0)),
            h_load_total: Power(raw.h_load_total.unwrap_or(1.0)),
            voltage_squared: wrap(raw.voltage_squared.as_ref(), vec![1.0], Dimensionless),
            current_squared: wrap(raw.current_squared.as_ref(), vec![0.0], CurrentSquared),
            supply_temperatures: wrap(
                raw.temperature_supply.as_ref(),
                vec![DEFAULT_SUPPLY_TEMPERATURE],
                Temperature,
            ),
            return_temperatures: wrap(
                raw.temperature_return.as_ref(),
                vec![DEFAULT_RETURN_TEMPERATURE],
                Temperature,
            ),
            indoor_temperatures: wrap(
                raw.temperature_indoor.as_ref(),
                vec![DEFAULT_INDOOR_TEMPERATURE; units.tcls.len()],
                Temperature,
            ),
            p_imbalance: wrap(raw.p_imbalance.as_ref(), Vec::new(), Power),
            q_imbalance: wrap(raw.q_imbalance.as_ref(), Vec::new(), ReactivePower),
            h_imbalance: wrap(raw.h_imbalance.as_ref(), Vec::new(), Power),
            constraints_violated: raw.constraints_violated.clone().unwrap_or_default(),
            ramping_violations: raw.ramping_violations.unwrap_or(0),
            unit_outputs: raw
                .unit_outputs
                .clone()
                .unwrap_or_else(|| UnitOutputs::from_action(action)),
        }
    }
}
