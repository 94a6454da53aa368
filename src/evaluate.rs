//! The constraint evaluator.
//!
//! Scores a realised [`SystemState`] and the [`Action`] that produced it. Every predicate is
//! checked independently and the reward is 1.0 only if all of them hold. There is no partial
//! credit.
use crate::action::Action;
use crate::model::Model;
use crate::model::parameters::RELATIVE_ERROR_FLOOR;
use crate::state::{SystemState, SystemStateRaw};
use crate::unit::Bounds;
use crate::units::{
    CarbonMass, Dimensionless, Energy, Money, Power, ReactivePower, UnitType, relative_error,
};
use anyhow::Result;
use itertools::Itertools;
use log::{debug, error, info, warn};
use serde::Serialize;

pub mod envelope;

/// Reward given when every predicate holds
pub const REWARD_SATISFIED: f64 = 1.0;

/// Reward given when any predicate fails, or evaluation itself fails
pub const REWARD_VIOLATED: f64 = 0.0;

/// A single condition that must hold for the state to be rewarded
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Predicate {
    /// Operating cost within its threshold
    Cost,
    /// Carbon emission within its threshold
    Carbon,
    /// Renewable curtailment within its threshold
    Curtailment,
    /// Relative active power imbalance within tolerance
    ActivePowerBalance,
    /// Relative reactive power imbalance within tolerance
    ReactivePowerBalance,
    /// Relative thermal imbalance within tolerance
    ThermalBalance,
    /// Every node voltage within its band
    Voltage,
    /// Every line current within its limit
    Current,
    /// Every supply network temperature within its band
    SupplyTemperature,
    /// Every return network temperature within its band
    ReturnTemperature,
    /// Every indoor temperature within the comfort band
    IndoorTemperature,
    /// Every unit within its operating envelope
    UnitEnvelope,
    /// No unit broke its ramp limit
    Ramping,
    /// No node shifts load both ways at once
    DemandResponse,
}

/// Metrics computed during evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Total operating cost
    pub cost: Money,
    /// Total carbon emission
    pub carbon: CarbonMass,
    /// Curtailed renewable energy
    pub curtailment: Energy,
    /// Relative active power imbalance
    pub power_imbalance: Dimensionless,
    /// Relative reactive power imbalance
    pub reactive_imbalance: Dimensionless,
    /// Relative thermal imbalance
    pub thermal_imbalance: Dimensionless,
    /// Largest active power imbalance at any node
    pub nodal_power_imbalance: Power,
    /// Largest reactive power imbalance at any node
    pub nodal_reactive_imbalance: ReactivePower,
    /// Largest thermal imbalance at any node
    pub nodal_thermal_imbalance: Power,
    /// Number of nodes outside the voltage band
    pub voltage_violations: usize,
    /// Number of lines over the current limit
    pub current_violations: usize,
    /// Number of supply network nodes outside their temperature band
    pub supply_temperature_violations: usize,
    /// Number of return network nodes outside their temperature band
    pub return_temperature_violations: usize,
    /// Number of TCLs outside the comfort band
    pub indoor_temperature_violations: usize,
    /// Total of the three temperature violation counts
    pub temperature_violations: usize,
    /// Number of unit envelope violations
    pub unit_violations: usize,
    /// Number of ramp limit violations reported by the simulator
    pub ramping_violations: u32,
    /// Number of nodes shifting load both ways at once
    pub dr_violations: usize,
    /// Constraints the simulator itself flagged as violated. Informational only.
    pub flagged_constraints: Vec<String>,
    /// Predicates which failed
    pub violated: Vec<Predicate>,
    /// Whether every predicate held
    pub all_satisfied: bool,
}

impl Diagnostics {
    /// The reward corresponding to these diagnostics
    pub fn reward(&self) -> f64 {
        if self.all_satisfied {
            REWARD_SATISFIED
        } else {
            REWARD_VIOLATED
        }
    }
}

/// The result of evaluating a state
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationOutcome {
    /// Every predicate was evaluated
    Scored {
        /// Either 1.0 or 0.0
        reward: f64,
        /// The metrics behind the reward
        diagnostics: Diagnostics,
    },
    /// Evaluation failed, so no reward is given
    Failed {
        /// Why evaluation failed
        error: String,
    },
}

impl EvaluationOutcome {
    /// The reward, which is 0.0 if evaluation failed
    pub fn reward(&self) -> f64 {
        match self {
            Self::Scored { reward, .. } => *reward,
            Self::Failed { .. } => REWARD_VIOLATED,
        }
    }

    /// The diagnostics, if evaluation succeeded
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Self::Scored { diagnostics, .. } => Some(diagnostics),
            Self::Failed { .. } => None,
        }
    }
}

/// Count the values lying outside `bounds`. Non-finite values always count.
fn count_outside<T: UnitType>(values: &[T], bounds: Bounds<T>) -> usize {
    values.iter().filter(|value| !bounds.contains(**value)).count()
}

/// Largest magnitude among the values, or zero if there are none
fn largest_magnitude<T: UnitType>(values: &[T]) -> T {
    values
        .iter()
        .map(|value| value.abs())
        .max_by(|a, b| a.value().total_cmp(&b.value()))
        .unwrap_or(T::new(0.0))
}

/// Smallest and largest of the values, for reporting
fn observed_range<T: UnitType>(values: &[T]) -> (f64, f64) {
    values
        .iter()
        .map(UnitType::value)
        .minmax()
        .into_option()
        .unwrap_or((f64::NAN, f64::NAN))
}

/// Evaluate a raw state against the action that produced it.
///
/// This never fails: an internal error yields [`EvaluationOutcome::Failed`] with a reward of 0.0.
pub fn evaluate(model: &Model, raw: &SystemStateRaw, action: &Action) -> EvaluationOutcome {
    let state = SystemState::from_raw(raw, &model.units, action);
    match evaluate_state(model, &state) {
        Ok(diagnostics) => EvaluationOutcome::Scored {
            reward: diagnostics.reward(),
            diagnostics,
        },
        Err(err) => {
            error!("Error in reward computation: {err:?}");
            EvaluationOutcome::Failed {
                error: format!("{err:#}"),
            }
        }
    }
}

/// Check every predicate against a resolved state.
///
/// # Returns
///
/// The diagnostics, or an error if the unit outputs refer to unknown units.
pub fn evaluate_state(model: &Model, state: &SystemState) -> Result<Diagnostics> {
    let thresholds = &model.parameters.thresholds;
    let limits = &model.parameters.limits;

    let cost_limit = thresholds.cost_limit();
    let cost_ok = state.total_cost <= cost_limit;
    if !cost_ok {
        warn!(
            "Cost violation: {:.2} $ (total: {:.2} $, threshold: {:.2} $)",
            state.total_cost.value() - cost_limit.value(),
            state.total_cost.value(),
            cost_limit.value()
        );
    }

    let carbon_limit = thresholds.carbon_limit();
    let carbon_ok = state.carbon_emission <= carbon_limit;
    if !carbon_ok {
        warn!(
            "Carbon violation: {:.2} t (total: {:.2} t, threshold: {:.2} t)",
            state.carbon_emission.value() - carbon_limit.value(),
            state.carbon_emission.value(),
            carbon_limit.value()
        );
    }

    let curtailment_limit = thresholds.curtailment_limit();
    let curtailment_ok = state.renewable_curtailment <= curtailment_limit;
    if !curtailment_ok {
        warn!(
            "Renewable curtailment violation: {:.2} MWh",
            state.renewable_curtailment.value() - curtailment_limit.value()
        );
    }

    let power_imbalance =
        relative_error(state.p_gen_total, state.p_load_total, RELATIVE_ERROR_FLOOR);
    let power_ok = power_imbalance < limits.power_balance_tolerance;
    if !power_ok {
        warn!(
            "Power imbalance: {:.4}% (tolerance: {}%)",
            power_imbalance.value() * 100.0,
            limits.power_balance_tolerance.value() * 100.0
        );
    }

    let reactive_imbalance =
        relative_error(state.q_gen_total, state.q_load_total, RELATIVE_ERROR_FLOOR);
    let reactive_ok = reactive_imbalance < limits.power_balance_tolerance;
    if !reactive_ok {
        warn!(
            "Reactive power imbalance: {:.4}% (tolerance: {}%)",
            reactive_imbalance.value() * 100.0,
            limits.power_balance_tolerance.value() * 100.0
        );
    }

    let thermal_imbalance =
        relative_error(state.h_gen_total, state.h_load_total, RELATIVE_ERROR_FLOOR);
    let thermal_ok = thermal_imbalance < limits.thermal_balance_tolerance;
    if !thermal_ok {
        warn!(
            "Thermal imbalance: {:.4}% (tolerance: {}%)",
            thermal_imbalance.value() * 100.0,
            limits.thermal_balance_tolerance.value() * 100.0
        );
    }

    let voltage_violations = count_outside(&state.voltage_squared, limits.voltage_squared());
    if voltage_violations > 0 {
        let (min, max) = observed_range(&state.voltage_squared);
        warn!(
            "Voltage violations: {voltage_violations} nodes (range: [{:.4}, {:.4}] p.u.)",
            min.sqrt(),
            max.sqrt()
        );
    }

    let current_violations = count_outside(&state.current_squared, limits.current_squared());
    if current_violations > 0 {
        let (_, max) = observed_range(&state.current_squared);
        warn!(
            "Current violations: {current_violations} lines (max: {:.2} A)",
            max.sqrt()
        );
    }

    let supply_temperature_violations =
        count_outside(&state.supply_temperatures, limits.supply_temperature);
    if supply_temperature_violations > 0 {
        let (min, max) = observed_range(&state.supply_temperatures);
        warn!(
            "Supply temp violations: {supply_temperature_violations} nodes \
            (range: [{min:.1}, {max:.1}]°C)"
        );
    }

    let return_temperature_violations =
        count_outside(&state.return_temperatures, limits.return_temperature);
    if return_temperature_violations > 0 {
        let (min, max) = observed_range(&state.return_temperatures);
        warn!(
            "Return temp violations: {return_temperature_violations} nodes \
            (range: [{min:.1}, {max:.1}]°C)"
        );
    }

    let indoor_temperature_violations =
        count_outside(&state.indoor_temperatures, limits.indoor_temperature);
    if indoor_temperature_violations > 0 {
        let (min, max) = observed_range(&state.indoor_temperatures);
        warn!(
            "Indoor temp violations: {indoor_temperature_violations} TCLs \
            (range: [{min:.1}, {max:.1}]°C)"
        );
    }

    let unit_violations = envelope::unit_violations(&model.units, &state.unit_outputs)?;

    let ramping_violations = state.ramping_violations;
    if ramping_violations > 0 {
        warn!("Ramping violations: {ramping_violations} units");
    }

    let dr_violations = envelope::dr_violations(&state.unit_outputs);

    if !state.constraints_violated.is_empty() {
        info!(
            "Simulator flagged constraints: {}",
            state.constraints_violated.join(", ")
        );
    }
    let nodal_power_imbalance = largest_magnitude(&state.p_imbalance);
    let nodal_reactive_imbalance = largest_magnitude(&state.q_imbalance);
    let nodal_thermal_imbalance = largest_magnitude(&state.h_imbalance);
    debug!(
        "Largest nodal imbalance: {nodal_power_imbalance} MW, {nodal_reactive_imbalance} MVAr, \
        {nodal_thermal_imbalance} MW (heat)"
    );

    let checks = [
        (Predicate::Cost, cost_ok),
        (Predicate::Carbon, carbon_ok),
        (Predicate::Curtailment, curtailment_ok),
        (Predicate::ActivePowerBalance, power_ok),
        (Predicate::ReactivePowerBalance, reactive_ok),
        (Predicate::ThermalBalance, thermal_ok),
        (Predicate::Voltage, voltage_violations == 0),
        (Predicate::Current, current_violations == 0),
        (Predicate::SupplyTemperature, supply_temperature_violations == 0),
        (Predicate::ReturnTemperature, return_temperature_violations == 0),
        (Predicate::IndoorTemperature, indoor_temperature_violations == 0),
        (Predicate::UnitEnvelope, unit_violations == 0),
        (Predicate::Ramping, ramping_violations == 0),
        (Predicate::DemandResponse, dr_violations == 0),
    ];
    let violated: Vec<_> = checks
        .iter()
        .filter(|(_, satisfied)| !satisfied)
        .map(|(predicate, _)| *predicate)
        .collect();
    let all_satisfied = violated.is_empty();

    if all_satisfied {
        info!("All objectives satisfied - Reward = {REWARD_SATISFIED}");
    } else {
        info!(
            "Some objectives not satisfied - Reward = {REWARD_VIOLATED} (violated: {})",
            violated.iter().join(", ")
        );
    }

    Ok(Diagnostics {
        cost: state.total_cost,
        carbon: state.carbon_emission,
        curtailment: state.renewable_curtailment,
        power_imbalance,
        reactive_imbalance,
        thermal_imbalance,
        nodal_power_imbalance,
        nodal_reactive_imbalance,
        nodal_thermal_imbalance,
        voltage_violations,
        current_violations,
        supply_temperature_violations,
        return_temperature_violations,
        indoor_temperature_violations,
        temperature_violations: supply_temperature_violations
            + return_temperature_violations
            + indoor_temperature_violations,
        unit_violations,
        ramping_violations,
        dr_violations,
        flagged_constraints: state.constraints_violated.clone(),
        violated,
        all_satisfied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{model, state_raw};
    use rstest::rstest;
    use strum::IntoEnumIterator;

    fn scored(model: &Model, raw: &SystemStateRaw) -> Diagnostics {
        let outcome = evaluate(model, raw, &Action::fallback(model));
        assert_eq!(outcome.reward(), outcome.diagnostics().unwrap().reward());
        outcome.diagnostics().unwrap().clone()
    }

    #[rstest]
    fn test_evaluate_all_satisfied(model: Model, state_raw: SystemStateRaw) {
        let outcome = evaluate(&model, &state_raw, &Action::fallback(&model));
        assert_eq!(outcome.reward(), REWARD_SATISFIED);
        let diagnostics = outcome.diagnostics().unwrap();
        assert!(diagnostics.all_satisfied);
        assert!(diagnostics.violated.is_empty());
        assert_eq!(diagnostics.temperature_violations, 0);
    }

    #[rstest]
    fn test_evaluate_missing_cost_fails(model: Model, mut state_raw: SystemStateRaw) {
        state_raw.total_cost = None;
        let diagnostics = scored(&model, &state_raw);
        assert_eq!(diagnostics.violated, [Predicate::Cost]);
        assert_eq!(diagnostics.reward(), REWARD_VIOLATED);
    }

    /// Push a single input just past its limit
    fn perturb(raw: &mut SystemStateRaw, predicate: Predicate) {
        const EPS: f64 = 1e-6;
        match predicate {
            Predicate::Cost => raw.total_cost = Some(13327.71 * 1.05 + EPS),
            Predicate::Carbon => raw.carbon_emission = Some(101.75 * 1.05 + EPS),
            Predicate::Curtailment => raw.renewable_curtailment = Some(1.5 * 1.2 + EPS),
            Predicate::ActivePowerBalance => raw.p_gen_total = Some(6.0 * 1.01 + EPS),
            Predicate::ReactivePowerBalance => raw.q_gen_total = Some(2.01 * 1.01 + EPS),
            Predicate::ThermalBalance => raw.h_gen_total = Some(3.03 * 1.02 + EPS),
            Predicate::Voltage => raw.voltage_squared = Some(vec![1.0, 1.05f64.powi(2) + EPS]),
            Predicate::Current => raw.current_squared = Some(vec![120.0, 400.0 + EPS]),
            Predicate::SupplyTemperature => raw.temperature_supply = Some(vec![60.0 - EPS]),
            Predicate::ReturnTemperature => raw.temperature_return = Some(vec![60.0 + EPS]),
            Predicate::IndoorTemperature => {
                raw.temperature_indoor = Some(vec![22.0, 22.0, 22.0, 24.0 + EPS, 22.0, 22.0, 22.0]);
            }
            Predicate::UnitEnvelope => {
                raw.unit_outputs.as_mut().unwrap().dg["DG_2"] = Power(4.0 + EPS);
            }
            Predicate::Ramping => raw.ramping_violations = Some(1),
            Predicate::DemandResponse => {
                raw.unit_outputs.as_mut().unwrap().dr["DR_node_0"].p_up = Power(EPS);
            }
        }
    }

    #[rstest]
    fn test_single_predicate_flips_reward(model: Model, state_raw: SystemStateRaw) {
        for predicate in Predicate::iter() {
            let mut raw = state_raw.clone();
            perturb(&mut raw, predicate);
            let diagnostics = scored(&model, &raw);
            assert_eq!(diagnostics.violated, [predicate], "perturbing {predicate}");
            assert_eq!(diagnostics.reward(), REWARD_VIOLATED);
        }
    }

    #[rstest]
    fn test_balance_tolerance_is_strict(model: Model, mut state_raw: SystemStateRaw) {
        // Exactly 1% out
        state_raw.p_gen_total = Some(101.0);
        state_raw.p_load_total = Some(100.0);
        let diagnostics = scored(&model, &state_raw);
        assert_eq!(diagnostics.violated, [Predicate::ActivePowerBalance]);
    }

    #[rstest]
    fn test_non_finite_readings_are_violations(model: Model, mut state_raw: SystemStateRaw) {
        state_raw.voltage_squared = Some(vec![1.0, f64::NAN]);
        state_raw.temperature_supply = Some(vec![f64::INFINITY]);
        let diagnostics = scored(&model, &state_raw);
        assert_eq!(
            diagnostics.violated,
            [Predicate::Voltage, Predicate::SupplyTemperature]
        );
        assert_eq!(diagnostics.voltage_violations, 1);
        assert_eq!(diagnostics.temperature_violations, 1);
    }

    #[rstest]
    fn test_flagged_constraints_are_informational(model: Model, mut state_raw: SystemStateRaw) {
        state_raw.constraints_violated = Some(vec!["line_12".into()]);
        let diagnostics = scored(&model, &state_raw);
        assert!(diagnostics.all_satisfied);
        assert_eq!(diagnostics.flagged_constraints, ["line_12"]);
    }

    #[rstest]
    fn test_nodal_imbalance_reported(model: Model, mut state_raw: SystemStateRaw) {
        let diagnostics = scored(&model, &state_raw);
        assert_eq!(diagnostics.nodal_power_imbalance, Power(0.0));

        state_raw.p_imbalance = Some(vec![0.01, -0.03, 0.02]);
        state_raw.q_imbalance = Some(vec![-0.2]);
        state_raw.h_imbalance = Some(vec![0.1, -0.05]);
        let diagnostics = scored(&model, &state_raw);
        assert_eq!(diagnostics.nodal_power_imbalance, Power(0.03));
        assert_eq!(diagnostics.nodal_reactive_imbalance, ReactivePower(0.2));
        assert_eq!(diagnostics.nodal_thermal_imbalance, Power(0.1));

        // Informational only
        assert!(diagnostics.all_satisfied);
    }

    #[rstest]
    fn test_unit_outputs_default_to_action(model: Model, mut state_raw: SystemStateRaw) {
        state_raw.unit_outputs = None;
        let mut action = Action::fallback(&model);
        action.dg["DG_1"] = Power(5.0);
        let outcome = evaluate(&model, &state_raw, &action);
        let diagnostics = outcome.diagnostics().unwrap();
        assert_eq!(diagnostics.unit_violations, 1);
        assert_eq!(diagnostics.violated, [Predicate::UnitEnvelope]);
    }

    #[rstest]
    fn test_unknown_unit_fails(model: Model, mut state_raw: SystemStateRaw) {
        let outputs = state_raw.unit_outputs.as_mut().unwrap();
        outputs.eb.insert("EB_7".into(), Power(1.0));
        let outcome = evaluate(&model, &state_raw, &Action::fallback(&model));
        assert_eq!(outcome.reward(), REWARD_VIOLATED);
        assert_eq!(
            outcome,
            EvaluationOutcome::Failed {
                error: "Invalid output for EB EB_7: Unknown ID EB_7 found".into()
            }
        );
    }

    #[rstest]
    fn test_evaluate_is_idempotent(model: Model, mut state_raw: SystemStateRaw) {
        state_raw.total_cost = Some(1e6);
        let action = Action::fallback(&model);
        let first = evaluate(&model, &state_raw, &action);
        let second = evaluate(&model, &state_raw, &action);
        assert_eq!(first, second);
    }

    #[test]
    fn test_predicate_names() {
        assert_eq!(Predicate::ActivePowerBalance.to_string(), "active_power_balance");
        assert_eq!(Predicate::iter().count(), 14);
    }
}
