//! Advisory check of the electrical and thermal balance of a dispatched action.
//!
//! The pipeline is a heuristic, not an exact solver, so imbalances are reported but never
//! corrected.
use crate::action::Action;
use crate::model::Model;
use crate::model::parameters::RELATIVE_ERROR_FLOOR;
use crate::units::{Dimensionless, Power, relative_error};
use log::warn;
use serde::Serialize;

/// Relative imbalances of an action against the loads it was computed for
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BalanceReport {
    /// Relative electrical imbalance
    pub electrical_error: Dimensionless,
    /// Relative thermal imbalance
    pub thermal_error: Dimensionless,
    /// Whether the electrical imbalance is within tolerance
    pub electrical_ok: bool,
    /// Whether the thermal imbalance is within tolerance
    pub thermal_ok: bool,
}

/// Heat delivered by the electric boilers
fn boiler_heat(model: &Model, action: &Action) -> Power {
    action
        .eb
        .iter()
        .filter_map(|(id, p)| {
            model
                .units
                .boilers
                .get(id)
                .map(|unit| *p * unit.efficiency)
        })
        .sum()
}

/// Compare supply against load in both domains, warning if either is out of tolerance
pub fn check_balance(
    model: &Model,
    action: &Action,
    total_p_load: Power,
    total_h_load: Power,
) -> BalanceReport {
    let limits = &model.parameters.limits;

    let electrical_supply = action.local_net_generation() + action.grid.p;
    let electrical_error = relative_error(electrical_supply, total_p_load, RELATIVE_ERROR_FLOOR);
    let electrical_ok = electrical_error <= limits.power_balance_tolerance;
    if !electrical_ok {
        warn!(
            "Electrical imbalance: supply {electrical_supply} MW vs load {total_p_load} MW \
            (relative error {electrical_error})"
        );
    }

    let thermal_supply = action.chp_heat_total() + boiler_heat(model, action);
    let thermal_error = relative_error(thermal_supply, total_h_load, RELATIVE_ERROR_FLOOR);
    let thermal_ok = thermal_error <= limits.thermal_balance_tolerance;
    if !thermal_ok {
        warn!(
            "Thermal imbalance: supply {thermal_supply} MW vs load {total_h_load} MW \
            (relative error {thermal_error})"
        );
    }

    BalanceReport {
        electrical_error,
        thermal_error,
        electrical_ok,
        thermal_ok,
    }
}
