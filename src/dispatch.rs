//! The prior dispatch policy.
//!
//! Converts an observation into set points for every unit using a fixed sequence of heuristic
//! stages. The electrical and thermal demand still to be met is threaded through the stages as a
//! [`ResidualDemand`]: each stage takes the residuals so far and returns the updated residuals
//! along with its set points.
//!
//! ```text
//! renewables -> merit order (DG) -> CHP -> electric boiler -> grid -> balance check
//! ```
//!
//! TCL heating and demand response don't depend on the residuals and are computed separately.
use crate::action::Action;
use crate::model::Model;
use crate::observation::{Observation, ObservationRaw};
use crate::units::{Power, UnitType};
use anyhow::Result;
use log::{debug, error};

pub mod balance;
pub mod boiler;
pub mod chp;
pub mod demand_response;
pub mod grid;
pub mod merit_order;
pub mod renewable;
pub mod tcl;

pub use balance::BalanceReport;

/// Demand not yet met by the stages run so far
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualDemand {
    /// Electrical demand still to be met
    pub electrical: Power,
    /// Thermal demand still to be met
    pub thermal: Power,
}

impl ResidualDemand {
    /// Residuals after a unit supplies `p` of electricity and `h` of heat
    pub fn after_supply(self, p: Power, h: Power) -> Self {
        Self {
            electrical: self.electrical - p,
            thermal: self.thermal - h,
        }
    }

    /// Residuals after a unit draws `p` of electricity to supply `h` of heat
    pub fn after_conversion(self, p: Power, h: Power) -> Self {
        Self {
            electrical: self.electrical + p,
            thermal: self.thermal - h,
        }
    }
}

/// The result of running the prior policy
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The pipeline ran normally
    Dispatched {
        /// Set points for every unit
        action: Action,
        /// Advisory check of the resulting balance
        balance: BalanceReport,
    },
    /// The pipeline failed and the safe minimal action was used instead
    Fallback {
        /// The safe minimal action
        action: Action,
        /// Why the pipeline failed
        reason: String,
    },
}

impl DispatchOutcome {
    /// The action to apply
    pub fn action(&self) -> &Action {
        match self {
            Self::Dispatched { action, .. } | Self::Fallback { action, .. } => action,
        }
    }

    /// Take ownership of the action to apply
    pub fn into_action(self) -> Action {
        match self {
            Self::Dispatched { action, .. } | Self::Fallback { action, .. } => action,
        }
    }

    /// Whether the safe minimal action was used
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Move `target` no further than `ramp_rate` from the previous set point, if there is one
pub fn ramp_limit(target: Power, previous: Option<Power>, ramp_rate: Power) -> Power {
    match previous {
        Some(previous) => target.clip(previous - ramp_rate, previous + ramp_rate),
        None => target,
    }
}

/// Run the prior policy on a raw observation.
///
/// This never fails: if the observation is malformed or any stage errors, the safe minimal
/// action is returned instead, along with the reason.
pub fn dispatch(model: &Model, raw: &ObservationRaw) -> DispatchOutcome {
    let result = Observation::from_raw(raw, &model.units)
        .and_then(|observation| dispatch_observation(model, &observation));

    match result {
        Ok((action, balance)) => DispatchOutcome::Dispatched { action, balance },
        Err(err) => {
            error!("Error in prior policy, falling back to safe action: {err:?}");
            DispatchOutcome::Fallback {
                action: Action::fallback(model),
                reason: format!("{err:#}"),
            }
        }
    }
}

/// Run the prior policy on a validated observation.
///
/// # Returns
///
/// The action and the advisory balance report, or an error if the pipeline produced a
/// non-finite set point.
pub fn dispatch_observation(
    model: &Model,
    observation: &Observation,
) -> Result<(Action, BalanceReport)> {
    let units = &model.units;
    let previous = observation.previous_action.as_ref();
    let total_p_load = observation.total_p_load();
    let total_h_load = observation.total_h_load();

    let renewable =
        renewable::dispatch_renewables(&units.renewables, &observation.renewable_forecast);
    let renewable_total: Power = renewable.values().copied().sum();
    let residual = ResidualDemand {
        electrical: (total_p_load - renewable_total).max(Power(0.0)),
        thermal: total_h_load,
    };
    debug!("Residual demand after renewables: {residual:?}");

    let (residual, dg) =
        merit_order::dispatch_generators(units, residual, previous.map(|action| &action.dg));
    debug!("Residual demand after merit order: {residual:?}");

    let (residual, chp) =
        chp::dispatch_chps(&units.chps, residual, previous.map(|action| &action.chp));
    debug!("Residual demand after CHP: {residual:?}");

    let (residual, eb) = boiler::dispatch_boilers(&units.boilers, residual);
    debug!("Residual demand after electric boilers: {residual:?}");

    let tcl = tcl::dispatch_tcls(
        &units.tcls,
        &observation.indoor_temperatures,
        observation.outdoor_temperature,
    );
    let dr = demand_response::dispatch_demand_response(
        &model.parameters.demand_response,
        &observation.p_load,
        observation.electricity_price,
    );

    let mut action = Action {
        renewable,
        dg,
        chp,
        eb,
        tcl,
        dr,
        ..Action::default()
    };
    action.grid = grid::dispatch_grid(
        &units.grid,
        units.grid_import_capacity(),
        total_p_load,
        action.local_net_generation(),
    );
    action.check_finite()?;

    let balance = balance::check_balance(model, &action, total_p_load, total_h_load);

    Ok((action, balance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ChpSetPoint;
    use crate::fixture::{model, observation_raw};
    use crate::unit::Bounds;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[test]
    fn test_ramp_limit() {
        let ramp = Power(0.5);
        assert_eq!(ramp_limit(Power(3.0), None, ramp), Power(3.0));
        assert_eq!(ramp_limit(Power(3.0), Some(Power(1.0)), ramp), Power(1.5));
        assert_eq!(ramp_limit(Power(0.0), Some(Power(1.0)), ramp), Power(0.5));
        assert_eq!(ramp_limit(Power(1.2), Some(Power(1.0)), ramp), Power(1.2));
    }

    #[test]
    fn test_residual_demand() {
        let residual = ResidualDemand {
            electrical: Power(2.0),
            thermal: Power(1.0),
        };
        assert_eq!(
            residual.after_supply(Power(1.5), Power(0.5)),
            ResidualDemand {
                electrical: Power(0.5),
                thermal: Power(0.5)
            }
        );
        assert_eq!(
            residual.after_conversion(Power(1.0), Power(0.5)),
            ResidualDemand {
                electrical: Power(3.0),
                thermal: Power(0.5)
            }
        );
    }

    /// Total load 6 MW, thermal load 3 MW, no renewables, price 120 $/MWh
    #[rstest]
    fn test_dispatch_high_price_scenario(model: Model, observation_raw: ObservationRaw) {
        let outcome = dispatch(&model, &observation_raw);
        assert!(!outcome.is_fallback());
        let action = outcome.action();

        // Demand response only sheds load
        assert!(
            action
                .dr
                .values()
                .all(|dr| dr.p_up == Power(0.0) && dr.p_down > Power(0.0))
        );

        // The cleaner generator is filled first
        assert_approx_eq!(f64, action.dg["DG_2"].value(), 4.0);
        assert_approx_eq!(f64, action.dg["DG_1"].value(), 2.0);

        // CHP is heat-led and sits mid-way across its coupled range
        let chp = action.chp["CHP_1"];
        assert_approx_eq!(f64, chp.h.value(), 3.0);
        assert_approx_eq!(f64, chp.p.value(), 3.3);

        // Heat demand is covered so the boiler is off
        assert_eq!(action.eb["EB_1"], Power(0.0));

        // Local generation exceeds demand so nothing is imported
        assert_eq!(action.grid.p, Power(0.0));
    }

    #[rstest]
    fn test_dispatch_grid_covers_ramp_limited_deficit(
        model: Model,
        mut observation_raw: ObservationRaw,
    ) {
        let mut previous = Action::fallback(&model);
        previous.chp["CHP_1"] = ChpSetPoint {
            p: Power(3.0),
            h: Power(3.0),
        };
        observation_raw.previous_action = Some(previous);

        let outcome = dispatch(&model, &observation_raw);
        let action = outcome.action();

        // Generators can only ramp up from zero
        assert_approx_eq!(f64, action.dg["DG_2"].value(), 0.35);
        assert_approx_eq!(f64, action.dg["DG_1"].value(), 0.4);
        assert_approx_eq!(f64, action.chp["CHP_1"].p.value(), 3.3);

        // Grid makes up the rest: 6 - (0.35 + 0.4 + 3.3)
        assert_approx_eq!(f64, action.grid.p.value(), 1.95, epsilon = 1e-9);
        let DispatchOutcome::Dispatched { balance, .. } = outcome else {
            panic!("Expected normal dispatch");
        };
        assert!(balance.electrical_ok);
    }

    #[rstest]
    fn test_dispatch_grid_import_capped(model: Model, mut observation_raw: ObservationRaw) {
        observation_raw.p_load = Some(vec![2.0; 6]);
        observation_raw.previous_action = Some(Action::fallback(&model));

        let action = dispatch(&model, &observation_raw).into_action();
        assert_approx_eq!(
            f64,
            action.grid.p.value(),
            model.units.grid_import_capacity().value()
        );
    }

    #[rstest]
    fn test_dispatch_respects_box_limits(model: Model, mut observation_raw: ObservationRaw) {
        observation_raw.p_ren_forecast = Some(vec![10.0, -1.0, 1.0, 5.0]);
        observation_raw.h_load = Some(vec![1.0; 3]);
        observation_raw.t_indoor = Some(vec![10.0, 30.0, 21.0, 22.0, 23.0, 15.0, 25.0]);

        let action = dispatch(&model, &observation_raw).into_action();
        let units = &model.units;
        for (id, p) in &action.renewable {
            assert!(Bounds::new(Power(0.0), units.renewables[id].p_max).contains(*p));
        }
        for (id, p) in &action.dg {
            assert!(units.generators[id].p.contains(*p));
        }
        for (id, set_point) in &action.chp {
            let unit = &units.chps[id];
            assert!(unit.p.contains(set_point.p));
            assert!(unit.h.contains(set_point.h));
            assert!(unit.in_coupled_region(set_point.p, set_point.h));
        }
        for (id, p) in &action.eb {
            assert!(units.boilers[id].p.contains(*p));
        }
        for (id, h) in &action.tcl {
            assert!(units.tcls[id].h.contains(*h));
        }
    }

    #[rstest]
    fn test_dispatch_missing_key_falls_back(model: Model, mut observation_raw: ObservationRaw) {
        observation_raw.p_ren_forecast = None;
        let outcome = dispatch(&model, &observation_raw);
        assert_eq!(
            outcome,
            DispatchOutcome::Fallback {
                action: Action::fallback(&model),
                reason: "Observation is missing `p_ren_forecast`".into()
            }
        );
    }

    #[rstest]
    fn test_dispatch_invalid_previous_action_falls_back(
        model: Model,
        mut observation_raw: ObservationRaw,
    ) {
        let mut previous = Action::fallback(&model);
        previous.dg["DG_1"] = Power(f64::NAN);
        observation_raw.previous_action = Some(previous);

        let outcome = dispatch(&model, &observation_raw);
        assert_eq!(
            outcome,
            DispatchOutcome::Fallback {
                action: Action::fallback(&model),
                reason: "Invalid `previous_action`: Set point for DG_1 is not finite".into()
            }
        );
    }

    /// Heat load beyond what the CHP can supply is met by the electric boiler
    #[rstest]
    fn test_dispatch_boiler_covers_excess_heat(
        model: Model,
        mut observation_raw: ObservationRaw,
    ) {
        observation_raw.h_load = Some(vec![2.0; 3]);
        let chp = &model.units.chps["CHP_1"];
        let boiler = &model.units.boilers["EB_1"];

        let DispatchOutcome::Dispatched { action, balance } = dispatch(&model, &observation_raw)
        else {
            panic!("Expected normal dispatch");
        };

        let chp_heat = chp.max_feasible_heat();
        assert_approx_eq!(f64, action.chp["CHP_1"].h.value(), chp_heat.value());
        assert_approx_eq!(
            f64,
            action.eb["EB_1"].value(),
            (6.0 - chp_heat.value()) / boiler.efficiency.value(),
            epsilon = 1e-9
        );
        assert!(boiler.p.contains(action.eb["EB_1"]));
        assert!(balance.thermal_ok);
        assert_approx_eq!(f64, balance.thermal_error.value(), 0.0, epsilon = 1e-9);
    }

    #[rstest]
    fn test_dispatch_empty_observation_falls_back(model: Model) {
        let outcome = dispatch(&model, &ObservationRaw::default());
        assert!(outcome.is_fallback());
        assert_eq!(outcome.into_action(), Action::fallback(&model));
    }

    #[rstest]
    fn test_dispatch_is_fully_populated(model: Model, observation_raw: ObservationRaw) {
        let action = dispatch(&model, &observation_raw).into_action();
        assert!(model.units.renewables.keys().all(|id| action.renewable.contains_key(id)));
        assert!(model.units.generators.keys().all(|id| action.dg.contains_key(id)));
        assert!(model.units.chps.keys().all(|id| action.chp.contains_key(id)));
        assert!(model.units.boilers.keys().all(|id| action.eb.contains_key(id)));
        assert!(model.units.tcls.keys().all(|id| action.tcl.contains_key(id)));
        assert_eq!(action.dr.len(), observation_raw.p_load.unwrap().len());
    }
}
