//! Heat-led dispatch of the CHP units.
//!
//! Each CHP first takes as much of the residual thermal demand as it can. Its electrical output
//! is then placed in the middle of the range permitted by the coupled operating region at that
//! heat output, so that it keeps as much slack as possible from both boundaries.
use super::{ResidualDemand, ramp_limit};
use crate::action::ChpSetPoint;
use crate::unit::{Bounds, ChpSpec, UnitID};
use crate::units::{Dimensionless, Power, UnitType};
use indexmap::IndexMap;
use log::debug;

/// Choose a set point for a single CHP unit.
///
/// The heat output is capped at the highest level for which the coupled region is non-empty.
/// If the ramp limit would push the electrical output out of the feasible range, feasibility
/// wins.
pub fn chp_set_point(
    unit: &ChpSpec,
    residual_thermal: Power,
    previous_p: Option<Power>,
) -> ChpSetPoint {
    let h = unit
        .h
        .clip(unit.h.max.min(residual_thermal))
        .min(unit.max_feasible_heat());

    let region = unit.coupled_range(h);
    let midpoint = (region.min + region.max) * Dimensionless(0.5);
    let p = ramp_limit(unit.p.clip(midpoint), previous_p, unit.ramp_rate);

    let feasible = Bounds::new(region.min.max(unit.p.min), region.max.min(unit.p.max));
    ChpSetPoint {
        p: feasible.clip(p),
        h,
    }
}

/// Dispatch every CHP unit in registry order
pub fn dispatch_chps(
    units: &IndexMap<UnitID, ChpSpec>,
    residual: ResidualDemand,
    previous: Option<&IndexMap<UnitID, ChpSetPoint>>,
) -> (ResidualDemand, IndexMap<UnitID, ChpSetPoint>) {
    let mut residual = residual;
    let mut set_points = IndexMap::new();
    for unit in units.values() {
        let previous_p = previous
            .and_then(|previous| previous.get(&unit.id))
            .map(|set_point| set_point.p);
        let set_point = chp_set_point(unit, residual.thermal, previous_p);
        debug!(
            "CHP: {} set to P = {} MW, H = {} MW",
            unit.id, set_point.p, set_point.h
        );

        residual = residual.after_supply(set_point.p, set_point.h);
        set_points.insert(unit.id.clone(), set_point);
    }

    (residual, set_points)
}
