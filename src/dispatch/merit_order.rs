//! Merit-order dispatch of the dispatchable generators.
//!
//! Generators are loaded in ascending order of carbon intensity until the residual electrical
//! demand is met. Generators left over once demand is met idle at their minimum output.
use super::{ResidualDemand, ramp_limit};
use crate::unit::{UnitID, UnitRegistry};
use crate::units::{Power, UnitType};
use indexmap::IndexMap;
use log::debug;

/// Dispatch the generators in merit order.
///
/// # Arguments
///
/// * `units` - The unit registry
/// * `residual` - Demand remaining after renewables
/// * `previous` - Generator set points from the previous step, used for ramp limits
///
/// # Returns
///
/// The updated residual demand and a set point for every generator, in registry order.
pub fn dispatch_generators(
    units: &UnitRegistry,
    residual: ResidualDemand,
    previous: Option<&IndexMap<UnitID, Power>>,
) -> (ResidualDemand, IndexMap<UnitID, Power>) {
    let mut residual = residual;
    let mut set_points = IndexMap::new();
    for unit in units.generators_in_merit_order() {
        let previous = previous.and_then(|previous| previous.get(&unit.id)).copied();
        let p = if residual.electrical > Power(0.0) {
            let target = unit.p.max.min(residual.electrical);

            // The ramp window may lie outside the box, so clip to the box afterwards
            unit.p.clip(ramp_limit(target, previous, unit.ramp_rate))
        } else {
            unit.p.clip(ramp_limit(unit.p.min, previous, unit.ramp_rate))
        };
        debug!("Merit order: {} set to {p} MW", unit.id);

        residual = residual.after_supply(p, Power(0.0));
        set_points.insert(unit.id.clone(), p);
    }

    // Report in registry order
    let set_points = units
        .generators
        .keys()
        .map(|id| (id.clone(), set_points[id]))
        .collect();

    (residual, set_points)
}
