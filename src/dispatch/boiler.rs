//! Electric boiler dispatch.
//!
//! Boilers cover whatever heat demand the CHPs left over. They draw electricity to do so, which
//! adds to the residual electrical demand.
use super::ResidualDemand;
use crate::unit::{BoilerSpec, UnitID};
use crate::units::{Power, UnitType};
use indexmap::IndexMap;
use log::debug;

/// The electrical input of a single boiler given the remaining heat demand.
///
/// The boiler is off unless there is unmet heat demand.
pub fn boiler_input(unit: &BoilerSpec, residual_thermal: Power) -> Power {
    if residual_thermal <= Power(0.0) {
        return Power(0.0);
    }

    let heat_target = unit.h_max.min(residual_thermal);
    unit.p.clip(heat_target / unit.efficiency)
}

/// Dispatch every boiler in registry order
pub fn dispatch_boilers(
    units: &IndexMap<UnitID, BoilerSpec>,
    residual: ResidualDemand,
) -> (ResidualDemand, IndexMap<UnitID, Power>) {
    let mut residual = residual;
    let mut set_points = IndexMap::new();
    for unit in units.values() {
        let p = boiler_input(unit, residual.thermal);
        let delivered = p * unit.efficiency;
        debug!("EB: {} draws {p} MW to deliver {delivered} MW of heat", unit.id);

        residual = residual.after_conversion(p, delivered);
        set_points.insert(unit.id.clone(), p);
    }

    (residual, set_points)
}
