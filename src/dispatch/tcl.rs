//! Thermal comfort control for TCLs.
use crate::unit::{TclSpec, UnitID};
use crate::units::{Power, Temperature};
use indexmap::IndexMap;

/// Heating needed to bring a TCL to the middle of its comfort band in one step.
///
/// Inverts `T_target = alpha·T + gamma·T_outdoor + beta·H` and clips the result to the unit's
/// heating limits.
pub fn required_heating(unit: &TclSpec, indoor: Temperature, outdoor: Temperature) -> Power {
    let drive = unit.target_temperature() - indoor * unit.alpha - outdoor * unit.gamma;
    unit.h.clip(drive / unit.beta)
}

/// Compute heating for every TCL. `indoor` is indexed in registry order.
pub fn dispatch_tcls(
    units: &IndexMap<UnitID, TclSpec>,
    indoor: &[Temperature],
    outdoor: Temperature,
) -> IndexMap<UnitID, Power> {
    units
        .values()
        .zip(indoor)
        .map(|(unit, indoor)| (unit.id.clone(), required_heating(unit, *indoor, outdoor)))
        .collect()
}
