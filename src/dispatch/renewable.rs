//! Renewable dispatch: take the forecast, capped at nameplate capacity.
use crate::unit::{RenewableSpec, UnitID};
use crate::units::{Power, UnitType};
use indexmap::IndexMap;

/// Set each renewable unit to its forecast output, clamped to `[0, P_max]`.
///
/// Renewables are must-take, so no ramp limit applies. `forecast` is indexed in registry order.
pub fn dispatch_renewables(
    units: &IndexMap<UnitID, RenewableSpec>,
    forecast: &[Power],
) -> IndexMap<UnitID, Power> {
    units
        .values()
        .zip(forecast)
        .map(|(unit, forecast)| (unit.id.clone(), forecast.clip(Power(0.0), unit.p_max)))
        .collect()
}
