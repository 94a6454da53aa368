//! Grid interconnection: import whatever local units can't supply.
use crate::action::GridSetPoint;
use crate::unit::GridSpec;
use crate::units::{Power, ReactivePower, UnitType};
use log::debug;

/// Import the electrical deficit from the grid, up to `capacity`. Export isn't modelled.
///
/// # Arguments
///
/// * `grid` - The grid interconnection
/// * `capacity` - Maximum import
/// * `total_load` - Total electrical load
/// * `local_net_generation` - Local generation minus boiler draw
pub fn dispatch_grid(
    grid: &GridSpec,
    capacity: Power,
    total_load: Power,
    local_net_generation: Power,
) -> GridSetPoint {
    let deficit = total_load - local_net_generation;
    let p = deficit.clip(Power(0.0), capacity);
    if deficit > capacity {
        debug!("Grid import capped at {capacity} MW (deficit {deficit} MW)");
    }

    GridSetPoint {
        p,
        q: ReactivePower::at_power_factor(p, grid.power_factor),
    }
}
