//! Price-driven demand response.
//!
//! Each electrical node sheds load when electricity is expensive and takes on extra load when
//! it is cheap. Load is only ever shifted in one direction at a time.
use crate::action::{DemandResponseSetPoint, demand_response_id};
use crate::model::parameters::DemandResponseParameters;
use crate::unit::UnitID;
use crate::units::{MoneyPerEnergy, Power, UnitType};
use indexmap::IndexMap;

/// The load shift for a single node
pub fn node_set_point(
    parameters: &DemandResponseParameters,
    load: Power,
    price: MoneyPerEnergy,
) -> DemandResponseSetPoint {
    let load = load.max(Power(0.0));
    let budget = load * parameters.adjustable_ratio;
    let shift = (load * parameters.shift_ratio).min(budget);

    if price > parameters.high_price {
        DemandResponseSetPoint {
            p_up: Power(0.0),
            p_down: shift,
        }
    } else if price < parameters.low_price {
        DemandResponseSetPoint {
            p_up: shift,
            p_down: Power(0.0),
        }
    } else {
        DemandResponseSetPoint::default()
    }
}

/// Compute the load shift for every node in `p_load`
pub fn dispatch_demand_response(
    parameters: &DemandResponseParameters,
    p_load: &[Power],
    price: MoneyPerEnergy,
) -> IndexMap<UnitID, DemandResponseSetPoint> {
    p_load
        .iter()
        .enumerate()
        .map(|(node, load)| {
            (
                demand_response_id(node),
                node_set_point(parameters, *load, price),
            )
        })
        .collect()
}
