//! Set points for every unit in the system, grouped by agent category.
use crate::model::Model;
use crate::unit::UnitID;
use crate::units::{Power, ReactivePower, UnitType};
use anyhow::{Result, ensure};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Electrical and heat output of a CHP unit
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChpSetPoint {
    /// Electrical output
    #[serde(rename = "P", default)]
    pub p: Power,
    /// Heat output
    #[serde(rename = "H", default)]
    pub h: Power,
}

/// Load shift at a single electrical node
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DemandResponseSetPoint {
    /// Load increase
    #[serde(rename = "P_up", default)]
    pub p_up: Power,
    /// Load decrease
    #[serde(rename = "P_down", default)]
    pub p_down: Power,
}

impl DemandResponseSetPoint {
    /// Whether load is being both increased and decreased at once
    pub fn is_bidirectional(&self) -> bool {
        self.p_up > Power(0.0) && self.p_down > Power(0.0)
    }
}

/// Power exchanged with the upstream grid
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GridSetPoint {
    /// Active power import
    #[serde(rename = "P")]
    pub p: Power,
    /// Reactive power import
    #[serde(rename = "Q")]
    pub q: ReactivePower,
}

/// The ID used for the demand response entry of the electrical node with the given index
pub fn demand_response_id(node: usize) -> UnitID {
    format!("DR_node_{node}").into()
}

/// Zero set points for the given units
fn idle<'a>(ids: impl Iterator<Item = &'a UnitID>) -> IndexMap<UnitID, Power> {
    ids.map(|id| (id.clone(), Power(0.0))).collect()
}

/// Set points for every unit for one control step
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Action {
    /// Renewable output
    #[serde(rename = "Renewable", default)]
    pub renewable: IndexMap<UnitID, Power>,
    /// Dispatchable generator output
    #[serde(rename = "DG", default)]
    pub dg: IndexMap<UnitID, Power>,
    /// CHP output
    #[serde(rename = "CHP", default)]
    pub chp: IndexMap<UnitID, ChpSetPoint>,
    /// Electric boiler input
    #[serde(rename = "EB", default)]
    pub eb: IndexMap<UnitID, Power>,
    /// TCL heating
    #[serde(rename = "TCL", default)]
    pub tcl: IndexMap<UnitID, Power>,
    /// Demand response, keyed by node
    #[serde(rename = "DR", default)]
    pub dr: IndexMap<UnitID, DemandResponseSetPoint>,
    /// Grid exchange
    #[serde(rename = "Grid", default)]
    pub grid: GridSetPoint,
}

impl Action {
    /// The safe minimal action used when dispatch fails.
    ///
    /// Every unit is idle except the CHPs, which sit at their minimum operating point, and the
    /// grid, which supplies a fixed import.
    pub fn fallback(model: &Model) -> Self {
        let units = &model.units;
        let grid_import = model.parameters.fallback.grid_import;

        Self {
            renewable: idle(units.renewables.keys()),
            dg: idle(units.generators.keys()),
            chp: units
                .chps
                .values()
                .map(|unit| {
                    (
                        unit.id.clone(),
                        ChpSetPoint {
                            p: unit.p.min,
                            h: unit.h.min,
                        },
                    )
                })
                .collect(),
            eb: idle(units.boilers.keys()),
            tcl: idle(units.tcls.keys()),
            dr: (0..units.network.electrical_nodes)
                .map(|node| (demand_response_id(node), DemandResponseSetPoint::default()))
                .collect(),
            grid: GridSetPoint {
                p: grid_import,
                q: ReactivePower::at_power_factor(grid_import, units.grid.power_factor),
            },
        }
    }

    /// Total renewable output
    pub fn renewable_total(&self) -> Power {
        self.renewable.values().copied().sum()
    }

    /// Total dispatchable generator output
    pub fn dg_total(&self) -> Power {
        self.dg.values().copied().sum()
    }

    /// Total CHP electrical output
    pub fn chp_power_total(&self) -> Power {
        self.chp.values().map(|set_point| set_point.p).sum()
    }

    /// Total CHP heat output
    pub fn chp_heat_total(&self) -> Power {
        self.chp.values().map(|set_point| set_point.h).sum()
    }

    /// Total electric boiler draw
    pub fn eb_total(&self) -> Power {
        self.eb.values().copied().sum()
    }

    /// Net output of local units: generation minus boiler draw
    pub fn local_net_generation(&self) -> Power {
        self.renewable_total() + self.dg_total() + self.chp_power_total() - self.eb_total()
    }

    /// Check that every set point is a finite number
    pub fn check_finite(&self) -> Result<()> {
        let powers = self
            .renewable
            .iter()
            .chain(&self.dg)
            .chain(&self.eb)
            .chain(&self.tcl);
        for (id, value) in powers {
            ensure!(value.is_finite(), "Set point for {id} is not finite");
        }
        for (id, set_point) in &self.chp {
            ensure!(
                set_point.p.is_finite() && set_point.h.is_finite(),
                "Set point for {id} is not finite"
            );
        }
        for (id, set_point) in &self.dr {
            ensure!(
                set_point.p_up.is_finite() && set_point.p_down.is_finite(),
                "Set point for {id} is not finite"
            );
        }
        ensure!(
            self.grid.p.is_finite() && self.grid.q.is_finite(),
            "Grid set point is not finite"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, model};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_fallback(model: Model) {
        let action = Action::fallback(&model);
        assert_eq!(action.renewable.len(), 4);
        assert!(action.renewable.values().all(|p| *p == Power(0.0)));
        assert!(action.dg.values().all(|p| *p == Power(0.0)));
        assert_eq!(
            action.chp["CHP_1"],
            ChpSetPoint {
                p: Power(1.0),
                h: Power(0.0)
            }
        );
        assert_eq!(action.eb["EB_1"], Power(0.0));
        assert_eq!(action.tcl.len(), 7);
        assert_eq!(action.dr.len(), 33);
        assert!(action.dr.contains_key("DR_node_32"));
        assert_eq!(action.grid.p, Power(5.0));
        assert_approx_eq!(f64, action.grid.q.value(), 5.0 * 0.85f64.acos().tan());
    }

    #[test]
    fn test_is_bidirectional() {
        let mut set_point = DemandResponseSetPoint::default();
        assert!(!set_point.is_bidirectional());
        set_point.p_up = Power(0.1);
        assert!(!set_point.is_bidirectional());
        set_point.p_down = Power(0.1);
        assert!(set_point.is_bidirectional());
    }

    #[rstest]
    fn test_local_net_generation(model: Model) {
        let mut action = Action::fallback(&model);
        action.renewable[0] = Power(1.0);
        action.dg[0] = Power(2.0);
        action.eb[0] = Power(0.5);

        // CHP sits at 1.0
        assert_approx_eq!(f64, action.local_net_generation().value(), 3.5);
    }

    #[rstest]
    fn test_check_finite(model: Model) {
        let mut action = Action::fallback(&model);
        assert!(action.check_finite().is_ok());
        action.tcl[2] = Power(f64::NAN);
        assert_error!(action.check_finite(), "Set point for TCL_3 is not finite");
    }

    #[rstest]
    fn test_toml_roundtrip_names(model: Model) {
        let action = Action::fallback(&model);
        let text = toml::to_string(&action).unwrap();
        assert!(text.contains("[Renewable]"));
        assert!(text.contains("CHP_1"));
        assert!(text.contains("[Grid]"));
        let parsed: Action = toml::from_str(&text).unwrap();
        assert_eq!(parsed, action);
    }
}
