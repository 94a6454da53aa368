//! The snapshot of the system given to the dispatcher at each control step.
//!
//! Observations arrive as an [`ObservationRaw`], in which every key is optional, and are checked
//! against the unit registry before any dispatch takes place.
use crate::action::Action;
use crate::input::check_finite;
use crate::unit::{UnitCategory, UnitRegistry};
use crate::units::{MoneyPerEnergy, Power, Temperature};
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// An observation as received from the environment
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObservationRaw {
    /// Electrical load at each node (MW)
    pub p_load: Option<Vec<f64>>,
    /// Thermal load at each node (MW)
    pub h_load: Option<Vec<f64>>,
    /// Forecast renewable generation, one entry per renewable unit (MW)
    pub p_ren_forecast: Option<Vec<f64>>,
    /// Outdoor temperature (°C)
    pub t_outdoor: Option<f64>,
    /// Indoor temperature, one entry per TCL (°C)
    pub t_indoor: Option<Vec<f64>>,
    /// Supply network temperatures (°C)
    pub t_supply: Option<Vec<f64>>,
    /// Return network temperatures (°C)
    pub t_return: Option<Vec<f64>>,
    /// Node carbon intensity of the electrical network (t/MWh)
    pub nci_e: Option<Vec<f64>>,
    /// Node carbon intensity of the thermal network (t/MWh)
    pub nci_h: Option<Vec<f64>>,
    /// Spot electricity price ($/MWh)
    pub electricity_price: Option<f64>,
    /// Carbon price ($/t)
    pub carbon_price: Option<f64>,
    /// The action taken at the previous step, if any
    pub previous_action: Option<Action>,
}

/// A validated observation
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Electrical load at each node
    pub p_load: Vec<Power>,
    /// Thermal load at each node
    pub h_load: Vec<Power>,
    /// Forecast renewable generation, in registry order
    pub renewable_forecast: Vec<Power>,
    /// Outdoor temperature
    pub outdoor_temperature: Temperature,
    /// Indoor temperature of each TCL, in registry order
    pub indoor_temperatures: Vec<Temperature>,
    /// Spot electricity price
    pub electricity_price: MoneyPerEnergy,
    /// The action taken at the previous step, if any
    pub previous_action: Option<Action>,
}

/// Get a required array, checking it is non-empty and finite
fn required_array(name: &str, values: Option<&Vec<f64>>) -> Result<Vec<f64>> {
    let values = values.with_context(|| format!("Observation is missing `{name}`"))?;
    ensure!(!values.is_empty(), "`{name}` must not be empty");
    check_finite(name, values)?;

    Ok(values.clone())
}

/// Check that an optional array is finite, if present
fn check_optional_array(name: &str, values: Option<&Vec<f64>>) -> Result<()> {
    if let Some(values) = values {
        check_finite(name, values)?;
    }

    Ok(())
}

/// Get a required scalar, checking it is finite
fn required_scalar(name: &str, value: Option<f64>) -> Result<f64> {
    let value = value.with_context(|| format!("Observation is missing `{name}`"))?;
    ensure!(value.is_finite(), "`{name}` must be finite (got {value})");

    Ok(value)
}

fn wrap<T>(values: Vec<f64>, f: fn(f64) -> T) -> Vec<T> {
    values.into_iter().map(f).collect()
}

/// Check that a previous action has finite set points for known units of the right category
fn check_previous_action(action: &Action, units: &UnitRegistry) -> Result<()> {
    action.check_finite()?;

    let ids = action
        .renewable
        .keys()
        .map(|id| (id, UnitCategory::Renewable))
        .chain(action.dg.keys().map(|id| (id, UnitCategory::Generator)))
        .chain(action.chp.keys().map(|id| (id, UnitCategory::Chp)))
        .chain(action.eb.keys().map(|id| (id, UnitCategory::Boiler)))
        .chain(action.tcl.keys().map(|id| (id, UnitCategory::Tcl)));
    for (id, expected) in ids {
        let category = units
            .category_of(&id.0)
            .with_context(|| format!("Unknown ID {id} found"))?;
        ensure!(
            category == expected,
            "{id} is listed under {expected} but is registered as {category}"
        );
    }

    Ok(())
}

impl Observation {
    /// Validate a raw observation against the unit registry.
    ///
    /// Missing indoor temperatures default to each TCL's initial temperature and a missing outdoor
    /// temperature defaults to zero. The network temperatures, carbon intensities and carbon
    /// price don't drive the policy and are only checked to be finite when present. Any other
    /// missing key is an error, as is a previous action with non-finite set points or unknown
    /// units.
    pub fn from_raw(raw: &ObservationRaw, units: &UnitRegistry) -> Result<Self> {
        let p_load = required_array("p_load", raw.p_load.as_ref())?;
        let h_load = required_array("h_load", raw.h_load.as_ref())?;

        let forecast = required_array("p_ren_forecast", raw.p_ren_forecast.as_ref())?;
        ensure!(
            forecast.len() == units.renewables.len(),
            "`p_ren_forecast` has {} entries but there are {} renewable units",
            forecast.len(),
            units.renewables.len()
        );

        let indoor_temperatures = if let Some(t_indoor) = &raw.t_indoor {
            check_finite("t_indoor", t_indoor)?;
            ensure!(
                t_indoor.len() == units.tcls.len(),
                "`t_indoor` has {} entries but there are {} TCLs",
                t_indoor.len(),
                units.tcls.len()
            );
            wrap(t_indoor.clone(), Temperature)
        } else {
            units
                .tcls
                .values()
                .map(|unit| unit.initial_temperature)
                .collect()
        };

        let outdoor_temperature = raw.t_outdoor.unwrap_or(0.0);
        ensure!(
            outdoor_temperature.is_finite(),
            "`t_outdoor` must be finite (got {outdoor_temperature})"
        );
        check_optional_array("t_supply", raw.t_supply.as_ref())?;
        check_optional_array("t_return", raw.t_return.as_ref())?;
        check_optional_array("nci_e", raw.nci_e.as_ref())?;
        check_optional_array("nci_h", raw.nci_h.as_ref())?;
        if let Some(carbon_price) = raw.carbon_price {
            ensure!(
                carbon_price.is_finite(),
                "`carbon_price` must be finite (got {carbon_price})"
            );
        }

        if let Some(previous) = &raw.previous_action {
            check_previous_action(previous, units).context("Invalid `previous_action`")?;
        }

        Ok(Self {
            p_load: wrap(p_load, Power),
            h_load: wrap(h_load, Power),
            renewable_forecast: wrap(forecast, Power),
            outdoor_temperature: Temperature(outdoor_temperature),
            indoor_temperatures,
            electricity_price: MoneyPerEnergy(required_scalar(
                "electricity_price",
                raw.electricity_price,
            )?),
            previous_action: raw.previous_action.clone(),
        })
    }

    /// Total electrical load
    pub fn total_p_load(&self) -> Power {
        self.p_load.iter().copied().sum()
    }

    /// Total thermal load
    pub fn total_h_load(&self) -> Power {
        self.h_load.iter().copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, model, observation_raw, registry};
    use crate::model::Model;
    use crate::units::ReactivePower;
    use rstest::rstest;

    /// Validate an observation whose previous action has been modified, returning the full
    /// error chain
    fn previous_action_error(
        model: &Model,
        mut observation_raw: ObservationRaw,
        modify: impl FnOnce(&mut Action),
    ) -> String {
        let mut previous = Action::fallback(model);
        modify(&mut previous);
        observation_raw.previous_action = Some(previous);
        let err = Observation::from_raw(&observation_raw, &model.units).unwrap_err();
        format!("{err:#}")
    }

    #[rstest]
    fn test_from_raw(observation_raw: ObservationRaw, registry: UnitRegistry) {
        let observation = Observation::from_raw(&observation_raw, &registry).unwrap();
        assert_eq!(observation.total_p_load(), Power(6.0));
        assert_eq!(observation.total_h_load(), Power(3.0));
        assert_eq!(observation.renewable_forecast.len(), 4);
        assert_eq!(observation.electricity_price, MoneyPerEnergy(120.0));
    }

    #[rstest]
    fn test_from_raw_default_indoor(mut observation_raw: ObservationRaw, registry: UnitRegistry) {
        observation_raw.t_indoor = None;
        let observation = Observation::from_raw(&observation_raw, &registry).unwrap();
        assert_eq!(observation.indoor_temperatures, vec![Temperature(21.0); 7]);
    }

    #[rstest]
    fn test_from_raw_missing_load(mut observation_raw: ObservationRaw, registry: UnitRegistry) {
        observation_raw.p_load = None;
        assert_error!(
            Observation::from_raw(&observation_raw, &registry),
            "Observation is missing `p_load`"
        );
    }

    #[rstest]
    fn test_from_raw_missing_price(mut observation_raw: ObservationRaw, registry: UnitRegistry) {
        observation_raw.electricity_price = None;
        assert_error!(
            Observation::from_raw(&observation_raw, &registry),
            "Observation is missing `electricity_price`"
        );
    }

    #[rstest]
    fn test_from_raw_empty_load(mut observation_raw: ObservationRaw, registry: UnitRegistry) {
        observation_raw.h_load = Some(Vec::new());
        assert_error!(
            Observation::from_raw(&observation_raw, &registry),
            "`h_load` must not be empty"
        );
    }

    #[rstest]
    fn test_from_raw_short_forecast(mut observation_raw: ObservationRaw, registry: UnitRegistry) {
        observation_raw.p_ren_forecast = Some(vec![1.0, 1.0]);
        assert_error!(
            Observation::from_raw(&observation_raw, &registry),
            "`p_ren_forecast` has 2 entries but there are 4 renewable units"
        );
    }

    #[rstest]
    fn test_from_raw_non_finite(mut observation_raw: ObservationRaw, registry: UnitRegistry) {
        observation_raw.p_load = Some(vec![1.0, f64::NAN]);
        assert_error!(
            Observation::from_raw(&observation_raw, &registry),
            "`p_load` contains a non-finite value (NaN)"
        );
    }

    #[rstest]
    fn test_from_raw_previous_action(model: Model, mut observation_raw: ObservationRaw) {
        let previous = Action::fallback(&model);
        observation_raw.previous_action = Some(previous.clone());
        let observation = Observation::from_raw(&observation_raw, &model.units).unwrap();
        assert_eq!(observation.previous_action, Some(previous));
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn test_from_raw_previous_action_non_finite(
        model: Model,
        observation_raw: ObservationRaw,
        #[case] value: f64,
    ) {
        assert_eq!(
            previous_action_error(&model, observation_raw, |action| {
                action.dg["DG_1"] = Power(value);
            }),
            "Invalid `previous_action`: Set point for DG_1 is not finite"
        );
    }

    #[rstest]
    fn test_from_raw_previous_action_non_finite_grid(
        model: Model,
        observation_raw: ObservationRaw,
    ) {
        assert_eq!(
            previous_action_error(&model, observation_raw, |action| {
                action.grid.q = ReactivePower(f64::NAN);
            }),
            "Invalid `previous_action`: Grid set point is not finite"
        );
    }

    #[rstest]
    fn test_from_raw_previous_action_unknown_unit(
        model: Model,
        observation_raw: ObservationRaw,
    ) {
        assert_eq!(
            previous_action_error(&model, observation_raw, |action| {
                action.dg.insert("DG_99".into(), Power(1.0));
            }),
            "Invalid `previous_action`: Unknown ID DG_99 found"
        );
    }

    #[rstest]
    fn test_from_raw_previous_action_wrong_category(
        model: Model,
        observation_raw: ObservationRaw,
    ) {
        assert_eq!(
            previous_action_error(&model, observation_raw, |action| {
                action.dg.insert("EB_1".into(), Power(1.0));
            }),
            "Invalid `previous_action`: EB_1 is listed under DG but is registered as EB"
        );
    }

    #[rstest]
    fn test_from_raw_non_finite_network_temperature(
        mut observation_raw: ObservationRaw,
        registry: UnitRegistry,
    ) {
        observation_raw.t_return = Some(vec![50.0, f64::INFINITY]);
        assert_error!(
            Observation::from_raw(&observation_raw, &registry),
            "`t_return` contains a non-finite value (inf)"
        );
    }
}
