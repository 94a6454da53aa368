//! Fixtures for tests
use crate::model::{Model, ModelParameters};
use crate::observation::ObservationRaw;
use crate::state::SystemStateRaw;
use crate::unit::{ChpSpec, UnitRegistry};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

#[fixture]
pub fn model() -> Model {
    Model::case1().unwrap()
}

#[fixture]
pub fn registry(model: Model) -> UnitRegistry {
    model.units
}

#[fixture]
pub fn parameters(model: Model) -> ModelParameters {
    model.parameters
}

#[fixture]
pub fn chp(registry: UnitRegistry) -> ChpSpec {
    registry.chps[0].clone()
}

/// Total load 6 MW, thermal load 3 MW, no renewables, price 120 $/MWh
#[fixture]
pub fn observation_raw() -> ObservationRaw {
    ObservationRaw {
        p_load: Some(vec![1.0; 6]),
        h_load: Some(vec![1.0; 3]),
        p_ren_forecast: Some(vec![0.0; 4]),
        t_outdoor: Some(5.0),
        t_indoor: Some(vec![21.0; 7]),
        t_supply: Some(vec![75.0; 12]),
        t_return: Some(vec![50.0; 12]),
        nci_e: None,
        nci_h: None,
        electricity_price: Some(120.0),
        carbon_price: Some(30.0),
        previous_action: None,
    }
}

/// A state in which every predicate holds, with feasible unit outputs
#[fixture]
pub fn state_raw() -> SystemStateRaw {
    toml::from_str(
        r#"
        total_cost = 12000.0
        carbon_emission = 95.0
        renewable_curtailment = 1.0
        p_gen_total = 6.02
        p_load_total = 6.0
        q_gen_total = 2.0
        q_load_total = 2.01
        h_gen_total = 3.0
        h_load_total = 3.03
        voltage_squared = [1.0, 0.98, 1.02]
        current_squared = [120.0, 250.0]
        temperature_supply = [75.0, 80.0]
        temperature_return = [50.0, 45.0]
        temperature_indoor = [21.0, 22.0, 23.0, 22.0, 22.0, 21.5, 22.5]
        ramping_violations = 0

        [unit_outputs.CHP.CHP_1]
        P = 3.3
        H = 3.0

        [unit_outputs.DG]
        DG_1 = 2.0
        DG_2 = 4.0

        [unit_outputs.EB]
        EB_1 = 0.0

        [unit_outputs.DR.DR_node_0]
        P_down = 0.05
        "#,
    )
    .unwrap()
}
