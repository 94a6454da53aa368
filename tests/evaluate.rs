//! Integration tests for the constraint evaluator.
use ies_dispatch::dispatch::dispatch;
use ies_dispatch::evaluate::{EvaluationOutcome, Predicate, evaluate};
use ies_dispatch::input::read_toml;
use ies_dispatch::model::Model;
use ies_dispatch::observation::ObservationRaw;
use ies_dispatch::state::SystemStateRaw;
use std::path::Path;

fn state() -> SystemStateRaw {
    read_toml(Path::new("demos/case1/state.toml")).unwrap()
}

fn observation() -> ObservationRaw {
    read_toml(Path::new("demos/case1/observation.toml")).unwrap()
}

#[test]
fn test_evaluate_bundled_state() {
    let model = Model::case1().unwrap();
    let action = dispatch(&model, &observation()).into_action();
    let outcome = evaluate(&model, &state(), &action);
    assert_eq!(outcome.reward(), 1.0);
}

#[test]
fn test_evaluate_dispatched_action_as_outputs() {
    let model = Model::case1().unwrap();
    let action = dispatch(&model, &observation()).into_action();
    let mut state = state();
    state.unit_outputs = None;

    // The prior policy's set points are always within their envelopes
    let diagnostics = evaluate(&model, &state, &action)
        .diagnostics()
        .cloned()
        .unwrap();
    assert_eq!(diagnostics.unit_violations, 0);
    assert_eq!(diagnostics.dr_violations, 0);
}

#[test]
fn test_evaluate_empty_state() {
    let model = Model::case1().unwrap();
    let action = dispatch(&model, &observation()).into_action();
    let outcome = evaluate(&model, &SystemStateRaw::default(), &action);

    // No cost or carbon reported, and the default totals are all out of balance
    let EvaluationOutcome::Scored {
        reward,
        diagnostics,
    } = outcome
    else {
        panic!("Expected evaluation to succeed");
    };
    assert_eq!(reward, 0.0);
    assert_eq!(
        diagnostics.violated,
        [
            Predicate::Cost,
            Predicate::Carbon,
            Predicate::ActivePowerBalance,
            Predicate::ReactivePowerBalance,
            Predicate::ThermalBalance
        ]
    );
}
