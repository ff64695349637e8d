//! End-to-end checks that drive the proof engine through the library API
//! directly (not by shelling out to the `krill` binary), against every
//! built-in scenario [`keyset_cli::demo`] registers.

use keyset_cli::demo::{self, Scenario, SCENARIOS};
use keyset_solver::Limits;

fn run(name: &str) -> keyset_proof::ProofResult<keyset_proof::VerificationReport> {
    let Scenario { mut factory, config, functions } = demo::load(name).unwrap_or_else(|| panic!("no such scenario: {name}"));
    let limits = Limits::default();
    keyset_proof::verify_program(&mut factory, &config, &limits, keyset_proof::MacroStrategy::Eager, &functions)
}

#[test]
fn every_registered_scenario_loads() {
    for name in SCENARIOS {
        assert!(demo::load(name).is_some(), "scenario `{name}` should load");
    }
}

#[test]
fn unknown_scenario_name_does_not_load() {
    assert!(demo::load("no-such-scenario").is_none());
}

#[test]
fn contains_on_an_isolated_node_is_verified_and_reports_absent() {
    let report = run("contains").expect("an isolated node's contains check should verify");
    assert_eq!(report.pool.len(), 0, "a purely local node publishes no interference effects");
}

#[test]
fn locked_contains_on_an_isolated_node_is_verified() {
    let report = run("locked-contains").expect("lock acquire/release around a local write should verify");
    assert_eq!(report.pool.len(), 0);
}

#[test]
fn link_two_cells_verifies_with_a_two_node_footprint() {
    let report = run("link-two-cells").expect("linking two never-shared cells should verify");
    assert_eq!(report.pool.len(), 0, "neither cell ever becomes visible to another thread");
}

#[test]
fn contains_verifies_under_the_lazy_macro_strategy_too() {
    let Scenario { mut factory, config, functions } = demo::load("contains").unwrap();
    let limits = Limits::default();
    let report = keyset_proof::verify_program(&mut factory, &config, &limits, keyset_proof::MacroStrategy::Lazy, &functions)
        .expect("scenario has no macro calls, so strategy choice should not matter");
    assert_eq!(report.sweeps, 1);
}
