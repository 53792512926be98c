//! Topology transformation behavior against the scripted engine.

use hca_analysis::testing::ScriptedFeeder;
use hca_analysis::{CircuitOptions, FeederCircuit, GroundingPlan, Impedance};
use hca_core::{ElementClass, ElementRef, FeederEngine};

fn neutral_circuit() -> FeederCircuit<ScriptedFeeder> {
    let options = CircuitOptions {
        has_neutral: true,
        ..CircuitOptions::default()
    };
    FeederCircuit::new(ScriptedFeeder::ieee13(true), options).unwrap()
}

#[test]
fn kron_reduction_rewrites_only_the_trailing_neutral() {
    let mut circuit = neutral_circuit();
    circuit.kron_reduction().unwrap();
    assert!(!circuit.has_neutral());

    let engine = circuit.engine();

    // Lines: both terminals' trailing index moves to ground, the phase
    // indices and bus names stay put.
    let el = ElementRef::line("650632");
    assert_eq!(engine.get_property(&el, "bus1").unwrap(), "rg60.1.2.3.0");
    assert_eq!(engine.get_property(&el, "bus2").unwrap(), "632.1.2.3.0");
    let el = ElementRef::line("632645");
    assert_eq!(engine.get_property(&el, "bus1").unwrap(), "632.3.2.0");
    assert_eq!(engine.get_property(&el, "bus2").unwrap(), "645.3.2.0");

    // Loads drop the trailing neutral entirely.
    let el = ElementRef::load("634a");
    assert_eq!(engine.get_property(&el, "bus1").unwrap(), "634.1");
    // A delta load never carried one; its terminal is untouched.
    let el = ElementRef::load("671");
    assert_eq!(engine.get_property(&el, "bus1").unwrap(), "671.1.2.3");

    // Transformer terminals drop the trailing neutral too.
    let el = ElementRef::transformer("xfm1");
    assert_eq!(engine.get_property(&el, "bus1").unwrap(), "633.1.2.3");
    assert_eq!(engine.get_property(&el, "bus2").unwrap(), "634.1.2.3");
}

#[test]
fn kron_reduction_skips_loads_without_explicit_nodes() {
    let mut engine = ScriptedFeeder::ieee13(true);
    engine
        .command("new load.anon bus1=675 phases=1 conn=wye model=1 kv=2.4 kw=10 kvar=5")
        .unwrap();
    let options = CircuitOptions {
        has_neutral: true,
        ..CircuitOptions::default()
    };
    let mut circuit = FeederCircuit::new(engine, options).unwrap();

    circuit.kron_reduction().unwrap();

    assert!(circuit.diagnostics().has_warnings());
    let el = ElementRef::load("anon");
    assert_eq!(circuit.engine().get_property(&el, "bus1").unwrap(), "675");
}

#[test]
fn tie_switch_is_idempotent_in_both_directions() {
    let mut circuit = neutral_circuit();
    let el = ElementRef::line("671692");

    circuit.set_tie_switch(true).unwrap();
    circuit.set_tie_switch(true).unwrap();
    assert_eq!(
        circuit.engine().get_property(&el, "bus1").unwrap(),
        "671.11.12.13"
    );
    assert_eq!(
        circuit.engine().get_property(&el, "bus2").unwrap(),
        "692.1.2.3"
    );

    circuit.set_tie_switch(false).unwrap();
    circuit.set_tie_switch(false).unwrap();
    assert_eq!(circuit.engine().get_property(&el, "bus1").unwrap(), "671");
    assert_eq!(circuit.engine().get_property(&el, "bus2").unwrap(), "692");
}

#[test]
fn grounding_reactors_cover_every_neutral_receiving_bus_once() {
    let mut circuit = neutral_circuit();
    let created = circuit
        .add_grounding_reactors(Impedance::new(5.0, 0.0), &GroundingPlan::default())
        .unwrap();

    assert!(created.contains(&"bus632".to_string()));
    assert!(created.contains(&"bus611".to_string()));
    assert!(created.contains(&"bus684".to_string()));
    // The substation reactor and the bonding jumpers are placed, but they
    // are not part of the per-line list.
    assert!(!created.contains(&"bus650".to_string()));
    let reactors = circuit.reactors().to_vec();
    assert!(reactors.contains(&"bus650".to_string()));
    assert!(reactors.contains(&"jumperreg".to_string()));
    assert!(reactors.contains(&"jumperxfm".to_string()));

    // Transformer terminals were completed with the neutral index.
    let el = ElementRef::transformer("sub");
    assert_eq!(
        circuit.engine().get_property(&el, "bus1").unwrap(),
        "sourcebus.1.2.3.4"
    );

    // Re-running grounds nothing twice.
    let again = circuit
        .add_grounding_reactors(Impedance::new(5.0, 0.0), &GroundingPlan::default())
        .unwrap();
    assert!(again.is_empty());
    assert!(circuit.diagnostics().info_count() > 0);
}

#[test]
fn grounding_without_neutral_wires_is_an_informational_no_op() {
    let mut engine = ScriptedFeeder::new();
    engine.command("new line.l1 bus1=a.1.2.3 bus2=b.1.2.3").unwrap();
    engine.command("new line.l2 bus1=b.1.2.3 bus2=c.1.2.3").unwrap();
    engine.command("new line.tie bus1=a bus2=c").unwrap();
    let options = CircuitOptions {
        tie_line: "tie".to_string(),
        ..CircuitOptions::default()
    };
    let mut circuit = FeederCircuit::new(engine, options).unwrap();

    let plan = GroundingPlan {
        substation_bus: "a".to_string(),
        regulator_jumper: ("a".to_string(), "b".to_string()),
        transformer_jumper: ("b".to_string(), "c".to_string()),
    };
    let created = circuit
        .add_grounding_reactors(Impedance::new(5.0, 0.0), &plan)
        .unwrap();

    assert!(created.is_empty());
    assert!(circuit.diagnostics().info_count() > 0);
    assert!(!circuit.diagnostics().has_warnings());

    // The substation reactor and the jumpers were placed, but their own
    // neutral terminals did not count as line-bus exposure.
    let reactors = circuit.reactors().to_vec();
    assert!(reactors.contains(&"busa".to_string()));
    assert!(reactors.contains(&"jumperreg".to_string()));
    assert!(reactors.contains(&"jumperxfm".to_string()));
}

#[test]
fn kron_reduction_appends_ground_to_a_bare_second_terminal() {
    let mut engine = ScriptedFeeder::ieee13(true);
    engine
        .command("new line.671spur bus1=671.1.2.3.4 bus2=spur")
        .unwrap();
    let options = CircuitOptions {
        has_neutral: true,
        ..CircuitOptions::default()
    };
    let mut circuit = FeederCircuit::new(engine, options).unwrap();

    circuit.kron_reduction().unwrap();

    let el = ElementRef::line("671spur");
    assert_eq!(
        circuit.engine().get_property(&el, "bus1").unwrap(),
        "671.1.2.3.0"
    );
    assert_eq!(circuit.engine().get_property(&el, "bus2").unwrap(), "spur.0");
}

#[test]
fn pv_systems_attach_to_single_phase_wye_loads() {
    let mut circuit = neutral_circuit();
    let created = circuit.add_single_phase_pv_systems().unwrap();

    assert!(created.contains(&"pv_634a".to_string()));
    assert!(created.contains(&"pv_611".to_string()));
    // Delta loads get nothing.
    assert!(!created.iter().any(|name| name == "pv_671"));
    assert!(!created.iter().any(|name| name == "pv_646"));

    // Created disabled, at the load's own terminal.
    let el = ElementRef::new(ElementClass::PvSystem, "pv_611");
    assert_eq!(
        circuit.engine().get_property(&el, "enabled").unwrap(),
        "false"
    );
    assert_eq!(
        circuit.engine().get_property(&el, "bus1").unwrap(),
        "611.3.4"
    );

    // Idempotent on re-run.
    let again = circuit.add_single_phase_pv_systems().unwrap();
    assert!(again.is_empty());
}
