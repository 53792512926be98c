//! Hosting-capacity sweep behavior against the scripted engine.

use hca_analysis::testing::ScriptedFeeder;
use hca_analysis::{CircuitOptions, FeederCircuit, LoadFilter, SweepConfig};
use hca_core::{ElementRef, FeederEngine, LimitKind, LimitSet};

/// A candidate site load at bus 671, created at 0 kW so the sweep's
/// setpoint is the whole deviation the scripted response sees.
fn circuit_with_site(tune: impl FnOnce(&mut ScriptedFeeder)) -> FeederCircuit<ScriptedFeeder> {
    let mut engine = ScriptedFeeder::ieee13(true);
    engine
        .command("new load.site bus1=671.1.4 phases=1 conn=wye model=1 kv=2.4 kw=0 kvar=0")
        .unwrap();
    tune(&mut engine);
    let options = CircuitOptions {
        has_neutral: true,
        ..CircuitOptions::default()
    };
    FeederCircuit::new(engine, options).unwrap()
}

fn site_filter() -> LoadFilter {
    LoadFilter {
        bus: Some("671".to_string()),
        ..LoadFilter::single_phase_wye()
    }
}

fn levels(end: i32, step: usize) -> Vec<f64> {
    (0..=end).step_by(step).map(f64::from).collect()
}

#[test]
fn consumption_sweep_stops_at_the_voltage_band() {
    // 0.001 pu of sag per added kW: the band floor of 0.949 pu is crossed
    // between the 50 and 52 kW candidates.
    let mut circuit = circuit_with_site(|engine| {
        engine.response.sag_pu_per_kw = 0.001;
    });
    let config = SweepConfig {
        injection: false,
        levels_kw: levels(100, 2),
        limits: LimitSet::default().with_voltage_band(0.949, 1.05),
        filter: site_filter(),
        ..SweepConfig::default()
    };

    let results = circuit.hosting_capacity(&config).unwrap();

    assert_eq!(results.len(), 1);
    let entry = &results["site"];
    assert_eq!(entry.hc_kw, 50.0);
    assert_eq!(entry.binding_limit, Some(LimitKind::Voltage));
    assert_eq!(entry.limit_name(), "Voltage");
}

#[test]
fn disabled_limits_never_bind_an_injection_sweep() {
    // Only the unbalance cap is configured; the phase voltages and the
    // neutral rise too, but must never be reported.
    let mut circuit = circuit_with_site(|engine| {
        engine.response.rise_pu_per_kw = 0.002;
        engine.response.nev_volts_per_kw = 0.5;
        engine.response.vuf_percent_per_kw = 0.01;
    });
    let config = SweepConfig {
        injection: true,
        levels_kw: levels(200, 10),
        limits: LimitSet::default().with_vuf_cap(2.05),
        filter: site_filter(),
        ..SweepConfig::default()
    };

    let results = circuit.hosting_capacity(&config).unwrap();

    let entry = &results["site"];
    assert_eq!(entry.hc_kw, -150.0);
    assert_eq!(entry.binding_limit, Some(LimitKind::Unbalance));
    assert_eq!(entry.limit_name(), "VUF");
}

#[test]
fn neutral_limit_binds_while_the_voltage_band_is_admissible() {
    let mut circuit = circuit_with_site(|engine| {
        engine.response.nev_volts_per_kw = 0.1;
    });
    let config = SweepConfig {
        injection: true,
        levels_kw: levels(120, 4),
        limits: LimitSet::default()
            .with_voltage_band(0.8, 1.2)
            .with_nev_cap(10.0),
        filter: site_filter(),
        ..SweepConfig::default()
    };

    let results = circuit.hosting_capacity(&config).unwrap();

    let entry = &results["site"];
    assert_eq!(entry.hc_kw, -88.0);
    assert_eq!(entry.binding_limit, Some(LimitKind::NeutralToEarth));
    assert_eq!(entry.limit_name(), "NEV");
}

#[test]
fn exhausted_ladder_reports_the_last_level_without_a_limit() {
    let mut circuit = circuit_with_site(|_| {});
    let config = SweepConfig {
        injection: true,
        levels_kw: levels(20, 2),
        limits: LimitSet::default().with_voltage_band(0.5, 1.5),
        filter: site_filter(),
        ..SweepConfig::default()
    };

    let results = circuit.hosting_capacity(&config).unwrap();

    let entry = &results["site"];
    assert_eq!(entry.hc_kw, -20.0);
    assert_eq!(entry.binding_limit, None);
    assert_eq!(entry.limit_name(), "None");
}

#[test]
fn persistent_divergence_abandons_the_candidate_and_keeps_the_partial_result() {
    let mut circuit = circuit_with_site(|engine| {
        engine.diverge_above_kw = Some(25.0);
        engine.recover_after_attempts = u32::MAX;
    });
    let config = SweepConfig {
        injection: true,
        levels_kw: levels(40, 10),
        limits: LimitSet::default().with_voltage_band(0.5, 1.5),
        max_recovery_attempts: 5,
        filter: site_filter(),
    };

    let results = circuit.hosting_capacity(&config).unwrap();

    let entry = &results["site"];
    assert_eq!(entry.hc_kw, -20.0);
    assert_eq!(entry.binding_limit, None);
    assert!(circuit.diagnostics().has_warnings());

    // Restoration happened despite the abandonment.
    let el = ElementRef::load("site");
    assert_eq!(circuit.engine().get_property(&el, "kw").unwrap(), "0");
    assert_eq!(circuit.engine().get_property(&el, "kvar").unwrap(), "0");
}

#[test]
fn transient_divergence_recovers_and_the_sweep_continues() {
    let mut circuit = circuit_with_site(|engine| {
        engine.diverge_above_kw = Some(25.0);
        engine.recover_after_attempts = 3;
    });
    let config = SweepConfig {
        injection: true,
        levels_kw: levels(40, 10),
        limits: LimitSet::default().with_voltage_band(0.5, 1.5),
        max_recovery_attempts: 10,
        filter: site_filter(),
    };

    let results = circuit.hosting_capacity(&config).unwrap();

    let entry = &results["site"];
    assert_eq!(entry.hc_kw, -40.0);
    assert_eq!(entry.binding_limit, None);
}

#[test]
fn setpoints_are_restored_after_a_binding_sweep() {
    let mut circuit = circuit_with_site(|engine| {
        engine.response.sag_pu_per_kw = 0.001;
    });
    let config = SweepConfig {
        injection: false,
        levels_kw: levels(100, 2),
        limits: LimitSet::default().with_voltage_band(0.949, 1.05),
        filter: site_filter(),
        ..SweepConfig::default()
    };
    circuit.hosting_capacity(&config).unwrap();

    let el = ElementRef::load("site");
    assert_eq!(circuit.engine().get_property(&el, "kw").unwrap(), "0");
    assert_eq!(circuit.engine().get_property(&el, "kvar").unwrap(), "0");

    // Regulator taps were reset for the sweep baseline.
    let reg = ElementRef::reg_control("reg1");
    assert_eq!(circuit.engine().get_property(&reg, "tapnum").unwrap(), "0");
}

#[test]
fn empty_limit_set_and_empty_eligible_set_yield_empty_results() {
    let mut circuit = circuit_with_site(|_| {});
    let config = SweepConfig {
        filter: site_filter(),
        ..SweepConfig::default()
    };
    // Default limit set is empty.
    assert!(circuit.hosting_capacity(&config).unwrap().is_empty());

    let config = SweepConfig {
        levels_kw: levels(10, 2),
        limits: LimitSet::default().with_voltage_band(0.95, 1.05),
        filter: LoadFilter {
            bus: Some("nowhere".to_string()),
            ..LoadFilter::single_phase_wye()
        },
        ..SweepConfig::default()
    };
    assert!(circuit.hosting_capacity(&config).unwrap().is_empty());
    assert!(circuit.diagnostics().info_count() > 0);
}

#[test]
fn every_wye_load_gets_an_entry_in_a_full_sweep() {
    let mut circuit = circuit_with_site(|_| {});
    let config = SweepConfig {
        injection: true,
        levels_kw: levels(4, 2),
        limits: LimitSet::default().with_voltage_band(0.5, 1.5),
        filter: LoadFilter::single_phase_wye(),
        ..SweepConfig::default()
    };

    let results = circuit.hosting_capacity(&config).unwrap();

    // Eleven wye loads from the base case plus the added site; the delta
    // loads are absent entirely.
    assert_eq!(results.len(), 12);
    assert!(results.contains_key("site"));
    assert!(results.contains_key("634a"));
    assert!(!results.contains_key("671"));
    assert!(!results.contains_key("646"));
    for entry in results.values() {
        assert_eq!(entry.hc_kw, -4.0);
        assert_eq!(entry.binding_limit, None);
    }
}
