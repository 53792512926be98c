use anyhow::{ensure, Result};
use serde_json::json;
use tracing::info;

use hca_analysis::measure::{bus_voltage_magnitudes, line_current_magnitudes};
use hca_analysis::testing::ScriptedFeeder;
use hca_analysis::{
    CircuitOptions, FeederCircuit, GroundingPlan, Impedance, LoadFilter, SweepConfig,
};
use hca_core::{Diagnostics, ElementRef, FeederEngine, LimitSet};

use crate::cli::HostcapArgs;

/// The bundled 13-bus feeder on the scripted engine, with mild response
/// slopes so the demo limits bind within a few hundred kW.
pub fn demo_circuit(
    open_switch: bool,
    has_neutral: bool,
) -> Result<FeederCircuit<ScriptedFeeder>> {
    let mut engine = ScriptedFeeder::ieee13(has_neutral);
    engine.response.rise_pu_per_kw = 0.0002;
    engine.response.sag_pu_per_kw = 0.0002;
    engine.response.nev_volts_per_kw = 0.05;
    engine.response.vuf_percent_per_kw = 0.002;

    let options = CircuitOptions {
        open_switch,
        has_neutral,
        ..CircuitOptions::default()
    };
    FeederCircuit::new(engine, options)
}

pub fn pf(circuit: &mut FeederCircuit<ScriptedFeeder>, per_unit: bool) -> Result<()> {
    let converged = circuit.run_power_flow()?;
    let mut diag = Diagnostics::new();
    let buses = circuit.ordered_buses().to_vec();
    let voltages = bus_voltage_magnitudes(
        circuit.engine(),
        &buses,
        &circuit.node_table(),
        per_unit,
        true,
        &mut diag,
    )?;
    let lines = circuit.lines().to_vec();
    let currents =
        line_current_magnitudes(circuit.engine(), &lines, &circuit.node_table(), true, &mut diag)?;

    print_json(&json!({
        "converged": converged,
        "losses_kw": circuit.losses_kw(),
        "per_unit": per_unit,
        "voltages": voltages,
        "currents": currents,
        "diagnostics": diag,
    }))
}

pub fn kron(circuit: &mut FeederCircuit<ScriptedFeeder>) -> Result<()> {
    circuit.kron_reduction()?;

    let mut lines = serde_json::Map::new();
    for line in circuit.lines().to_vec() {
        let el = ElementRef::line(&line);
        lines.insert(
            line,
            json!({
                "bus1": circuit.engine().get_property(&el, "bus1")?,
                "bus2": circuit.engine().get_property(&el, "bus2")?,
            }),
        );
    }
    let mut loads = serde_json::Map::new();
    for load in circuit.loads().to_vec() {
        let el = ElementRef::load(&load);
        loads.insert(load, json!(circuit.engine().get_property(&el, "bus1")?));
    }

    print_json(&json!({
        "lines": lines,
        "loads": loads,
        "diagnostics": circuit.diagnostics(),
    }))
}

pub fn reactors(
    circuit: &mut FeederCircuit<ScriptedFeeder>,
    resistance: f64,
    reactance: f64,
) -> Result<()> {
    let created = circuit.add_grounding_reactors(
        Impedance::new(resistance, reactance),
        &GroundingPlan::default(),
    )?;
    info!(count = created.len(), "grounding reactors placed");

    print_json(&json!({
        "created": created,
        "reactors": circuit.reactors(),
        "diagnostics": circuit.diagnostics(),
    }))
}

pub fn pv(circuit: &mut FeederCircuit<ScriptedFeeder>) -> Result<()> {
    let created = circuit.add_single_phase_pv_systems()?;
    info!(count = created.len(), "pv systems placed");

    print_json(&json!({
        "created": created,
        "pv_systems": circuit.pv_systems(),
        "diagnostics": circuit.diagnostics(),
    }))
}

pub fn hostcap(circuit: &mut FeederCircuit<ScriptedFeeder>, args: &HostcapArgs) -> Result<()> {
    ensure!(args.step_kw > 0.0, "step must be positive");
    ensure!(args.max_kw >= 0.0, "max level must not be negative");

    let mut levels = Vec::new();
    let mut level = 0.0;
    while level <= args.max_kw + 1e-9 {
        levels.push(level);
        level += args.step_kw;
    }

    let mut limits = LimitSet::default();
    if args.vmin.is_some() || args.vmax.is_some() {
        limits = limits.with_voltage_band(args.vmin.unwrap_or(0.95), args.vmax.unwrap_or(1.05));
    }
    if let Some(nev) = args.nev {
        limits = limits.with_nev_cap(nev);
    }
    if let Some(vuf) = args.vuf {
        limits = limits.with_vuf_cap(vuf);
    }
    // A sweep without limits has nothing to find; fall back to the
    // standard service band.
    if limits.is_empty() {
        limits = limits.with_voltage_band(0.95, 1.05);
    }

    let config = SweepConfig {
        injection: !args.consumption,
        levels_kw: levels,
        limits,
        filter: LoadFilter {
            bus: args.bus.clone(),
            ..LoadFilter::single_phase_wye()
        },
        ..SweepConfig::default()
    };

    let results = circuit.hosting_capacity(&config)?;
    let rows: serde_json::Map<String, serde_json::Value> = results
        .iter()
        .map(|(load, entry)| {
            (
                load.clone(),
                json!({
                    "hc_kw": entry.hc_kw,
                    "limit": entry.limit_name(),
                }),
            )
        })
        .collect();

    print_json(&json!({
        "injection": !args.consumption,
        "results": rows,
        "diagnostics": circuit.diagnostics(),
    }))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kron_reports_the_rewritten_terminals() {
        let mut circuit = demo_circuit(false, true).unwrap();
        kron(&mut circuit).unwrap();

        let el = ElementRef::line("650632");
        assert_eq!(
            circuit.engine().get_property(&el, "bus1").unwrap(),
            "rg60.1.2.3.0"
        );
    }

    #[test]
    fn pf_runs_on_the_demo_feeder() {
        let mut circuit = demo_circuit(false, true).unwrap();
        pf(&mut circuit, true).unwrap();
        assert!(!circuit.ordered_buses().is_empty());
    }

    #[test]
    fn hostcap_accepts_the_default_arguments() {
        let mut circuit = demo_circuit(false, true).unwrap();
        let args = HostcapArgs {
            max_kw: 10.0,
            step_kw: 2.0,
            consumption: false,
            vmin: None,
            vmax: None,
            nev: None,
            vuf: None,
            bus: Some("611".to_string()),
        };
        hostcap(&mut circuit, &args).unwrap();
    }
}
