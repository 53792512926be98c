//! Read-only measurement extraction from the solved network.
//!
//! All functions here query the engine without mutating it, and are only
//! meaningful after a successful solve; the caller is responsible for
//! re-solving before reading.

use std::collections::BTreeMap;

use anyhow::Result;

use hca_core::{engine::terminal_property, Diagnostics, ElementRef, FeederEngine, NodeTable};

/// Magnitudes keyed by phase letter at one bus or line terminal.
pub type PhaseSeries = BTreeMap<char, f64>;

/// Per-bus voltage magnitudes keyed by phase letter.
///
/// Node indices not present in the addressing table are skipped; when
/// `warn_unknown_nodes` is set the skip is recorded as a warning.
pub fn bus_voltage_magnitudes<E: FeederEngine + ?Sized>(
    engine: &E,
    buses: &[String],
    table: &NodeTable,
    per_unit: bool,
    warn_unknown_nodes: bool,
    diag: &mut Diagnostics,
) -> Result<BTreeMap<String, PhaseSeries>> {
    let mut voltages = BTreeMap::new();
    for bus in buses {
        let nodes = engine.bus_nodes(bus)?;
        let phasors = engine.bus_voltage_phasors(bus, per_unit)?;
        let mut series = PhaseSeries::new();
        for (node, (magnitude, _angle)) in nodes.iter().zip(phasors.iter()) {
            match table.letter(*node) {
                Some(letter) => {
                    series.insert(letter, *magnitude);
                }
                None if warn_unknown_nodes => {
                    diag.add_warning_with_entity(
                        "measurement",
                        &format!("node {} not found in the addressing table", node),
                        &format!("bus {}", bus),
                    );
                }
                None => {}
            }
        }
        voltages.insert(bus.clone(), series);
    }
    Ok(voltages)
}

/// Voltage unbalance factor, in percent, for genuinely three-phase buses.
///
/// A bus qualifies when its energized-node count exceeds
/// `expected_phases`; single- and two-phase laterals are excluded. Buses
/// with zero positive-sequence magnitude are omitted rather than mapped
/// to a sentinel, since the ratio is undefined there.
pub fn voltage_unbalance<E: FeederEngine + ?Sized>(
    engine: &E,
    buses: &[String],
    expected_phases: usize,
) -> Result<BTreeMap<String, f64>> {
    let mut vuf = BTreeMap::new();
    for bus in buses {
        let nodes = engine.bus_nodes(bus)?;
        if nodes.len() <= expected_phases {
            continue;
        }
        let [_zero, positive, negative] = engine.bus_sequence_voltages(bus)?;
        if positive > 0.0 {
            vuf.insert(bus.clone(), (negative / positive) * 100.0);
        }
    }
    Ok(vuf)
}

/// Per-line current magnitudes keyed by phase letter.
///
/// Conductors are resolved from the first terminal's bus: its energized
/// node indices are paired positionally with the line's per-terminal
/// current magnitudes.
pub fn line_current_magnitudes<E: FeederEngine + ?Sized>(
    engine: &E,
    lines: &[String],
    table: &NodeTable,
    warn_unknown_nodes: bool,
    diag: &mut Diagnostics,
) -> Result<BTreeMap<String, PhaseSeries>> {
    let mut currents = BTreeMap::new();
    for line in lines {
        let el = ElementRef::line(line);
        let stem = terminal_property(engine, &el, "bus1")?.bus().to_string();
        let nodes = engine.bus_nodes(&stem)?;
        let phasors = engine.line_current_phasors(line)?;
        let mut series = PhaseSeries::new();
        for (node, (magnitude, _angle)) in nodes.iter().zip(phasors.iter()) {
            match table.letter(*node) {
                Some(letter) => {
                    series.insert(letter, *magnitude);
                }
                None if warn_unknown_nodes => {
                    diag.add_warning_with_entity(
                        "measurement",
                        &format!("node {} not found in the addressing table", node),
                        &format!("line {}", line),
                    );
                }
                None => {}
            }
        }
        currents.insert(line.clone(), series);
    }
    Ok(currents)
}
