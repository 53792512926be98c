//! Limit validation for a solved operating point.
//!
//! The validator works on a [`MeasurementSnapshot`]: per-phase-letter
//! voltage series across the assessed buses plus the unbalance map. The
//! snapshot is shaped so that non-comparable residual quantities never
//! reach the wrong check: the neutral magnitude is not a phase voltage,
//! so it is excluded from the per-unit band check, and the phase letters
//! are excluded from the neutral-to-earth check.

use std::collections::BTreeMap;

use anyhow::Result;

use hca_core::{Diagnostics, FeederEngine, LimitKind, LimitSet, NodeTable};

use crate::measure::{bus_voltage_magnitudes, voltage_unbalance};

/// Everything the limit validator needs about one operating point.
#[derive(Debug, Clone, Default)]
pub struct MeasurementSnapshot {
    /// Per-unit phase voltages, keyed by phase letter, across the
    /// assessed buses. Zero magnitudes (de-energized nodes) are omitted.
    pub phase_voltages_pu: BTreeMap<char, Vec<f64>>,
    /// Absolute neutral-to-earth voltage magnitudes across the assessed
    /// buses, in volts.
    pub neutral_voltages: Vec<f64>,
    /// Voltage unbalance factor per three-phase bus, in percent.
    pub vuf_percent: BTreeMap<String, f64>,
}

/// Assemble a snapshot from the solved network.
///
/// `has_neutral` selects the expected-phase count for the unbalance
/// computation: 3 when a neutral conductor is modeled, 2 otherwise.
pub fn take_snapshot<E: FeederEngine + ?Sized>(
    engine: &E,
    buses: &[String],
    table: &NodeTable,
    has_neutral: bool,
) -> Result<MeasurementSnapshot> {
    // Warnings about unknown node indices are suppressed here; the sweep
    // reads the same buses thousands of times.
    let mut quiet = Diagnostics::new();
    let pu = bus_voltage_magnitudes(engine, buses, table, true, false, &mut quiet)?;
    let absolute = bus_voltage_magnitudes(engine, buses, table, false, false, &mut quiet)?;
    let expected_phases = if has_neutral { 3 } else { 2 };
    let vuf_percent = voltage_unbalance(engine, buses, expected_phases)?;

    let mut snapshot = MeasurementSnapshot {
        vuf_percent,
        ..Default::default()
    };
    for bus in buses {
        if let Some(series) = pu.get(bus) {
            for (letter, magnitude) in series {
                if *letter != 'n' && *magnitude != 0.0 {
                    snapshot
                        .phase_voltages_pu
                        .entry(*letter)
                        .or_default()
                        .push(*magnitude);
                }
            }
        }
        if let Some(series) = absolute.get(bus) {
            if let Some(nev) = series.get(&'n') {
                snapshot.neutral_voltages.push(*nev);
            }
        }
    }
    Ok(snapshot)
}

/// Evaluate the limit set against a snapshot, in fixed priority order:
/// voltage band, then neutral-to-earth voltage, then unbalance. The first
/// triggered limit is returned and lower-priority limits are not
/// evaluated. Unset limits are always skipped.
pub fn first_violated_limit(snapshot: &MeasurementSnapshot, limits: &LimitSet) -> Option<LimitKind> {
    if let Some((min_pu, max_pu)) = limits.voltage_band_pu {
        let out_of_band = snapshot
            .phase_voltages_pu
            .values()
            .flatten()
            .any(|v| *v < min_pu || *v > max_pu);
        if out_of_band {
            return Some(LimitKind::Voltage);
        }
    }

    if let Some(cap) = limits.nev_volts {
        if snapshot.neutral_voltages.iter().any(|v| *v > cap) {
            return Some(LimitKind::NeutralToEarth);
        }
    }

    if let Some(cap) = limits.vuf_percent {
        if snapshot.vuf_percent.values().any(|v| *v > cap) {
            return Some(LimitKind::Unbalance);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(phase_pu: &[f64], nev: &[f64], vuf: &[(&str, f64)]) -> MeasurementSnapshot {
        let mut snap = MeasurementSnapshot::default();
        snap.phase_voltages_pu.insert('a', phase_pu.to_vec());
        snap.neutral_voltages = nev.to_vec();
        snap.vuf_percent = vuf
            .iter()
            .map(|(bus, value)| (bus.to_string(), *value))
            .collect();
        snap
    }

    #[test]
    fn voltage_limit_shadows_lower_priority_limits() {
        // Every limit is exceeded; only the voltage band may be reported.
        let snap = snapshot(&[1.10], &[99.0], &[("632", 9.0)]);
        let limits = LimitSet::default()
            .with_voltage_band(0.95, 1.05)
            .with_nev_cap(10.0)
            .with_vuf_cap(2.0);
        assert_eq!(first_violated_limit(&snap, &limits), Some(LimitKind::Voltage));
    }

    #[test]
    fn nev_fires_before_vuf() {
        let snap = snapshot(&[1.0], &[99.0], &[("632", 9.0)]);
        let limits = LimitSet::default().with_nev_cap(10.0).with_vuf_cap(2.0);
        assert_eq!(
            first_violated_limit(&snap, &limits),
            Some(LimitKind::NeutralToEarth)
        );
    }

    #[test]
    fn unset_limits_are_skipped() {
        // The voltage excursion is ignored because no band is configured.
        let snap = snapshot(&[1.50], &[0.1], &[("632", 9.0)]);
        let limits = LimitSet::default().with_vuf_cap(2.0);
        assert_eq!(
            first_violated_limit(&snap, &limits),
            Some(LimitKind::Unbalance)
        );
    }

    #[test]
    fn admissible_point_reports_nothing() {
        let snap = snapshot(&[1.0, 0.98], &[1.2], &[("632", 0.5)]);
        let limits = LimitSet::default()
            .with_voltage_band(0.95, 1.05)
            .with_nev_cap(10.0)
            .with_vuf_cap(2.0);
        assert_eq!(first_violated_limit(&snap, &limits), None);
    }
}
