//! Per-load hosting-capacity sweep.
//!
//! For each eligible load the engine walks a monotonically increasing
//! sequence of candidate power levels, re-solving at each step and
//! checking the configured limits. The search is a linear scan, not a
//! bisection: it stops at the first violating level in sweep order, so
//! the recorded capacity is only as tight as the step granularity.
//!
//! Non-convergence at a candidate level is recoverable: the solve is
//! retried (without changing the applied level) up to a bounded attempt
//! count, after which the candidate is abandoned, the sweep for that load
//! stops early and the last admissible level stands. Whatever happens,
//! the load's original setpoints are restored before the next load is
//! touched, so no perturbed state leaks across loads.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use hca_core::{ElementRef, FeederEngine, LimitKind, LimitSet};

use crate::circuit::FeederCircuit;
use crate::validate::{first_violated_limit, take_snapshot};

/// Load connection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connection {
    Wye,
    Delta,
}

impl Connection {
    fn matches_property(&self, raw: &str) -> bool {
        let trimmed = raw.trim();
        match self {
            Connection::Wye => trimmed.eq_ignore_ascii_case("wye"),
            Connection::Delta => trimmed.eq_ignore_ascii_case("delta"),
        }
    }
}

/// Eligibility filter for swept loads. Any unset dimension is a wildcard;
/// loads outside the filter are left untouched and excluded from the
/// result mapping entirely.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadFilter {
    /// Bus stem the load terminal must sit on
    pub bus: Option<String>,
    pub phases: Option<u32>,
    pub connection: Option<Connection>,
    pub model: Option<u32>,
    pub kv: Option<f64>,
}

impl LoadFilter {
    /// The classic sweep population: single-phase wye-connected loads.
    pub fn single_phase_wye() -> Self {
        Self {
            phases: Some(1),
            connection: Some(Connection::Wye),
            ..Self::default()
        }
    }

    fn matches<E: FeederEngine + ?Sized>(&self, engine: &E, load: &str) -> Result<bool> {
        let el = ElementRef::load(load);
        if let Some(bus) = &self.bus {
            let terminal = hca_core::engine::terminal_property(engine, &el, "bus1")?;
            if !terminal.bus().eq_ignore_ascii_case(bus) {
                return Ok(false);
            }
        }
        if let Some(phases) = self.phases {
            let raw = engine.get_property(&el, "phases")?;
            if raw.trim().parse::<u32>().unwrap_or(0) != phases {
                return Ok(false);
            }
        }
        if let Some(connection) = self.connection {
            let raw = engine.get_property(&el, "conn")?;
            if !connection.matches_property(&raw) {
                return Ok(false);
            }
        }
        if let Some(model) = self.model {
            let raw = engine.get_property(&el, "model")?;
            if raw.trim().parse::<u32>().unwrap_or(0) != model {
                return Ok(false);
            }
        }
        if let Some(kv) = self.kv {
            let raw = hca_core::engine::float_property(engine, &el, "kv")?;
            if (raw - kv).abs() > 1e-9 {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Sweep configuration.
#[derive(Debug, Clone, Serialize)]
pub struct SweepConfig {
    /// Injection negates the applied level's sign; consumption applies it
    /// as-is.
    pub injection: bool,
    /// Ordered, monotonically increasing candidate levels, in kW.
    pub levels_kw: Vec<f64>,
    pub limits: LimitSet,
    /// Bound on counted solve retries at a non-convergent candidate.
    pub max_recovery_attempts: usize,
    pub filter: LoadFilter,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            injection: true,
            levels_kw: default_levels_kw(),
            limits: LimitSet::default(),
            max_recovery_attempts: 100,
            filter: LoadFilter::single_phase_wye(),
        }
    }
}

/// Default candidate ladder: 0 kW to 100 MW in 2 kW steps.
pub fn default_levels_kw() -> Vec<f64> {
    (0..100_000).step_by(2).map(f64::from).collect()
}

/// Hosting-capacity result for one load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HcEntry {
    /// Last admissible power level, signed as applied (negative for
    /// injection).
    pub hc_kw: f64,
    /// Limit that stopped the sweep, or `None` when the candidate range
    /// was exhausted (or the load was abandoned) without violation.
    pub binding_limit: Option<LimitKind>,
}

impl HcEntry {
    /// Result-row name of the binding limit.
    pub fn limit_name(&self) -> &'static str {
        match self.binding_limit {
            Some(kind) => kind.as_str(),
            None => "None",
        }
    }
}

impl<E: FeederEngine> FeederCircuit<E> {
    /// Sweep every eligible load and return its hosting capacity.
    ///
    /// Failures are resolved as close to their origin as possible: a load
    /// that never reconverges is abandoned with its partial result kept,
    /// and the sweep moves on. An empty eligible set or an empty limit
    /// set yields an empty mapping with an informational diagnostic, not
    /// an error.
    pub fn hosting_capacity(&mut self, config: &SweepConfig) -> Result<BTreeMap<String, HcEntry>> {
        let mut results = BTreeMap::new();

        let mut eligible = Vec::new();
        for load in self.loads.clone() {
            if config.filter.matches(self.engine(), &load)? {
                eligible.push(load);
            }
        }
        if eligible.is_empty() {
            self.diagnostics_mut()
                .add_info("sweep", "there are no eligible loads in the network");
            return Ok(results);
        }
        if config.limits.is_empty() {
            self.diagnostics_mut()
                .add_info("sweep", "no limits configured; nothing to evaluate");
            return Ok(results);
        }

        for load in eligible {
            let entry = self.sweep_load(&load, config)?;
            results.insert(load, entry);
        }
        Ok(results)
    }

    /// Run the sweep state machine for one load.
    fn sweep_load(&mut self, load: &str, config: &SweepConfig) -> Result<HcEntry> {
        let el = ElementRef::load(load);

        // PRE: restore regulator taps and solve the baseline.
        self.reset_regulator_taps()?;
        self.engine_mut().solve()?;
        self.refresh_bus_order();

        // Original setpoints, kept in the engine's own text form so the
        // restoration writes back exactly what was read.
        let original_kw = self
            .engine()
            .get_property(&el, "kw")
            .with_context(|| format!("reading setpoints of load {}", load))?;
        let original_kvar = self.engine().get_property(&el, "kvar")?;

        let mut entry = HcEntry {
            hc_kw: 0.0,
            binding_limit: None,
        };

        'sweep: for &level in &config.levels_kw {
            let applied = if config.injection { -level } else { level };
            self.engine_mut()
                .set_property(&el, "kw", &applied.to_string())?;
            self.engine_mut().set_property(&el, "kvar", "0")?;

            let mut converged = self.engine_mut().solve()?;
            if !converged {
                warn!(
                    load,
                    kw = applied,
                    "no convergence; retrying to let the regulator taps move"
                );
                let mut attempts = 0usize;
                while !converged {
                    attempts += 1;
                    converged = self.engine_mut().solve()?;
                    if converged {
                        info!(load, kw = applied, attempts, "recovered convergence");
                        break;
                    }
                    if attempts >= config.max_recovery_attempts {
                        self.diagnostics_mut().add_warning_with_entity(
                            "sweep",
                            &format!(
                                "no convergence at {} kW after {} attempts; candidate abandoned",
                                applied, attempts
                            ),
                            &format!("load {}", load),
                        );
                        break 'sweep;
                    }
                }
            }

            // EVALUATE: the last admissible level stands until a limit
            // fires.
            let snapshot = {
                let buses = self.ordered_buses().to_vec();
                let table = self.node_table();
                take_snapshot(self.engine(), &buses, &table, self.has_neutral)?
            };
            match first_violated_limit(&snapshot, &config.limits) {
                Some(kind) => {
                    entry.binding_limit = Some(kind);
                    break 'sweep;
                }
                None => {
                    entry.hc_kw = applied;
                }
            }
        }

        // Restoration is unconditional, including after early
        // abandonment; perturbed setpoints must not leak into the next
        // load's sweep.
        self.engine_mut().set_property(&el, "kw", &original_kw)?;
        self.engine_mut().set_property(&el, "kvar", &original_kvar)?;

        info!(
            load,
            hc_kw = entry.hc_kw,
            limit = entry.limit_name(),
            "sweep finished"
        );
        Ok(entry)
    }
}
