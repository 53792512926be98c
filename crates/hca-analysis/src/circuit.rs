//! Per-circuit analysis session.
//!
//! A [`FeederCircuit`] is created once per analyzed circuit. It owns the
//! engine handle, compiles the circuit source, applies the requested
//! tie-switch state, and caches element name lists for the topology and
//! sweep operations. Bus identities are re-read from the solved network
//! whenever they are needed; they are never cached across topology
//! mutations.

use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use hca_core::{
    engine::terminal_property, BusOrder, Diagnostics, ElementClass, ElementRef, FeederEngine,
    NodeTable,
};

/// Construction contract for a feeder analysis session.
#[derive(Debug, Clone)]
pub struct CircuitOptions {
    /// Circuit source compiled into the engine at construction, if any.
    pub source: Option<String>,
    /// Earth model directive forwarded to the engine (e.g. "carson").
    pub earth_model: Option<String>,
    /// Requested tie-switch state applied at construction.
    pub open_switch: bool,
    /// Name of the designated tie line.
    pub tie_line: String,
    /// Whether the compiled circuit models an explicit neutral conductor.
    pub has_neutral: bool,
    /// Phase/neutral/ground node index assignment.
    pub nodes: NodeTable,
    /// Canonical bus ordering for reports and limit snapshots.
    pub bus_order: BusOrder,
}

impl Default for CircuitOptions {
    fn default() -> Self {
        Self {
            source: None,
            earth_model: None,
            open_switch: false,
            tie_line: "671692".to_string(),
            has_neutral: false,
            nodes: NodeTable::default(),
            bus_order: BusOrder::ieee13(),
        }
    }
}

/// One feeder circuit bound to one engine handle.
pub struct FeederCircuit<E: FeederEngine> {
    engine: E,
    nodes: NodeTable,
    bus_order: BusOrder,
    tie_line: String,
    pub(crate) has_neutral: bool,
    /// Buses that already carry a neutral-to-ground reactor, tracked
    /// across topology operations instead of re-derived from names.
    pub(crate) grounded_buses: HashSet<String>,
    pub(crate) lines: Vec<String>,
    pub(crate) transformers: Vec<String>,
    pub(crate) loads: Vec<String>,
    pub(crate) reactors: Vec<String>,
    pub(crate) pv_systems: Vec<String>,
    pub(crate) reg_controls: Vec<String>,
    ordered_buses: Vec<String>,
    diagnostics: Diagnostics,
}

impl<E: FeederEngine> FeederCircuit<E> {
    /// Compile the circuit, apply the requested switch state and cache
    /// element names.
    pub fn new(mut engine: E, options: CircuitOptions) -> Result<Self> {
        if let Some(source) = &options.source {
            engine
                .command(&format!("compile {}", source))
                .with_context(|| format!("compiling circuit '{}'", source))?;
        }
        if let Some(model) = &options.earth_model {
            engine.command(&format!("set earthmodel={}", model))?;
        }

        let mut circuit = Self {
            engine,
            nodes: options.nodes,
            bus_order: options.bus_order,
            tie_line: options.tie_line.to_ascii_lowercase(),
            has_neutral: options.has_neutral,
            grounded_buses: HashSet::new(),
            lines: Vec::new(),
            transformers: Vec::new(),
            loads: Vec::new(),
            reactors: Vec::new(),
            pv_systems: Vec::new(),
            reg_controls: Vec::new(),
            ordered_buses: Vec::new(),
            diagnostics: Diagnostics::new(),
        };

        circuit.set_tie_switch(options.open_switch)?;
        circuit.refresh_element_names();
        circuit.seed_grounded_buses()?;
        circuit.engine.command("calcv")?;

        info!(
            lines = circuit.lines.len(),
            transformers = circuit.transformers.len(),
            loads = circuit.loads.len(),
            "feeder session ready"
        );
        Ok(circuit)
    }

    /// Re-read element name lists from the engine.
    pub fn refresh_element_names(&mut self) {
        self.lines = self.engine.element_names(ElementClass::Line);
        self.transformers = self.engine.element_names(ElementClass::Transformer);
        self.loads = self.engine.element_names(ElementClass::Load);
        self.reactors = self.engine.element_names(ElementClass::Reactor);
        self.pv_systems = self.engine.element_names(ElementClass::PvSystem);
        self.reg_controls = self.engine.element_names(ElementClass::RegControl);
    }

    /// Record which buses already carry a neutral-to-ground reactor, from
    /// the first terminals of reactors present in the compiled circuit.
    fn seed_grounded_buses(&mut self) -> Result<()> {
        for reactor in self.reactors.clone() {
            let el = ElementRef::new(ElementClass::Reactor, &reactor);
            let bus1 = terminal_property(&self.engine, &el, "bus1")?;
            self.grounded_buses.insert(bus1.bus().to_string());
        }
        Ok(())
    }

    /// Solve the power flow. On convergence the canonical bus order is
    /// refreshed from the solved network.
    pub fn run_power_flow(&mut self) -> Result<bool> {
        let converged = self.engine.solve()?;
        if converged {
            debug!("power flow converged");
            self.refresh_bus_order();
        } else {
            warn!("power flow did not converge");
        }
        Ok(converged)
    }

    pub(crate) fn refresh_bus_order(&mut self) {
        let names = self.engine.bus_names();
        self.ordered_buses = self.bus_order.ordered(&names, &mut self.diagnostics);
    }

    /// Reset every regulator control to tap position zero.
    pub fn reset_regulator_taps(&mut self) -> Result<()> {
        for reg in self.reg_controls.clone() {
            let el = ElementRef::reg_control(&reg);
            self.engine.set_property(&el, "tapnum", "0")?;
        }
        Ok(())
    }

    /// Total feeder losses, in kW.
    pub fn losses_kw(&self) -> f64 {
        self.engine.losses_kw()
    }

    /// Buses of the last converged solution, in canonical order.
    pub fn ordered_buses(&self) -> &[String] {
        &self.ordered_buses
    }

    pub fn has_neutral(&self) -> bool {
        self.has_neutral
    }

    pub fn node_table(&self) -> NodeTable {
        self.nodes
    }

    pub fn tie_line(&self) -> &str {
        &self.tie_line
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn loads(&self) -> &[String] {
        &self.loads
    }

    pub fn reactors(&self) -> &[String] {
        &self.reactors
    }

    pub fn pv_systems(&self) -> &[String] {
        &self.pv_systems
    }

    /// Issues collected across this session's operations.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub(crate) fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub(crate) fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}
