//! The external solver seam.
//!
//! The power-flow mathematics lives in an external steady-state solver.
//! This module defines the narrow surface the analysis components consume:
//! a textual command channel for element creation/mutation, a solve
//! operation reporting convergence, and read-only queries for bus node
//! indices, voltage phasors, sequence voltages, line currents and element
//! properties.
//!
//! One engine handle is created per analyzed circuit and passed by
//! reference into each component. The handle is the sole writer of the
//! shared network model besides the solver itself, so calls are strictly
//! sequential; nothing here is `Send`-aware by design.

use anyhow::{Context, Result};

use crate::terminal::TerminalAddress;

/// Circuit element categories the engine can enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementClass {
    Line,
    Transformer,
    Load,
    Reactor,
    PvSystem,
    RegControl,
}

impl ElementClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementClass::Line => "line",
            ElementClass::Transformer => "transformer",
            ElementClass::Load => "load",
            ElementClass::Reactor => "reactor",
            ElementClass::PvSystem => "pvsystem",
            ElementClass::RegControl => "regcontrol",
        }
    }
}

impl std::fmt::Display for ElementClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully qualified element reference, e.g. `line.671692`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub class: ElementClass,
    pub name: String,
}

impl ElementRef {
    pub fn new(class: ElementClass, name: impl Into<String>) -> Self {
        Self {
            class,
            name: name.into().to_ascii_lowercase(),
        }
    }

    pub fn line(name: impl Into<String>) -> Self {
        Self::new(ElementClass::Line, name)
    }

    pub fn transformer(name: impl Into<String>) -> Self {
        Self::new(ElementClass::Transformer, name)
    }

    pub fn load(name: impl Into<String>) -> Self {
        Self::new(ElementClass::Load, name)
    }

    pub fn reg_control(name: impl Into<String>) -> Self {
        Self::new(ElementClass::RegControl, name)
    }
}

impl std::fmt::Display for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.class, self.name)
    }
}

/// Handle to the external steady-state feeder solver.
///
/// All mutation goes through [`command`](FeederEngine::command) or
/// [`set_property`](FeederEngine::set_property); all reads reflect the
/// network's current solved state. Voltage and current queries are only
/// meaningful after a successful [`solve`](FeederEngine::solve); the
/// caller is responsible for re-solving before reading.
pub trait FeederEngine {
    /// Submit a textual directive (element creation, compile, settings).
    fn command(&mut self, directive: &str) -> Result<()>;

    /// Run a steady-state solve; returns whether the solution converged.
    fn solve(&mut self) -> Result<bool>;

    /// All bus names known to the solved circuit, in solver order.
    fn bus_names(&self) -> Vec<String>;

    /// Energized node indices at a bus, in terminal order.
    fn bus_nodes(&self, bus: &str) -> Result<Vec<u32>>;

    /// Voltage (magnitude, angle-degrees) pairs for a bus, one per
    /// energized node, aligned with [`bus_nodes`](FeederEngine::bus_nodes).
    /// Magnitudes are per-unit when `per_unit` is set, volts otherwise.
    fn bus_voltage_phasors(&self, bus: &str, per_unit: bool) -> Result<Vec<(f64, f64)>>;

    /// Sequence voltage magnitudes (zero, positive, negative) at a bus,
    /// in volts.
    fn bus_sequence_voltages(&self, bus: &str) -> Result<[f64; 3]>;

    /// Element names for a category, in solver order.
    fn element_names(&self, class: ElementClass) -> Vec<String>;

    /// Read a named property of an element, as the solver's text form.
    fn get_property(&self, element: &ElementRef, property: &str) -> Result<String>;

    /// Write a named property of an element.
    fn set_property(&mut self, element: &ElementRef, property: &str, value: &str) -> Result<()>;

    /// Current (magnitude, angle-degrees) pairs at a line's first
    /// terminal, one per conductor in terminal order.
    fn line_current_phasors(&self, line: &str) -> Result<Vec<(f64, f64)>>;

    /// Total circuit losses, in kW.
    fn losses_kw(&self) -> f64;
}

/// Read an element property and parse it as a terminal address.
pub fn terminal_property<E: FeederEngine + ?Sized>(
    engine: &E,
    element: &ElementRef,
    property: &str,
) -> Result<TerminalAddress> {
    let raw = engine.get_property(element, property)?;
    raw.parse::<TerminalAddress>()
        .with_context(|| format!("parsing {} of {}", property, element))
}

/// Read an element property and parse it as a float.
pub fn float_property<E: FeederEngine + ?Sized>(
    engine: &E,
    element: &ElementRef,
    property: &str,
) -> Result<f64> {
    let raw = engine.get_property(element, property)?;
    raw.trim()
        .parse::<f64>()
        .with_context(|| format!("parsing {} of {} from '{}'", property, element, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_refs_format_like_solver_directives() {
        assert_eq!(ElementRef::line("671692").to_string(), "line.671692");
        assert_eq!(
            ElementRef::new(ElementClass::Reactor, "Bus675").to_string(),
            "reactor.bus675"
        );
        assert_eq!(ElementRef::reg_control("Reg1").name, "reg1");
    }
}
