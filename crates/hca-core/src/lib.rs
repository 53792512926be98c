//! # hca-core: Feeder Hosting-Capacity Core
//!
//! Foundational types for hosting-capacity analysis of radial distribution
//! feeders. This crate knows nothing about any concrete power-flow solver;
//! it defines the addressing algebra, the limit model, and the engine seam
//! that the analysis crates drive.
//!
//! ## Design Philosophy
//!
//! The feeder itself is owned by an external steady-state solver. Every
//! component in this workspace talks to it through the [`FeederEngine`]
//! trait: a command channel for textual element directives plus a query
//! surface for voltages, currents and element properties. The handle is
//! created once per analyzed circuit and passed by reference into each
//! component; there is no process-wide solver state.
//!
//! Terminal addressing, the `"634.1.2.3.4"` bus-plus-node-indices strings
//! the solver speaks, is modeled as the structured [`TerminalAddress`]
//! type. Parsing and formatting happen only at the engine boundary;
//! internal logic never re-splits its own output.
//!
//! ## Modules
//!
//! - [`error`] - Structured failure categories
//! - [`diagnostics`] - Non-fatal warning/info collection
//! - [`node`] - Node addressing table and canonical bus ordering
//! - [`terminal`] - Structured terminal addresses
//! - [`limits`] - Operating-limit model for sweep stopping criteria
//! - [`engine`] - The external solver seam

pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod limits;
pub mod node;
pub mod terminal;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use engine::{ElementClass, ElementRef, FeederEngine};
pub use error::HcaError;
pub use limits::{LimitKind, LimitSet};
pub use node::{BusOrder, NodeTable};
pub use terminal::TerminalAddress;
