//! # hca-analysis: Feeder Topology and Hosting-Capacity Applications
//!
//! The analysis layer over [`hca_core::FeederEngine`]: a per-circuit
//! session ([`FeederCircuit`]), reversible-in-intent topology rewrites
//! (tie switch, neutral elimination, grounding reactors), read-only
//! measurement extraction, limit validation and the per-load
//! hosting-capacity sweep.
//!
//! Everything here is single-threaded and strictly sequential: each solve
//! depends on the network state left by the previous one (regulator taps,
//! topology), so there is no parallelism across loads or candidate power
//! levels.

pub mod circuit;
pub mod hostcap;
pub mod measure;
pub mod testing;
pub mod topology;
pub mod validate;

pub use circuit::{CircuitOptions, FeederCircuit};
pub use hostcap::{Connection, HcEntry, LoadFilter, SweepConfig};
pub use topology::{GroundingPlan, Impedance};
pub use validate::{first_violated_limit, MeasurementSnapshot};
