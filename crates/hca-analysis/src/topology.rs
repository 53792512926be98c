//! Topology transformation: tie switch, neutral elimination, grounding.
//!
//! All three operations rewrite terminal addressing through the engine
//! handle. They are reversible in intent but not in implementation:
//! neutral elimination in particular is one-directional, and callers that
//! need the original topology must re-instantiate the circuit from source.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use hca_core::{engine::terminal_property, ElementRef, FeederEngine};

use crate::circuit::FeederCircuit;

/// Node indices appended to the tie line's first terminal when the switch
/// opens; distinct from the phase indices so the two sides land on
/// separate electrical nodes.
const OPEN_SWITCH_ISOLATED_NODES: [u32; 3] = [11, 12, 13];
const OPEN_SWITCH_PHASE_NODES: [u32; 3] = [1, 2, 3];

/// Grounding impedance, split into resistance and reactance parts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Impedance {
    pub resistance: f64,
    pub reactance: f64,
}

impl Impedance {
    pub fn new(resistance: f64, reactance: f64) -> Self {
        Self {
            resistance,
            reactance,
        }
    }
}

/// Fixed grounding points of the feeder: the substation bus whose neutral
/// is tied to earth, and the two equipotential neutral jumpers around the
/// regulator and the in-line transformer.
#[derive(Debug, Clone, Serialize)]
pub struct GroundingPlan {
    pub substation_bus: String,
    pub regulator_jumper: (String, String),
    pub transformer_jumper: (String, String),
}

impl Default for GroundingPlan {
    fn default() -> Self {
        Self {
            substation_bus: "650".to_string(),
            regulator_jumper: ("650".to_string(), "rg60".to_string()),
            transformer_jumper: ("633".to_string(), "634".to_string()),
        }
    }
}

impl<E: FeederEngine> FeederCircuit<E> {
    /// Open or close the designated tie line.
    ///
    /// Closing strips the explicit phase suffixes from both terminals,
    /// merging the two buses electrically; opening appends distinct node
    /// suffixes to each terminal, creating two separate electrical nodes.
    /// Idempotent: the current suffix presence is inspected first, so
    /// reapplying the same state never double-appends or double-strips.
    pub fn set_tie_switch(&mut self, open: bool) -> Result<()> {
        let el = ElementRef::line(self.tie_line());
        let bus1 = terminal_property(self.engine(), &el, "bus1")?;
        let bus2 = terminal_property(self.engine(), &el, "bus2")?;

        if bus1.has_explicit_nodes() {
            if !open {
                let stripped1 = bus1.stripped().to_string();
                let stripped2 = bus2.stripped().to_string();
                self.engine_mut().set_property(&el, "bus1", &stripped1)?;
                self.engine_mut().set_property(&el, "bus2", &stripped2)?;
                debug!(line = self.tie_line(), "tie switch closed");
            }
        } else if open {
            let mut opened1 = bus1.clone();
            for node in OPEN_SWITCH_ISOLATED_NODES {
                opened1 = opened1.with_appended(node);
            }
            let mut opened2 = bus2.clone();
            for node in OPEN_SWITCH_PHASE_NODES {
                opened2 = opened2.with_appended(node);
            }
            self.engine_mut()
                .set_property(&el, "bus1", &opened1.to_string())?;
            self.engine_mut()
                .set_property(&el, "bus2", &opened2.to_string())?;
            debug!(line = self.tie_line(), "tie switch opened");
        }
        Ok(())
    }

    /// Collapse the explicit neutral conductor onto the ground reference.
    ///
    /// Valid only when the neutral impedance is negligible. For every line
    /// whose first terminal ends in the neutral index, both terminals'
    /// trailing index is rewritten to ground; loads and two-winding
    /// transformer terminals ending in the neutral index drop it entirely.
    /// One-directional: no inverse is provided.
    pub fn kron_reduction(&mut self) -> Result<()> {
        let neutral = self.node_table().neutral;
        let ground = self.node_table().ground;
        self.has_neutral = false;

        for line in self.lines.clone() {
            let el = ElementRef::line(&line);
            let bus1 = terminal_property(self.engine(), &el, "bus1")?;
            if bus1.has_explicit_nodes() && bus1.trailing() == Some(neutral) {
                let bus2 = terminal_property(self.engine(), &el, "bus2")?;
                let grounded1 = bus1.with_trailing(ground).to_string();
                // A bare second terminal has no trailing index to rewrite;
                // the ground node is appended so both ends stay aligned.
                let grounded2 = if bus2.has_explicit_nodes() {
                    bus2.with_trailing(ground)
                } else {
                    bus2.with_appended(ground)
                }
                .to_string();
                self.engine_mut().set_property(&el, "bus1", &grounded1)?;
                self.engine_mut().set_property(&el, "bus2", &grounded2)?;
            }
        }

        for load in self.loads.clone() {
            let el = ElementRef::load(&load);
            let bus1 = terminal_property(self.engine(), &el, "bus1")?;
            match bus1.trailing() {
                Some(node) if node == neutral => {
                    let dropped = bus1.without_trailing().to_string();
                    self.engine_mut().set_property(&el, "bus1", &dropped)?;
                }
                Some(_) => {}
                None => {
                    // The source modeled this load without explicit
                    // terminal nodes; there is no neutral suffix to drop.
                    self.diagnostics_mut().add_warning_with_entity(
                        "topology",
                        "load has no explicit terminal nodes; neutral elimination skipped",
                        &format!("load {}", load),
                    );
                }
            }
        }

        for trafo in self.transformers.clone() {
            let el = ElementRef::transformer(&trafo);
            for property in ["bus1", "bus2"] {
                let terminal = terminal_property(self.engine(), &el, property)?;
                if terminal.trailing() == Some(neutral) {
                    let dropped = terminal.without_trailing().to_string();
                    self.engine_mut().set_property(&el, property, &dropped)?;
                }
            }
        }

        info!("neutral collapsed onto ground");
        Ok(())
    }

    /// Ground the explicit neutral: complete transformer neutral
    /// terminals, place the substation and jumper reactors, then one
    /// neutral-to-ground reactor at each line's receiving bus that
    /// exposes the neutral node.
    ///
    /// Returns the names of the per-line reactors created. A bus already
    /// present in the grounded set is skipped and reported as an
    /// informational no-op; grounding is added once per physical neutral
    /// point.
    pub fn add_grounding_reactors(
        &mut self,
        z_g: Impedance,
        plan: &GroundingPlan,
    ) -> Result<Vec<String>> {
        let neutral = self.node_table().neutral;
        let ground = self.node_table().ground;

        // Neutral exposure per receiving bus, captured before any reactor
        // is placed: the reactors' own terminals must not count as
        // exposure on a later line.
        let mut exposures: Vec<(String, bool)> = Vec::new();
        for line in self.lines.clone() {
            let el = ElementRef::line(&line);
            let stem = terminal_property(self.engine(), &el, "bus2")?
                .bus()
                .to_string();
            let exposed = self.engine().bus_nodes(&stem)?.contains(&neutral);
            exposures.push((stem, exposed));
        }

        // Two-winding transformers: ensure both terminals name the neutral.
        for trafo in self.transformers.clone() {
            let el = ElementRef::transformer(&trafo);
            for property in ["bus1", "bus2"] {
                let terminal = terminal_property(self.engine(), &el, property)?;
                let completed = if terminal.has_explicit_nodes() {
                    if terminal.trailing() == Some(neutral) {
                        continue;
                    }
                    terminal.with_appended(neutral)
                } else {
                    terminal.with_nodes([1, 2, 3, neutral])
                };
                self.engine_mut()
                    .set_property(&el, property, &completed.to_string())?;
            }
        }

        // Substation neutral to earth, with the caller-supplied impedance.
        let sub = plan.substation_bus.clone();
        if self.grounded_buses.insert(sub.clone()) {
            self.engine_mut().command(&format!(
                "new reactor.bus{sub} phases=1 bus1={sub}.{neutral} bus2={sub}.{ground} r={} x={}",
                z_g.resistance, z_g.reactance
            ))?;
        }

        // Near-zero bonding jumpers: equipotential neutral, no series
        // impedance worth modeling.
        if !self.reactors.iter().any(|name| name == "jumperreg") {
            let (reg_a, reg_b) = &plan.regulator_jumper;
            self.engine_mut().command(&format!(
                "new reactor.jumperreg phases=1 bus1={reg_a}.{neutral} bus2={reg_b}.{neutral} r=0.00001 x=0"
            ))?;
            let (xfm_a, xfm_b) = &plan.transformer_jumper;
            self.engine_mut().command(&format!(
                "new reactor.jumperxfm phases=1 bus1={xfm_a}.{neutral} bus2={xfm_b}.{neutral} r=0.00001 x=0"
            ))?;
        }

        // One reactor per receiving bus that exposes the neutral node.
        let mut created = Vec::new();
        for (stem, exposed) in exposures {
            if !exposed {
                continue;
            }
            if self.grounded_buses.insert(stem.clone()) {
                let name = format!("bus{stem}");
                self.engine_mut().command(&format!(
                    "new reactor.{name} phases=1 bus1={stem}.{neutral} bus2={stem}.{ground} r={} x={}",
                    z_g.resistance, z_g.reactance
                ))?;
                created.push(name);
            } else {
                info!(bus = %stem, "reactor already in the network");
                self.diagnostics_mut().add_info_with_entity(
                    "topology",
                    "reactor already in the network",
                    &format!("bus {}", stem),
                );
            }
        }

        self.refresh_element_names();
        if created.is_empty() {
            self.diagnostics_mut().add_info(
                "topology",
                "no line reactors were added; check the line buses for a neutral wire",
            );
        }
        Ok(created)
    }

    /// Place a disabled single-phase PV system at the terminal of every
    /// single-phase wye-connected load, skipping loads that already carry
    /// one. Returns the names of the PV systems created.
    pub fn add_single_phase_pv_systems(&mut self) -> Result<Vec<String>> {
        let mut created = Vec::new();
        for load in self.loads.clone() {
            let pv_name = format!("pv_{load}");
            if self.pv_systems.contains(&pv_name) {
                info!(pv = %pv_name, "pv system already in the network");
                self.diagnostics_mut().add_info_with_entity(
                    "topology",
                    "pv system already in the network",
                    &format!("pvsystem {}", pv_name),
                );
                continue;
            }

            let el = ElementRef::load(&load);
            let phases = self.engine().get_property(&el, "phases")?;
            let connection = self.engine().get_property(&el, "conn")?;
            if phases.trim() != "1" || !connection.trim().eq_ignore_ascii_case("wye") {
                continue;
            }
            let kv = self.engine().get_property(&el, "kv")?;
            let bus1 = self.engine().get_property(&el, "bus1")?;
            self.engine_mut().command(&format!(
                "new pvsystem.{pv_name} phases=1 irradiance=1 %cutin=0.05 %cutout=0.05 \
                 vmaxpu=1.5 vminpu=0.5 kva=0 pmpp=0 bus1={bus1} pf=1 enabled=false kv={kv}"
            ))?;
            created.push(pv_name);
        }

        self.refresh_element_names();
        if created.is_empty() && self.pv_systems.is_empty() {
            self.diagnostics_mut().add_info(
                "topology",
                "no pv systems were added; check for single-phase wye-connected loads",
            );
        }
        Ok(created)
    }
}
