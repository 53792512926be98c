//! Scripted in-memory engine.
//!
//! [`ScriptedFeeder`] stands in for the external solver in tests and in
//! the bundled demo: it stores elements as property maps, derives bus
//! node sets from the terminals that reference them, and produces
//! voltages from a small linear response model instead of a power flow.
//! The response is deliberately crude; what matters is that it is
//! deterministic, monotone in the setpoint deviation, and tunable per
//! test.

use std::collections::BTreeMap;

use anyhow::Result;

use hca_core::{ElementClass, ElementRef, FeederEngine, HcaError, TerminalAddress};

type Props = BTreeMap<String, String>;

/// Linear voltage response to the total setpoint deviation.
///
/// The operating point is driven by the signed excess: the sum over all
/// loads of the current kW setpoint minus the setpoint the load was
/// created with. Positive excess (added consumption) sags the phase
/// voltages, negative excess (injection) lifts them; the neutral-to-earth
/// voltage and the unbalance grow with the excess magnitude. With the
/// per-kW slopes at their zero defaults the operating point never moves,
/// which is the right baseline for topology-only tests.
#[derive(Debug, Clone, Copy)]
pub struct VoltageResponse {
    pub base_pu: f64,
    pub sag_pu_per_kw: f64,
    pub rise_pu_per_kw: f64,
    pub base_nev_volts: f64,
    pub nev_volts_per_kw: f64,
    pub base_vuf_percent: f64,
    pub vuf_percent_per_kw: f64,
}

impl Default for VoltageResponse {
    fn default() -> Self {
        Self {
            base_pu: 1.0,
            sag_pu_per_kw: 0.0,
            rise_pu_per_kw: 0.0,
            base_nev_volts: 1.0,
            nev_volts_per_kw: 0.0,
            base_vuf_percent: 0.5,
            vuf_percent_per_kw: 0.0,
        }
    }
}

/// In-memory feeder model with scripted solve behavior.
pub struct ScriptedFeeder {
    elements: BTreeMap<ElementClass, Vec<(String, Props)>>,
    /// Setpoint each load was created with, in kW.
    nominal_kw: BTreeMap<String, f64>,
    base_volts: f64,
    pub response: VoltageResponse,
    /// Excess-magnitude threshold, in kW, above which the solve reports
    /// non-convergence, if set.
    pub diverge_above_kw: Option<f64>,
    /// How many failed solves a divergent point takes before it
    /// reconverges; `u32::MAX` means it never does.
    pub recover_after_attempts: u32,
    failed_attempts: u32,
    pub command_log: Vec<String>,
}

impl ScriptedFeeder {
    pub fn new() -> Self {
        Self {
            elements: BTreeMap::new(),
            nominal_kw: BTreeMap::new(),
            base_volts: 2401.78,
            response: VoltageResponse::default(),
            diverge_above_kw: None,
            recover_after_attempts: 0,
            failed_attempts: 0,
            command_log: Vec::new(),
        }
    }

    /// The 13-bus test feeder, with or without an explicit neutral
    /// conductor on its terminals.
    pub fn ieee13(has_neutral: bool) -> Self {
        let mut feeder = Self::new();
        // Appends the neutral index to an explicit node list.
        let t = |stem: &str, nodes: &str| {
            if has_neutral {
                format!("{stem}.{nodes}.4")
            } else {
                format!("{stem}.{nodes}")
            }
        };

        feeder.add(
            ElementClass::Transformer,
            "sub",
            &[("bus1", "sourcebus".to_string()), ("bus2", t("650", "1.2.3"))],
        );
        feeder.add(
            ElementClass::Transformer,
            "xfm1",
            &[("bus1", t("633", "1.2.3")), ("bus2", t("634", "1.2.3"))],
        );

        let three_phase_lines = [
            ("650632", "rg60", "632"),
            ("632670", "632", "670"),
            ("670671", "670", "671"),
            ("671680", "671", "680"),
            ("632633", "632", "633"),
            ("692675", "692", "675"),
        ];
        for (name, from, to) in three_phase_lines {
            feeder.add(
                ElementClass::Line,
                name,
                &[("bus1", t(from, "1.2.3")), ("bus2", t(to, "1.2.3"))],
            );
        }
        feeder.add(
            ElementClass::Line,
            "632645",
            &[("bus1", t("632", "3.2")), ("bus2", t("645", "3.2"))],
        );
        feeder.add(
            ElementClass::Line,
            "645646",
            &[("bus1", t("645", "3.2")), ("bus2", t("646", "3.2"))],
        );
        feeder.add(
            ElementClass::Line,
            "671684",
            &[("bus1", t("671", "1.3")), ("bus2", t("684", "1.3"))],
        );
        feeder.add(
            ElementClass::Line,
            "684611",
            &[("bus1", t("684", "3")), ("bus2", t("611", "3"))],
        );
        feeder.add(
            ElementClass::Line,
            "684652",
            &[("bus1", t("684", "1")), ("bus2", t("652", "1"))],
        );
        // Tie switch, closed: bare terminals merge the two buses.
        feeder.add(
            ElementClass::Line,
            "671692",
            &[("bus1", "671".to_string()), ("bus2", "692".to_string())],
        );

        let wye_loads: [(&str, String, &str, &str, &str); 11] = [
            ("634a", t("634", "1"), "0.277", "160", "110"),
            ("634b", t("634", "2"), "0.277", "120", "90"),
            ("634c", t("634", "3"), "0.277", "120", "90"),
            ("645", t("645", "2"), "2.4", "170", "125"),
            ("675a", t("675", "1"), "2.4", "485", "190"),
            ("675b", t("675", "2"), "2.4", "68", "60"),
            ("675c", t("675", "3"), "2.4", "290", "212"),
            ("611", t("611", "3"), "2.4", "170", "80"),
            ("652", t("652", "1"), "2.4", "128", "86"),
            ("670a", t("670", "1"), "2.4", "17", "10"),
            ("670b", t("670", "2"), "2.4", "66", "38"),
        ];
        for (name, bus1, kv, kw, kvar) in wye_loads {
            feeder.add(
                ElementClass::Load,
                name,
                &[
                    ("bus1", bus1),
                    ("phases", "1".to_string()),
                    ("conn", "wye".to_string()),
                    ("model", "1".to_string()),
                    ("kv", kv.to_string()),
                    ("kw", kw.to_string()),
                    ("kvar", kvar.to_string()),
                ],
            );
        }
        feeder.add(
            ElementClass::Load,
            "671",
            &[
                ("bus1", "671.1.2.3".to_string()),
                ("phases", "3".to_string()),
                ("conn", "delta".to_string()),
                ("model", "1".to_string()),
                ("kv", "4.16".to_string()),
                ("kw", "1155".to_string()),
                ("kvar", "660".to_string()),
            ],
        );
        feeder.add(
            ElementClass::Load,
            "646",
            &[
                ("bus1", "646.2.3".to_string()),
                ("phases", "2".to_string()),
                ("conn", "delta".to_string()),
                ("model", "2".to_string()),
                ("kv", "4.16".to_string()),
                ("kw", "230".to_string()),
                ("kvar", "132".to_string()),
            ],
        );
        feeder.add(
            ElementClass::Load,
            "692",
            &[
                ("bus1", "692.3.2".to_string()),
                ("phases", "1".to_string()),
                ("conn", "delta".to_string()),
                ("model", "5".to_string()),
                ("kv", "4.16".to_string()),
                ("kw", "170".to_string()),
                ("kvar", "151".to_string()),
            ],
        );

        for (name, tap) in [("reg1", "9"), ("reg2", "6"), ("reg3", "9")] {
            feeder.add(
                ElementClass::RegControl,
                name,
                &[("transformer", name.to_string()), ("tapnum", tap.to_string())],
            );
        }

        feeder
    }

    fn add(&mut self, class: ElementClass, name: &str, props: &[(&str, String)]) {
        let name = name.to_ascii_lowercase();
        let props: Props = props
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_ascii_lowercase()))
            .collect();
        if class == ElementClass::Load {
            let nominal = props
                .get("kw")
                .and_then(|raw| raw.parse::<f64>().ok())
                .unwrap_or(0.0);
            self.nominal_kw.insert(name.clone(), nominal);
        }
        self.elements.entry(class).or_default().push((name, props));
    }

    fn find(&self, element: &ElementRef) -> Result<&Props> {
        self.elements
            .get(&element.class)
            .and_then(|list| list.iter().find(|(name, _)| *name == element.name))
            .map(|(_, props)| props)
            .ok_or_else(|| HcaError::Engine(format!("element {} not found", element)).into())
    }

    fn find_mut(&mut self, element: &ElementRef) -> Result<&mut Props> {
        self.elements
            .get_mut(&element.class)
            .and_then(|list| list.iter_mut().find(|(name, _)| *name == element.name))
            .map(|(_, props)| props)
            .ok_or_else(|| HcaError::Engine(format!("element {} not found", element)).into())
    }

    /// Every terminal address in the model, in element insertion order.
    fn terminals(&self) -> Vec<TerminalAddress> {
        let mut terminals = Vec::new();
        for list in self.elements.values() {
            for (_, props) in list {
                for property in ["bus1", "bus2"] {
                    if let Some(raw) = props.get(property) {
                        if let Ok(terminal) = raw.parse::<TerminalAddress>() {
                            terminals.push(terminal);
                        }
                    }
                }
            }
        }
        terminals
    }

    /// Signed total setpoint deviation from nominal, in kW.
    fn excess_kw(&self) -> f64 {
        let Some(loads) = self.elements.get(&ElementClass::Load) else {
            return 0.0;
        };
        loads
            .iter()
            .map(|(name, props)| {
                let kw = props
                    .get("kw")
                    .and_then(|raw| raw.parse::<f64>().ok())
                    .unwrap_or(0.0);
                kw - self.nominal_kw.get(name).copied().unwrap_or(0.0)
            })
            .sum()
    }

    fn phase_pu(&self) -> f64 {
        let excess = self.excess_kw();
        self.response.base_pu + self.response.rise_pu_per_kw * (-excess).max(0.0)
            - self.response.sag_pu_per_kw * excess.max(0.0)
    }

    fn nev_volts(&self) -> f64 {
        self.response.base_nev_volts + self.response.nev_volts_per_kw * self.excess_kw().abs()
    }

    fn vuf_percent(&self) -> f64 {
        self.response.base_vuf_percent + self.response.vuf_percent_per_kw * self.excess_kw().abs()
    }

    fn node_phasor(&self, node: u32) -> (f64, f64) {
        let angle = match node {
            1 => 0.0,
            2 => -120.0,
            3 => 120.0,
            _ => 0.0,
        };
        if node == 4 {
            (self.nev_volts(), angle)
        } else {
            (self.phase_pu() * self.base_volts, angle)
        }
    }
}

impl Default for ScriptedFeeder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeederEngine for ScriptedFeeder {
    /// Understands `new <class>.<name> key=value ...`; every other
    /// directive is accepted and logged.
    fn command(&mut self, directive: &str) -> Result<()> {
        self.command_log.push(directive.to_string());
        let mut tokens = directive.split_whitespace();
        let Some(verb) = tokens.next() else {
            return Err(HcaError::Engine("empty directive".into()).into());
        };
        if !verb.eq_ignore_ascii_case("new") {
            return Ok(());
        }

        let Some(qualified) = tokens.next() else {
            return Err(HcaError::Engine(format!("malformed directive '{}'", directive)).into());
        };
        let (class_name, name) = qualified.split_once('.').ok_or_else(|| {
            HcaError::Engine(format!("malformed element reference '{}'", qualified))
        })?;
        let class = match class_name.to_ascii_lowercase().as_str() {
            "line" => ElementClass::Line,
            "transformer" => ElementClass::Transformer,
            "load" => ElementClass::Load,
            "reactor" => ElementClass::Reactor,
            "pvsystem" => ElementClass::PvSystem,
            "regcontrol" => ElementClass::RegControl,
            other => {
                return Err(HcaError::Engine(format!("unknown element class '{}'", other)).into())
            }
        };
        let props: Vec<(&str, String)> = tokens
            .filter_map(|token| token.split_once('='))
            .map(|(k, v)| (k, v.to_string()))
            .collect();
        self.add(class, name, &props);
        Ok(())
    }

    fn solve(&mut self) -> Result<bool> {
        if let Some(threshold) = self.diverge_above_kw {
            if self.excess_kw().abs() > threshold {
                if self.failed_attempts < self.recover_after_attempts {
                    self.failed_attempts += 1;
                    return Ok(false);
                }
                self.failed_attempts = 0;
            }
        }
        Ok(true)
    }

    fn bus_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for terminal in self.terminals() {
            let stem = terminal.bus().to_string();
            if !names.contains(&stem) {
                names.push(stem);
            }
        }
        names
    }

    fn bus_nodes(&self, bus: &str) -> Result<Vec<u32>> {
        let stem = bus.to_ascii_lowercase();
        let mut nodes: Vec<u32> = Vec::new();
        let mut seen = false;
        for terminal in self.terminals() {
            if terminal.bus() != stem {
                continue;
            }
            seen = true;
            // A bare terminal energizes all three phases.
            let contributed: Vec<u32> = if terminal.has_explicit_nodes() {
                terminal.nodes().to_vec()
            } else {
                vec![1, 2, 3]
            };
            for node in contributed {
                if node != 0 && !nodes.contains(&node) {
                    nodes.push(node);
                }
            }
        }
        if !seen {
            return Err(HcaError::Engine(format!("bus '{}' not found", bus)).into());
        }
        nodes.sort_unstable();
        Ok(nodes)
    }

    fn bus_voltage_phasors(&self, bus: &str, per_unit: bool) -> Result<Vec<(f64, f64)>> {
        let nodes = self.bus_nodes(bus)?;
        let phasors = nodes
            .iter()
            .map(|node| {
                let (magnitude, angle) = self.node_phasor(*node);
                if per_unit {
                    (magnitude / self.base_volts, angle)
                } else {
                    (magnitude, angle)
                }
            })
            .collect();
        Ok(phasors)
    }

    fn bus_sequence_voltages(&self, bus: &str) -> Result<[f64; 3]> {
        self.bus_nodes(bus)?;
        let positive = self.phase_pu() * self.base_volts;
        let negative = positive * self.vuf_percent() / 100.0;
        Ok([self.nev_volts(), positive, negative])
    }

    fn element_names(&self, class: ElementClass) -> Vec<String> {
        self.elements
            .get(&class)
            .map(|list| list.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    fn get_property(&self, element: &ElementRef, property: &str) -> Result<String> {
        self.find(element)?.get(property).cloned().ok_or_else(|| {
            HcaError::Engine(format!("{} has no property '{}'", element, property)).into()
        })
    }

    fn set_property(&mut self, element: &ElementRef, property: &str, value: &str) -> Result<()> {
        self.find_mut(element)?
            .insert(property.to_string(), value.to_ascii_lowercase());
        Ok(())
    }

    fn line_current_phasors(&self, line: &str) -> Result<Vec<(f64, f64)>> {
        let el = ElementRef::line(line);
        let terminal = self
            .get_property(&el, "bus1")?
            .parse::<TerminalAddress>()?;
        let nodes = self.bus_nodes(terminal.bus())?;
        Ok(nodes.iter().map(|_| (100.0, 0.0)).collect())
    }

    fn losses_kw(&self) -> f64 {
        60.0 + 0.01 * self.excess_kw().abs()
    }
}
