//! Node addressing table and canonical bus ordering.
//!
//! Solver bus terminals are identified by small integer node indices:
//! 1..=3 are the phase conductors (displayed as `a`, `b`, `c`), one
//! configurable index is the neutral (displayed as `n`, default 4) and one
//! is the ground reference (default 0). Ground is never a measurable node.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;

/// Phase and neutral node index assignment for a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTable {
    /// Node index carrying the neutral conductor
    pub neutral: u32,
    /// Reserved node index for the ground reference
    pub ground: u32,
}

impl Default for NodeTable {
    fn default() -> Self {
        Self {
            neutral: 4,
            ground: 0,
        }
    }
}

impl NodeTable {
    pub fn new(neutral: u32, ground: u32) -> Self {
        Self { neutral, ground }
    }

    /// Display letter for a node index, `None` when the index is not a
    /// recognized phase or neutral.
    pub fn letter(&self, node: u32) -> Option<char> {
        match node {
            1 => Some('a'),
            2 => Some('b'),
            3 => Some('c'),
            n if n == self.neutral => Some('n'),
            _ => None,
        }
    }

    pub fn is_phase(&self, node: u32) -> bool {
        (1..=3).contains(&node)
    }

    pub fn is_neutral(&self, node: u32) -> bool {
        node == self.neutral
    }

    /// Phases and neutral are measurable; ground and anything unmapped is not.
    pub fn is_measurable(&self, node: u32) -> bool {
        self.letter(node).is_some()
    }

    /// The three phase letters, in conductor order.
    pub fn phase_letters() -> [char; 3] {
        ['a', 'b', 'c']
    }
}

/// Canonical source-to-end ordering of feeder buses.
///
/// The solver enumerates buses in creation order; measurements and reports
/// want them in electrical order from the source bus outward. Buses the
/// table does not know are dropped with a warning rather than guessed.
#[derive(Debug, Clone, Default)]
pub struct BusOrder {
    ranks: HashMap<String, usize>,
}

impl BusOrder {
    pub fn from_ranks<I, S>(ranks: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        Self {
            ranks: ranks
                .into_iter()
                .map(|(name, rank)| (name.into(), rank))
                .collect(),
        }
    }

    /// The 16-bus ordering of the IEEE 13-node test feeder (source bus,
    /// substation, regulator, then laterals in walk order).
    pub fn ieee13() -> Self {
        Self::from_ranks([
            ("sourcebus", 0),
            ("650", 1),
            ("rg60", 2),
            ("632", 3),
            ("645", 4),
            ("646", 5),
            ("633", 6),
            ("634", 7),
            ("670", 8),
            ("671", 9),
            ("684", 10),
            ("611", 11),
            ("652", 12),
            ("692", 13),
            ("675", 14),
            ("680", 15),
        ])
    }

    pub fn rank(&self, bus: &str) -> Option<usize> {
        self.ranks.get(bus).copied()
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    /// Sort solver bus names into canonical order, dropping (and warning
    /// about) any bus the table does not know.
    pub fn ordered(&self, bus_names: &[String], diag: &mut Diagnostics) -> Vec<String> {
        let mut known: Vec<String> = Vec::with_capacity(bus_names.len());
        for bus in bus_names {
            if self.ranks.contains_key(bus.as_str()) {
                known.push(bus.clone());
            } else {
                diag.add_warning_with_entity(
                    "measurement",
                    "bus not found in the ordering table",
                    bus,
                );
            }
        }
        known.sort_by_key(|bus| self.ranks[bus.as_str()]);
        known
    }
}
