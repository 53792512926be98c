//! Structured terminal addresses.
//!
//! The solver identifies an element terminal as a bus name concatenated
//! with an ordered list of node indices, e.g. `"634.1.2.3.4"`. An address
//! with no indices means "all phases implicitly, no neutral". A trailing
//! index equal to the configured neutral index denotes an explicit neutral
//! connection, and rewriting that suffix is the sole mechanism of topology
//! transformation.
//!
//! Addresses are parsed once when read from the engine and formatted once
//! when written back; everything in between operates on this type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HcaError;

/// A bus identifier plus the ordered node indices attached at that bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerminalAddress {
    bus: String,
    nodes: Vec<u32>,
}

impl TerminalAddress {
    pub fn new(bus: impl Into<String>, nodes: impl Into<Vec<u32>>) -> Self {
        Self {
            bus: bus.into().to_ascii_lowercase(),
            nodes: nodes.into(),
        }
    }

    /// An address with no explicit node indices.
    pub fn bare(bus: impl Into<String>) -> Self {
        Self::new(bus, Vec::new())
    }

    pub fn bus(&self) -> &str {
        &self.bus
    }

    pub fn nodes(&self) -> &[u32] {
        &self.nodes
    }

    pub fn has_explicit_nodes(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// The last node index, if any.
    pub fn trailing(&self) -> Option<u32> {
        self.nodes.last().copied()
    }

    /// Replace the trailing node index, leaving the bus name and every
    /// other index untouched. An address without indices is unchanged.
    pub fn with_trailing(&self, node: u32) -> Self {
        let mut nodes = self.nodes.clone();
        if let Some(last) = nodes.last_mut() {
            *last = node;
        }
        Self {
            bus: self.bus.clone(),
            nodes,
        }
    }

    /// Drop the trailing node index. An address without indices is unchanged.
    pub fn without_trailing(&self) -> Self {
        let mut nodes = self.nodes.clone();
        nodes.pop();
        Self {
            bus: self.bus.clone(),
            nodes,
        }
    }

    /// Append a node index after the existing ones.
    pub fn with_appended(&self, node: u32) -> Self {
        let mut nodes = self.nodes.clone();
        nodes.push(node);
        Self {
            bus: self.bus.clone(),
            nodes,
        }
    }

    /// Replace the whole node list.
    pub fn with_nodes(&self, nodes: impl Into<Vec<u32>>) -> Self {
        Self {
            bus: self.bus.clone(),
            nodes: nodes.into(),
        }
    }

    /// Just the bus name, all node indices stripped.
    pub fn stripped(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            nodes: Vec::new(),
        }
    }
}

impl FromStr for TerminalAddress {
    type Err = HcaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(HcaError::Address("empty terminal address".into()));
        }
        let mut parts = trimmed.split('.');
        let bus = parts.next().unwrap_or_default().to_ascii_lowercase();
        if bus.is_empty() {
            return Err(HcaError::Address(format!(
                "terminal address '{}' has no bus name",
                trimmed
            )));
        }
        let mut nodes = Vec::new();
        for part in parts {
            let node: u32 = part.parse().map_err(|_| {
                HcaError::Address(format!(
                    "terminal address '{}' has non-numeric node index '{}'",
                    trimmed, part
                ))
            })?;
            nodes.push(node);
        }
        Ok(Self { bus, nodes })
    }
}

impl fmt::Display for TerminalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bus)?;
        for node in &self.nodes {
            write!(f, ".{}", node)?;
        }
        Ok(())
    }
}
