//! Operating limits used to stop a hosting-capacity sweep.
//!
//! A limit set holds at most three independent thresholds; any subset may
//! be unset, and an unset limit is never evaluated. When several limits
//! are violated at the same operating point, the one reported follows a
//! fixed priority order: voltage band, then neutral-to-earth voltage,
//! then voltage unbalance.

use serde::{Deserialize, Serialize};

/// The performance limit that stopped a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitKind {
    /// Per-unit phase voltage outside the configured band
    Voltage,
    /// Absolute neutral-to-earth voltage above the cap
    NeutralToEarth,
    /// Voltage unbalance factor above the cap
    Unbalance,
}

impl LimitKind {
    /// Evaluation and reporting priority, highest first.
    pub const PRIORITY: [LimitKind; 3] = [
        LimitKind::Voltage,
        LimitKind::NeutralToEarth,
        LimitKind::Unbalance,
    ];

    /// Name used in result rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKind::Voltage => "Voltage",
            LimitKind::NeutralToEarth => "NEV",
            LimitKind::Unbalance => "VUF",
        }
    }
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds gating a hosting-capacity sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitSet {
    /// Per-unit voltage band (min, max) for phase voltages
    pub voltage_band_pu: Option<(f64, f64)>,
    /// Neutral-to-earth voltage cap, in volts
    pub nev_volts: Option<f64>,
    /// Voltage unbalance factor cap, in percent
    pub vuf_percent: Option<f64>,
}

impl LimitSet {
    pub fn with_voltage_band(mut self, min_pu: f64, max_pu: f64) -> Self {
        self.voltage_band_pu = Some((min_pu, max_pu));
        self
    }

    pub fn with_nev_cap(mut self, volts: f64) -> Self {
        self.nev_volts = Some(volts);
        self
    }

    pub fn with_vuf_cap(mut self, percent: f64) -> Self {
        self.vuf_percent = Some(percent);
        self
    }

    /// True when no threshold is configured; a sweep with an empty limit
    /// set has nothing to evaluate and produces no results.
    pub fn is_empty(&self) -> bool {
        self.voltage_band_pu.is_none() && self.nev_volts.is_none() && self.vuf_percent.is_none()
    }
}
