use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Feeder topology and hosting-capacity analysis", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    /// Model the demo feeder without an explicit neutral conductor
    #[arg(long)]
    pub no_neutral: bool,

    /// Start with the tie switch open
    #[arg(long)]
    pub open_switch: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Solve the power flow and print per-bus voltage magnitudes
    Pf {
        /// Report per-unit magnitudes instead of volts
        #[arg(long)]
        per_unit: bool,
    },
    /// Collapse the explicit neutral onto ground and print the rewritten terminals
    Kron,
    /// Ground the neutral with reactors and print what was created
    Reactors {
        /// Grounding resistance, in ohms
        #[arg(long, default_value_t = 5.0)]
        resistance: f64,
        /// Grounding reactance, in ohms
        #[arg(long, default_value_t = 0.0)]
        reactance: f64,
    },
    /// Attach disabled single-phase PV systems to the wye loads
    Pv,
    /// Sweep hosting capacity for the eligible loads
    Hostcap(HostcapArgs),
}

#[derive(Args, Debug)]
pub struct HostcapArgs {
    /// Largest candidate level, in kW
    #[arg(long, default_value_t = 200.0)]
    pub max_kw: f64,

    /// Candidate step, in kW
    #[arg(long, default_value_t = 2.0)]
    pub step_kw: f64,

    /// Sweep added consumption instead of injection
    #[arg(long)]
    pub consumption: bool,

    /// Lower per-unit voltage bound
    #[arg(long)]
    pub vmin: Option<f64>,

    /// Upper per-unit voltage bound
    #[arg(long)]
    pub vmax: Option<f64>,

    /// Neutral-to-earth voltage cap, in volts
    #[arg(long)]
    pub nev: Option<f64>,

    /// Voltage unbalance cap, in percent
    #[arg(long)]
    pub vuf: Option<f64>,

    /// Restrict the sweep to loads on one bus
    #[arg(long)]
    pub bus: Option<String>,
}
