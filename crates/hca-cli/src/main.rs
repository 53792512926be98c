use clap::Parser;
use tracing_subscriber::FmtSubscriber;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let has_neutral = !cli.no_neutral;
    let mut circuit = commands::demo_circuit(cli.open_switch, has_neutral)?;
    match &cli.command {
        Commands::Pf { per_unit } => commands::pf(&mut circuit, *per_unit),
        Commands::Kron => commands::kron(&mut circuit),
        Commands::Reactors {
            resistance,
            reactance,
        } => commands::reactors(&mut circuit, *resistance, *reactance),
        Commands::Pv => commands::pv(&mut circuit),
        Commands::Hostcap(args) => commands::hostcap(&mut circuit, args),
    }
}
