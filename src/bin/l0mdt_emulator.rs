//! Emulator binary - prints synthetic L0MDT readout records
//!
//! Usage:
//!   cargo run --bin l0mdt_emulator                        # Use defaults
//!   cargo run --bin l0mdt_emulator -- --config l0mdt.toml # Use config file
//!   cargo run --bin l0mdt_emulator -- --blocks 100 --hits 8 --seed 1

use std::io::{self, BufWriter};

use clap::Parser;
use l0mdt_rs::common::EmulatorArgs;
use l0mdt_rs::config::Config;
use l0mdt_rs::data_source_emulator::Emulator;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Emulator - prints synthetic readout blocks in the board's text format
#[derive(Parser, Debug)]
#[command(name = "l0mdt_emulator", about = "L0MDT record emulator")]
struct Args {
    #[command(flatten)]
    emulator: EmulatorArgs,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("l0mdt_rs=info".parse()?))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = Config::load_or_default(&args.emulator.common.config_file)?;
    args.emulator.apply(&mut config);

    info!(
        blocks = config.emulator.blocks,
        mean_hits = config.emulator.mean_hits_per_block,
        module_id = config.emulator.module_id,
        seed = ?config.emulator.seed,
        "Emulator configuration"
    );

    let mut emulator = Emulator::new(config.emulator)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    emulator.write_lines(&mut out)?;

    Ok(())
}
