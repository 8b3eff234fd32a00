//! Decoder binary - renders L0MDT readout records
//!
//! Usage:
//!   cargo run --bin l0mdt_decode -- capture.txt
//!   cargo run --bin l0mdt_decode -- capture.txt --format json
//!   cargo run --bin l0mdt_emulator -- --seed 1 | cargo run --bin l0mdt_decode -- --stats

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use l0mdt_rs::common::DecodeArgs;
use l0mdt_rs::config::Config;
use l0mdt_rs::reader::{decode_all, FelixDecoder, RecordWriter};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Decode L0MDT readout records (one `<count> <w7> ... <w0>` line each)
#[derive(Parser, Debug)]
#[command(name = "l0mdt_decode", about = "L0MDT readout record decoder")]
struct Args {
    #[command(flatten)]
    decode: DecodeArgs,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so decoded output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("l0mdt_rs=info".parse()?))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let config_path = &args.decode.common.config_file;
    let mut config = Config::load_or_default(config_path)
        .with_context(|| format!("loading {}", config_path))?;
    args.decode.apply(&mut config);
    config.validate()?;

    info!(
        strict = config.decoder.strict_word_count,
        format = ?config.render.format,
        "Decoder configuration"
    );

    let decoder = FelixDecoder::new(config.decoder.clone());
    let writer = RecordWriter::new(config.render.clone());
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let start = Instant::now();
    let stats = match &args.decode.input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("opening {}", path.display()))?;
            decode_all(BufReader::new(file), decoder, &writer, &mut out)?
        }
        None => decode_all(io::stdin().lock(), decoder, &writer, &mut out)?,
    };

    if args.decode.stats {
        eprintln!("{}", stats);
        eprintln!(
            "{:.0} records/s",
            stats.records_per_sec(start.elapsed())
        );
    }

    Ok(())
}
