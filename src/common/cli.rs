//! CLI argument parsing for the L0MDT readout tools
//!
//! Each binary embeds `CommonArgs` and applies its own overrides on top of
//! the loaded `Config`; command-line values always win over the file.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::reader::OutputFormat;

/// Common arguments shared across all binaries
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    /// Path to configuration file (defaults are used if it does not exist)
    #[arg(short = 'f', long = "config", default_value = "l0mdt.toml")]
    pub config_file: String,
}

/// Arguments for the record decoder
#[derive(Parser, Debug, Clone)]
pub struct DecodeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Input file with one record per line (stdin if omitted)
    pub input: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Reject records whose word count is not 9
    #[arg(long)]
    pub strict: bool,

    /// Do not print a blank line before header records
    #[arg(long = "no-blank-line")]
    pub no_blank_line: bool,

    /// Print stream statistics to stderr when done
    #[arg(long)]
    pub stats: bool,
}

impl DecodeArgs {
    /// Apply command-line overrides to a loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(format) = self.format {
            config.render.format = format;
        }
        if self.strict {
            config.decoder.strict_word_count = true;
        }
        if self.no_blank_line {
            config.render.blank_line_before_header = false;
        }
    }
}

/// Arguments for the record emulator
#[derive(Parser, Debug, Clone)]
pub struct EmulatorArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Number of readout blocks
    #[arg(short, long)]
    pub blocks: Option<u64>,

    /// Mean number of data records per block
    #[arg(long = "hits")]
    pub mean_hits: Option<f64>,

    /// RNG seed for reproducible output
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Module id written into headers and trailers
    #[arg(short, long = "module-id")]
    pub module_id: Option<u8>,
}

impl EmulatorArgs {
    /// Apply command-line overrides to a loaded configuration
    pub fn apply(&self, config: &mut Config) {
        let emu = &mut config.emulator;
        if let Some(b) = self.blocks {
            emu.blocks = b;
        }
        if let Some(m) = self.mean_hits {
            emu.mean_hits_per_block = m;
        }
        if let Some(s) = self.seed {
            emu.seed = Some(s);
        }
        if let Some(m) = self.module_id {
            emu.module_id = m;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_args_default() {
        let args = CommonArgs::try_parse_from(["test"]).unwrap();
        assert_eq!(args.config_file, "l0mdt.toml");
    }

    #[test]
    fn test_common_args_custom_config() {
        let args = CommonArgs::try_parse_from(["test", "-f", "custom.toml"]).unwrap();
        assert_eq!(args.config_file, "custom.toml");
    }

    #[test]
    fn test_decode_args_default() {
        let args = DecodeArgs::try_parse_from(["test"]).unwrap();
        assert_eq!(args.input, None);
        assert_eq!(args.format, None);
        assert!(!args.strict);
        assert!(!args.no_blank_line);
    }

    #[test]
    fn test_decode_args_overrides() {
        let args = DecodeArgs::try_parse_from([
            "test",
            "dump.txt",
            "--format",
            "json",
            "--strict",
            "--no-blank-line",
        ])
        .unwrap();
        assert_eq!(args.input, Some(PathBuf::from("dump.txt")));

        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.render.format, OutputFormat::Json);
        assert!(config.decoder.strict_word_count);
        assert!(!config.render.blank_line_before_header);
    }

    #[test]
    fn test_decode_args_keep_file_values() {
        let args = DecodeArgs::try_parse_from(["test"]).unwrap();
        let mut config = Config::from_toml("[decoder]\nstrict_word_count = true\n").unwrap();
        args.apply(&mut config);
        assert!(config.decoder.strict_word_count);
    }

    #[test]
    fn test_decode_args_bad_format() {
        assert!(DecodeArgs::try_parse_from(["test", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_emulator_args_overrides() {
        let args = EmulatorArgs::try_parse_from([
            "test",
            "--blocks",
            "5",
            "--hits",
            "2.5",
            "--seed",
            "7",
            "--module-id",
            "3",
        ])
        .unwrap();
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.emulator.blocks, 5);
        assert_eq!(config.emulator.mean_hits_per_block, 2.5);
        assert_eq!(config.emulator.seed, Some(7));
        assert_eq!(config.emulator.module_id, 3);
    }
}
