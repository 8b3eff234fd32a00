//! Shared infrastructure for the L0MDT readout binaries

pub mod cli;
pub use cli::{CommonArgs, DecodeArgs, EmulatorArgs};
