//! L0MDT-RS: readout tools for the L0MDT front-end test board
//!
//! This crate decodes the text records returned by bulk data reads into
//! typed header, data and trailer fields.

pub mod common;
pub mod config;
pub mod data_source_emulator;
pub mod reader;
