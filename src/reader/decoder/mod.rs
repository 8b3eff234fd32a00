//! Decoder module for L0MDT readout records
//!
//! Converts text records from the board into structured DecodedRecord values.

pub mod common;
pub mod felix;

pub use common::{BlockInfo, DecodeError, DecodedRecord, Payload, WordType};
pub use felix::{FelixConfig, FelixDecoder};
