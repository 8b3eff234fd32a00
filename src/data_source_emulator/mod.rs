//! Emulator data source - generates synthetic L0MDT records for testing
//!
//! Produces readout blocks the way the board sends them on a bulk read:
//! one header, a Poisson-distributed number of data records, one trailer.
//! Every record is packed into wire words with the same layout the decoder
//! unpacks, so emulator output can be fed straight into `l0mdt_decode`.

use std::io::Write;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::reader::decoder::common::{BlockInfo, WordType, DATA_WORDS, SHIFTED_WORDS};
use crate::reader::decoder::felix::constants;

/// Field widths that survive the record packing
pub mod limits {
    /// `htd` is 38 bits wide, so only bits 36..37 of wmu reach the wire
    pub const WMU_MASK: u8 = 0x3;
    pub const EVN_MASK: u16 = 0xFFF;
    pub const BCN_MASK: u16 = 0xFFF;
    pub const ORN_MASK: u16 = 0xFFF;
    /// h0 / h2 carry one full payload word
    pub const LOW_HIT_MASK: u64 = 0xFFFF_FFFF;
    /// h1 / h3 carry a half word plus a full word
    pub const HIGH_HIT_MASK: u64 = 0xFFFF_FFFF_FFFF;
    /// Bunch crossings per LHC orbit
    pub const BUNCHES_PER_ORBIT: u16 = 3564;
    /// Largest timestamp step between consecutive records
    pub const MAX_TIMESTAMP_STEP: u32 = 16;
}

/// Emulator configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Number of readout blocks to generate
    pub blocks: u64,
    /// Mean number of data records per block
    pub mean_hits_per_block: f64,
    /// Module id written into headers and trailers
    pub module_id: u8,
    /// RNG seed (random if not set)
    pub seed: Option<u64>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            blocks: 10,
            mean_hits_per_block: 4.0,
            module_id: 0,
            seed: None,
        }
    }
}

impl EmulatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.mean_hits_per_block.is_finite() || self.mean_hits_per_block < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "mean_hits_per_block".to_string(),
                reason: format!("{} is not a non-negative number", self.mean_hits_per_block),
            });
        }
        if self.module_id & !limits::WMU_MASK != 0 {
            return Err(ConfigError::InvalidValue {
                field: "module_id".to_string(),
                reason: format!(
                    "{} does not fit the {} wmu bits carried by a record",
                    self.module_id,
                    limits::WMU_MASK.count_ones()
                ),
            });
        }
        Ok(())
    }
}

/// One generated readout block
#[derive(Debug, Clone)]
pub struct EmulatedBlock {
    /// Fields written into both header and trailer
    pub info: BlockInfo,
    /// Hit words of each data record, in order
    pub hits: Vec<[u64; 4]>,
    /// Timestamp of every record (header, data..., trailer)
    pub timestamps: Vec<u32>,
    /// Wire words of every record, least significant first
    pub records: Vec<[u32; DATA_WORDS]>,
}

impl EmulatedBlock {
    /// Records as text lines in wire order
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.records.iter().map(format_line)
    }
}

/// Emulator data source
pub struct Emulator {
    config: EmulatorConfig,
    rng: StdRng,
    hits_dist: Option<Poisson<f64>>,
    timestamp: u32,
    evn: u16,
    orn: u16,
}

impl Emulator {
    /// Create a new emulator with the given configuration
    pub fn new(config: EmulatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        // Poisson needs a strictly positive mean; zero means no data records
        let hits_dist = if config.mean_hits_per_block > 0.0 {
            Some(Poisson::new(config.mean_hits_per_block).map_err(|e| {
                ConfigError::InvalidValue {
                    field: "mean_hits_per_block".to_string(),
                    reason: e.to_string(),
                }
            })?)
        } else {
            None
        };

        Ok(Self {
            config,
            rng,
            hits_dist,
            timestamp: 0,
            evn: 0,
            orn: 0,
        })
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    fn next_timestamp(&mut self) -> u32 {
        let step = self.rng.gen_range(1..=limits::MAX_TIMESTAMP_STEP);
        self.timestamp = self.timestamp.wrapping_add(step) & constants::TIMESTAMP_MASK;
        self.timestamp
    }

    fn random_hits(&mut self) -> [u64; 4] {
        [
            self.rng.gen::<u64>() & limits::LOW_HIT_MASK,
            self.rng.gen::<u64>() & limits::HIGH_HIT_MASK,
            self.rng.gen::<u64>() & limits::LOW_HIT_MASK,
            self.rng.gen::<u64>() & limits::HIGH_HIT_MASK,
        ]
    }

    /// Generate the next readout block
    pub fn generate_block(&mut self) -> EmulatedBlock {
        self.evn = (self.evn + 1) & limits::EVN_MASK;
        self.orn = self.orn.wrapping_add(self.rng.gen_range(0..4)) & limits::ORN_MASK;
        let info = BlockInfo {
            wmu: self.config.module_id & limits::WMU_MASK,
            evn: self.evn,
            bcn: self.rng.gen_range(0..limits::BUNCHES_PER_ORBIT),
            orn: self.orn,
        };

        let n_hits = match &self.hits_dist {
            Some(dist) => dist.sample(&mut self.rng) as usize,
            None => 0,
        };

        let mut block = EmulatedBlock {
            info,
            hits: Vec::with_capacity(n_hits),
            timestamps: Vec::with_capacity(n_hits + 2),
            records: Vec::with_capacity(n_hits + 2),
        };

        let ts = self.next_timestamp();
        block.timestamps.push(ts);
        block
            .records
            .push(encode_header_trailer(WordType::Header, ts, &info));

        for _ in 0..n_hits {
            let ts = self.next_timestamp();
            let hits = self.random_hits();
            block.timestamps.push(ts);
            block.records.push(encode_data(ts, &hits));
            block.hits.push(hits);
        }

        let ts = self.next_timestamp();
        block.timestamps.push(ts);
        block
            .records
            .push(encode_header_trailer(WordType::Trailer, ts, &info));

        debug!(evn = info.evn, hits = n_hits, "Generated block");
        block
    }

    /// Generate all configured blocks
    pub fn generate(&mut self) -> Vec<EmulatedBlock> {
        (0..self.config.blocks).map(|_| self.generate_block()).collect()
    }

    /// Write all configured blocks as text lines; returns the record count
    pub fn write_lines<W: Write>(&mut self, out: &mut W) -> std::io::Result<u64> {
        let mut records = 0u64;
        for _ in 0..self.config.blocks {
            let block = self.generate_block();
            for line in block.lines() {
                writeln!(out, "{}", line)?;
                records += 1;
            }
        }
        out.flush()?;
        info!(blocks = self.config.blocks, records, "Emulator finished");
        Ok(records)
    }
}

/// Pack realigned payload words into wire words
///
/// Inverse of the decoder's realignment: the low 6 bits of `shifted[i]` go
/// to the top of `w[i]`, the remaining 26 bits to the bottom of `w[i + 1]`.
pub fn pack_shifted(
    timestamp: u32,
    shifted: &[u32; SHIFTED_WORDS],
    tag: u8,
) -> [u32; DATA_WORDS] {
    let mut words = [0u32; DATA_WORDS];
    words[0] = timestamp & constants::TIMESTAMP_MASK;
    for (i, s) in shifted.iter().enumerate() {
        words[i] |= (s & constants::OVERLAP_MASK) << constants::PAYLOAD_BITS;
        words[i + 1] |= (s >> constants::OVERLAP_BITS) & constants::PAYLOAD_MASK;
    }
    words[DATA_WORDS - 1] |= ((tag as u32) & constants::TYPE_TAG_MASK) << constants::TYPE_TAG_SHIFT;
    words
}

/// Build a header or trailer record
pub fn encode_header_trailer(
    word_type: WordType,
    timestamp: u32,
    info: &BlockInfo,
) -> [u32; DATA_WORDS] {
    let htd = ((info.evn & limits::EVN_MASK) as u64) << constants::EVN_SHIFT
        | ((info.bcn & limits::BCN_MASK) as u64) << constants::BCN_SHIFT
        | ((info.orn & limits::ORN_MASK) as u64) << constants::ORN_SHIFT
        | ((info.wmu & limits::WMU_MASK) as u64) << constants::WMU_SHIFT;

    let mut words = [0u32; DATA_WORDS];
    words[0] = (timestamp & constants::TIMESTAMP_MASK)
        | ((htd as u32) & constants::OVERLAP_MASK) << constants::PAYLOAD_BITS;
    words[1] = (htd >> constants::OVERLAP_BITS) as u32;
    words[DATA_WORDS - 1] |= (word_type.tag() as u32) << constants::TYPE_TAG_SHIFT;
    words
}

/// Build a data record from four hit words
///
/// Bits of `h0`/`h2` above 32 and of `h1`/`h3` above 48 are not carried.
pub fn encode_data(timestamp: u32, hits: &[u64; 4]) -> [u32; DATA_WORDS] {
    let half = constants::HIT_HALF_SHIFT;
    let low = |h: u64| (h & constants::HIT_LOW_HALF_MASK) as u32;

    let mut shifted = [0u32; SHIFTED_WORDS];
    for (pair, base) in [(0usize, 0usize), (2, 3)] {
        let (h_lo, h_hi) = (hits[pair], hits[pair + 1]);
        shifted[base] = low(h_lo);
        shifted[base + 1] = low(h_lo >> half) | low(h_hi) << half;
        shifted[base + 2] = (h_hi >> half) as u32;
    }
    pack_shifted(timestamp, &shifted, WordType::DATA_TAG)
}

/// Format wire words as a text record: count, then most significant first
pub fn format_line(words: &[u32; DATA_WORDS]) -> String {
    let mut line = format!("{:x}", constants::EXPECTED_WORD_COUNT);
    for w in words.iter().rev() {
        line.push_str(&format!(" {:08x}", w));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::decoder::felix::realign;
    use crate::reader::{FelixDecoder, Payload};

    fn seeded(seed: u64) -> EmulatorConfig {
        EmulatorConfig {
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn default_config() {
        let config = EmulatorConfig::default();
        assert_eq!(config.blocks, 10);
        assert_eq!(config.mean_hits_per_block, 4.0);
        assert_eq!(config.module_id, 0);
        assert!(config.seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_wide_module_id() {
        let config = EmulatorConfig {
            module_id: 0x2a,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(Emulator::new(config).is_err());
    }

    #[test]
    fn test_config_rejects_nan_mean() {
        let config = EmulatorConfig {
            mean_hits_per_block: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_format_line() {
        let mut words = [0u32; DATA_WORDS];
        words[0] = 0x1000_0000;
        words[7] = 0x4000_000a;
        assert_eq!(
            format_line(&words),
            "9 4000000a 00000000 00000000 00000000 00000000 00000000 00000000 10000000"
        );
    }

    #[test]
    fn test_pack_shifted_inverts_realign() {
        let shifted = [
            0xDEAD_BEEF,
            0x0123_4567,
            0x89AB_CDEF,
            0xFFFF_FFFF,
            0x0000_0001,
            0x8000_0000,
            0x0000_0000,
        ];
        let words = pack_shifted(0x155_5555, &shifted, 0x8);
        assert_eq!(realign(&words), shifted);
        assert_eq!(words[0] & constants::TIMESTAMP_MASK, 0x155_5555);
        assert_eq!(words[7] >> 28, 0x8);
    }

    #[test]
    fn test_encode_header_decodes() {
        let info = BlockInfo {
            wmu: 3,
            evn: 0xABC,
            bcn: 0xDE0,
            orn: 0x00F,
        };
        let words = encode_header_trailer(WordType::Header, 0x3FF_FFFF, &info);
        let rec = FelixDecoder::with_defaults().decode_words(9, &words).unwrap();
        assert_eq!(rec.timestamp, 0x3FF_FFFF);
        assert_eq!(rec.payload, Payload::Header(info));
    }

    #[test]
    fn test_encode_data_decodes() {
        let hits = [
            0x0000_0000_CAFE_F00D,
            0x0000_1234_5678_9ABC,
            0x0000_0000_0000_0001,
            0x0000_FFFF_FFFF_FFFF,
        ];
        let rec = FelixDecoder::with_defaults()
            .decode(&format_line(&encode_data(42, &hits)))
            .unwrap();
        assert_eq!(rec.word_type, WordType::Data);
        assert_eq!(rec.timestamp, 42);
        assert_eq!(rec.hits(), Some(&hits));
    }

    #[test]
    fn generate_block_structure() {
        let mut emulator = Emulator::new(seeded(7)).unwrap();
        let block = emulator.generate_block();
        assert_eq!(block.records.len(), block.hits.len() + 2);
        assert_eq!(block.timestamps.len(), block.records.len());
        assert_eq!(block.info.evn, 1);
        assert!(block.info.bcn < limits::BUNCHES_PER_ORBIT);

        let decoder = FelixDecoder::with_defaults();
        let types: Vec<WordType> = block
            .lines()
            .map(|l| decoder.decode(&l).unwrap().word_type)
            .collect();
        assert_eq!(types.first(), Some(&WordType::Header));
        assert_eq!(types.last(), Some(&WordType::Trailer));
        assert!(types[1..types.len() - 1]
            .iter()
            .all(|t| *t == WordType::Data));
    }

    #[test]
    fn timestamps_increase_within_block() {
        let mut emulator = Emulator::new(seeded(11)).unwrap();
        let block = emulator.generate_block();
        assert!(block.timestamps.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn zero_mean_gives_empty_blocks() {
        let config = EmulatorConfig {
            mean_hits_per_block: 0.0,
            ..seeded(1)
        };
        let mut emulator = Emulator::new(config).unwrap();
        for block in emulator.generate() {
            assert!(block.hits.is_empty());
            assert_eq!(block.records.len(), 2);
        }
    }

    #[test]
    fn same_seed_same_output() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        Emulator::new(seeded(99)).unwrap().write_lines(&mut a).unwrap();
        Emulator::new(seeded(99)).unwrap().write_lines(&mut b).unwrap();
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn write_lines_counts_records() {
        let config = EmulatorConfig {
            blocks: 4,
            mean_hits_per_block: 0.0,
            ..seeded(3)
        };
        let mut out = Vec::new();
        let n = Emulator::new(config).unwrap().write_lines(&mut out).unwrap();
        assert_eq!(n, 8);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 8);
    }
}
