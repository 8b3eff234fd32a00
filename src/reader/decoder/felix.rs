//! FELIX-style record decoder for the L0MDT front-end
//!
//! One record arrives as a text line of nine hex tokens:
//!
//! ```text
//! <count> <w7> <w6> <w5> <w4> <w3> <w2> <w1> <w0>
//! ```
//!
//! Each 32-bit wire word carries 26 payload bits in its low part; its top 6
//! bits hold the low bits of the next logical payload word. The low 26 bits of
//! `w0` are the timestamp and the top nibble of `w7` is the word-type tag.

use serde::Deserialize;
use tracing::trace;

use super::common::{
    BlockInfo, DecodeError, DecodedRecord, Payload, WordType, DATA_WORDS, SHIFTED_WORDS,
    TOKENS_PER_RECORD,
};

/// Wire format constants (must track the board firmware)
pub mod constants {
    /// Payload bits carried in the low part of every wire word
    pub const PAYLOAD_BITS: u32 = 26;
    pub const PAYLOAD_MASK: u32 = (1 << PAYLOAD_BITS) - 1;

    /// Bits at the top of a wire word that belong to the next payload word
    pub const OVERLAP_BITS: u32 = 32 - PAYLOAD_BITS;
    pub const OVERLAP_MASK: u32 = (1 << OVERLAP_BITS) - 1;

    // Timestamp (w0)
    pub const TIMESTAMP_MASK: u32 = PAYLOAD_MASK;

    // Word type (w7)
    pub const TYPE_TAG_SHIFT: u32 = 28;
    pub const TYPE_TAG_BITS: u32 = 4;
    pub const TYPE_TAG_MASK: u32 = (1 << TYPE_TAG_BITS) - 1;

    // Header/trailer descriptor (htd)
    pub const EVN_SHIFT: u32 = 0;
    pub const EVN_MASK: u64 = 0xFFF;
    pub const BCN_SHIFT: u32 = 12;
    pub const BCN_MASK: u64 = 0xFFF;
    pub const ORN_SHIFT: u32 = 24;
    pub const ORN_MASK: u64 = 0xFFF;
    pub const WMU_SHIFT: u32 = 36;
    pub const WMU_MASK: u64 = 0xFF;

    // Hit words
    pub const HIT_HALF_SHIFT: u32 = 16;
    pub const HIT_LOW_HALF_MASK: u64 = 0xFFFF;
    pub const HIT_HIGH_HALF_MASK: u64 = 0xFFFF_0000;

    /// Word count the board reports for every record
    pub const EXPECTED_WORD_COUNT: u32 = 9;
}

/// Decoder configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FelixConfig {
    /// Reject records whose count token is not 9
    pub strict_word_count: bool,
}

/// Record decoder
///
/// Stateless: every call decodes one record independently.
#[derive(Debug, Clone, Default)]
pub struct FelixDecoder {
    config: FelixConfig,
}

impl FelixDecoder {
    /// Create a new decoder with given configuration
    pub fn new(config: FelixConfig) -> Self {
        Self { config }
    }

    /// Create a decoder with default configuration
    pub fn with_defaults() -> Self {
        Self::new(FelixConfig::default())
    }

    pub fn config(&self) -> &FelixConfig {
        &self.config
    }

    /// Decode one text line
    pub fn decode(&self, line: &str) -> Result<DecodedRecord, DecodeError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != TOKENS_PER_RECORD {
            return Err(DecodeError::MalformedRecord {
                expected: TOKENS_PER_RECORD,
                actual: tokens.len(),
            });
        }

        let word_count = parse_hex(tokens[0], 0)?;

        // Undo wire order: the first data token is the most significant word
        let mut words = [0u32; DATA_WORDS];
        for (i, token) in tokens[1..].iter().enumerate() {
            words[DATA_WORDS - 1 - i] = parse_hex(token, i + 1)?;
        }

        self.decode_words(word_count, &words)
    }

    /// Decode words that are already in least-significant-first order
    pub fn decode_words(
        &self,
        word_count: u32,
        words: &[u32; DATA_WORDS],
    ) -> Result<DecodedRecord, DecodeError> {
        if self.config.strict_word_count && word_count != constants::EXPECTED_WORD_COUNT {
            return Err(DecodeError::UnexpectedWordCount {
                expected: constants::EXPECTED_WORD_COUNT,
                actual: word_count,
            });
        }

        let timestamp = words[0] & constants::TIMESTAMP_MASK;
        let word_type = WordType::from_tag(type_tag(words[DATA_WORDS - 1]));
        let shifted = realign(words);

        let payload = match word_type {
            WordType::Header => Payload::Header(block_info(words)),
            WordType::Trailer => Payload::Trailer(block_info(words)),
            WordType::Data => Payload::Data {
                hits: hits(&shifted),
            },
            WordType::Unknown(_) => Payload::Unknown,
        };

        trace!(timestamp, tag = word_type.tag(), "Decoded record");

        Ok(DecodedRecord {
            word_count,
            words: *words,
            timestamp,
            word_type,
            shifted,
            payload,
        })
    }
}

/// Parse one base-16 token (digits only, no sign or prefix)
fn parse_hex(token: &str, index: usize) -> Result<u32, DecodeError> {
    let invalid = || DecodeError::InvalidToken {
        index,
        token: token.to_string(),
    };
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    u32::from_str_radix(token, 16).map_err(|_| invalid())
}

/// Top nibble of the most significant word
#[inline]
pub fn type_tag(msw: u32) -> u8 {
    ((msw >> constants::TYPE_TAG_SHIFT) & constants::TYPE_TAG_MASK) as u8
}

/// Rebuild word-aligned payload words from the 26-bit packing
///
/// `shifted[i]` takes the top 6 bits of `w[i]` as its low bits and the low
/// 26 bits of `w[i + 1]` above them.
pub fn realign(words: &[u32; DATA_WORDS]) -> [u32; SHIFTED_WORDS] {
    let mut shifted = [0u32; SHIFTED_WORDS];
    for (i, out) in shifted.iter_mut().enumerate() {
        *out = ((words[i] >> constants::PAYLOAD_BITS) & constants::OVERLAP_MASK)
            | (words[i + 1] << constants::OVERLAP_BITS);
    }
    shifted
}

/// Header/trailer descriptor built from the two least significant words
#[inline]
pub fn header_trailer_data(words: &[u32; DATA_WORDS]) -> u64 {
    ((words[0] >> constants::PAYLOAD_BITS) & constants::OVERLAP_MASK) as u64
        | ((words[1] as u64) << constants::OVERLAP_BITS)
}

fn block_info(words: &[u32; DATA_WORDS]) -> BlockInfo {
    let htd = header_trailer_data(words);
    BlockInfo {
        wmu: ((htd >> constants::WMU_SHIFT) & constants::WMU_MASK) as u8,
        evn: ((htd >> constants::EVN_SHIFT) & constants::EVN_MASK) as u16,
        bcn: ((htd >> constants::BCN_SHIFT) & constants::BCN_MASK) as u16,
        orn: ((htd >> constants::ORN_SHIFT) & constants::ORN_MASK) as u16,
    }
}

/// Merge a full payload word with the low half of the next one
#[inline]
fn low_hit(lo: u32, hi: u32) -> u64 {
    lo as u64 | (((hi as u64) << constants::HIT_HALF_SHIFT) & constants::HIT_HIGH_HALF_MASK)
}

/// Merge the high half of a payload word with all of the next one
#[inline]
fn high_hit(lo: u32, hi: u32) -> u64 {
    (((lo as u64) >> constants::HIT_HALF_SHIFT) & constants::HIT_LOW_HALF_MASK)
        | ((hi as u64) << constants::HIT_HALF_SHIFT)
}

fn hits(shifted: &[u32; SHIFTED_WORDS]) -> [u64; 4] {
    [
        low_hit(shifted[0], shifted[1]),
        high_hit(shifted[1], shifted[2]),
        low_hit(shifted[3], shifted[4]),
        high_hit(shifted[4], shifted[5]),
    ]
}
