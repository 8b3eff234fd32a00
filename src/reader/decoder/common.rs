//! Common types for decoder module

use serde::Serialize;
use thiserror::Error;

/// Number of data words in one record
pub const DATA_WORDS: usize = 8;

/// Number of realigned payload words derived from the data words
pub const SHIFTED_WORDS: usize = DATA_WORDS - 1;

/// Tokens per text line: word count + data words
pub const TOKENS_PER_RECORD: usize = DATA_WORDS + 1;

/// Word-type classification (top nibble of the most significant word)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WordType {
    /// Start of a readout block
    Header,
    /// Hit data
    Data,
    /// End of a readout block
    Trailer,
    /// Reserved or unrecognized tag
    Unknown(u8),
}

impl WordType {
    pub const HEADER_TAG: u8 = 0x4;
    pub const DATA_TAG: u8 = 0x8;
    pub const TRAILER_TAG: u8 = 0xC;

    /// Classify a 4-bit tag
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            Self::HEADER_TAG => WordType::Header,
            Self::DATA_TAG => WordType::Data,
            Self::TRAILER_TAG => WordType::Trailer,
            other => WordType::Unknown(other),
        }
    }

    /// Raw 4-bit tag as it appears on the wire
    pub fn tag(&self) -> u8 {
        match self {
            WordType::Header => Self::HEADER_TAG,
            WordType::Data => Self::DATA_TAG,
            WordType::Trailer => Self::TRAILER_TAG,
            WordType::Unknown(tag) => *tag,
        }
    }

    /// Short tag used in the text rendering
    pub fn label(&self) -> &'static str {
        match self {
            WordType::Header => "H",
            WordType::Data => "D",
            WordType::Trailer => "T",
            WordType::Unknown(_) => "?",
        }
    }
}

/// Header/trailer metadata unpacked from the `htd` composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BlockInfo {
    /// Module id
    pub wmu: u8,
    /// Event number
    pub evn: u16,
    /// Bunch counter
    pub bcn: u16,
    /// Orbit number
    pub orn: u16,
}

/// Type-specific payload of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Payload {
    Header(BlockInfo),
    Trailer(BlockInfo),
    Data { hits: [u64; 4] },
    Unknown,
}

/// Decode errors
///
/// Every variant rejects a single record only; callers decide whether to
/// continue with the next line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed record: expected {expected} tokens, got {actual}")]
    MalformedRecord { expected: usize, actual: usize },

    #[error("malformed record: token {index} ({token:?}) is not a 32-bit hex value")]
    InvalidToken { index: usize, token: String },

    #[error("malformed record: invalid UTF-8 after byte {offset}")]
    InvalidEncoding { offset: usize },

    #[error("unexpected word count 0x{actual:x} (expected 0x{expected:x})")]
    UnexpectedWordCount { expected: u32, actual: u32 },
}

impl DecodeError {
    /// True for shape/parse failures of the text line itself
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            DecodeError::MalformedRecord { .. }
                | DecodeError::InvalidToken { .. }
                | DecodeError::InvalidEncoding { .. }
        )
    }
}

/// One decoded record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedRecord {
    /// Word count token as received (normally 9)
    pub word_count: u32,
    /// Data words, least significant first
    pub words: [u32; DATA_WORDS],
    /// 26-bit timestamp from the least significant word
    pub timestamp: u32,
    /// Classification from the top nibble of the most significant word
    pub word_type: WordType,
    /// Realigned payload words; index 6 is not interpreted by any field yet
    pub shifted: [u32; SHIFTED_WORDS],
    /// Type-specific fields
    pub payload: Payload,
}

impl DecodedRecord {
    pub fn is_header(&self) -> bool {
        self.word_type == WordType::Header
    }

    /// Header or trailer metadata, if this record carries it
    pub fn block_info(&self) -> Option<&BlockInfo> {
        match &self.payload {
            Payload::Header(info) | Payload::Trailer(info) => Some(info),
            _ => None,
        }
    }

    /// Hit words, if this is a data record
    pub fn hits(&self) -> Option<&[u64; 4]> {
        match &self.payload {
            Payload::Data { hits } => Some(hits),
            _ => None,
        }
    }

    /// Format record for display (one line, no leading separator)
    pub fn display(&self) -> String {
        let prefix = format!("TS={:08x} {}", self.timestamp, self.word_type.label());
        match &self.payload {
            Payload::Header(info) | Payload::Trailer(info) => format!(
                "{} WMU={:02x} EVN={:03x} BCN={:03x} ORN={:03x}",
                prefix, info.wmu, info.evn, info.bcn, info.orn
            ),
            Payload::Data { hits } => format!(
                "{} {:016x} {:016x} {:016x} {:016x}",
                prefix, hits[0], hits[1], hits[2], hits[3]
            ),
            Payload::Unknown => prefix,
        }
    }
}

impl std::fmt::Display for DecodedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_type_from_tag() {
        assert_eq!(WordType::from_tag(0x4), WordType::Header);
        assert_eq!(WordType::from_tag(0x8), WordType::Data);
        assert_eq!(WordType::from_tag(0xC), WordType::Trailer);
        assert_eq!(WordType::from_tag(0x0), WordType::Unknown(0x0));
        assert_eq!(WordType::from_tag(0xF), WordType::Unknown(0xF));
    }

    #[test]
    fn test_word_type_tag_roundtrip() {
        for tag in 0u8..16 {
            assert_eq!(WordType::from_tag(tag).tag(), tag);
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(WordType::Header.label(), "H");
        assert_eq!(WordType::Data.label(), "D");
        assert_eq!(WordType::Trailer.label(), "T");
        assert_eq!(WordType::Unknown(3).label(), "?");
    }

    #[test]
    fn test_is_malformed() {
        let err = DecodeError::MalformedRecord {
            expected: 9,
            actual: 8,
        };
        assert!(err.is_malformed());
        assert!(err.to_string().contains("expected 9 tokens, got 8"));

        let err = DecodeError::InvalidToken {
            index: 3,
            token: "zz".to_string(),
        };
        assert!(err.is_malformed());
        assert!(err.to_string().contains("\"zz\""));

        let err = DecodeError::InvalidEncoding { offset: 2 };
        assert!(err.is_malformed());

        let err = DecodeError::UnexpectedWordCount {
            expected: 9,
            actual: 8,
        };
        assert!(!err.is_malformed());
    }
}
