//! Per-stream counters and readout block tracking
//!
//! Single-threaded counterpart of the pipeline counters: the decode loop owns
//! the stats and reports a snapshot when the stream ends.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use super::decoder::{BlockInfo, DecodeError, DecodedRecord, WordType};

/// Counters for one decoded stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    /// Non-blank lines handed to the decoder, bad ones included
    pub lines: u64,
    /// Lines decoded into records
    pub decoded: u64,
    pub headers: u64,
    pub data: u64,
    pub trailers: u64,
    pub unknown: u64,
    /// Lines with the wrong token count, a bad hex token or bad UTF-8
    pub malformed: u64,
    /// Well-formed lines rejected by a decoder policy (strict word count)
    pub rejected: u64,
    /// Block ordering anomalies (never cause a rejection)
    pub sequence_warnings: u64,
}

impl StreamStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a successfully decoded record
    pub fn record(&mut self, rec: &DecodedRecord) {
        self.decoded += 1;
        match rec.word_type {
            WordType::Header => self.headers += 1,
            WordType::Data => self.data += 1,
            WordType::Trailer => self.trailers += 1,
            WordType::Unknown(_) => self.unknown += 1,
        }
    }

    /// Count a rejected line
    pub fn record_error(&mut self, err: &DecodeError) {
        if err.is_malformed() {
            self.malformed += 1;
        } else {
            self.rejected += 1;
        }
    }

    /// Lines that did not produce a record
    pub fn errors(&self) -> u64 {
        self.malformed + self.rejected
    }

    /// Decoded records per second over the given wall time
    pub fn records_per_sec(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.decoded as f64 / secs
    }
}

impl fmt::Display for StreamStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lines={} decoded={} (H={} D={} T={} ?={}) malformed={} rejected={} seq_warn={}",
            self.lines,
            self.decoded,
            self.headers,
            self.data,
            self.trailers,
            self.unknown,
            self.malformed,
            self.rejected,
            self.sequence_warnings
        )
    }
}

/// Ordering anomaly between header, data and trailer records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceWarning {
    /// Header while a previous block is still open
    UnterminatedBlock { evn: u16 },
    /// Data record with no open header
    DataOutsideBlock,
    /// Trailer with no open header
    OrphanTrailer { evn: u16 },
    /// Trailer event number differs from the open header
    EventMismatch { header_evn: u16, trailer_evn: u16 },
}

/// Tracks header..trailer framing across consecutive records
#[derive(Debug, Clone, Default)]
pub struct BlockTracker {
    open: Option<BlockInfo>,
}

impl BlockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header of the block currently open, if any
    pub fn open_block(&self) -> Option<&BlockInfo> {
        self.open.as_ref()
    }

    /// Feed the next record; returns an anomaly if the framing is off
    pub fn observe(&mut self, rec: &DecodedRecord) -> Option<SequenceWarning> {
        let warning = match (rec.word_type, rec.block_info()) {
            (WordType::Header, Some(info)) => {
                let prev = self.open.replace(*info);
                prev.map(|p| SequenceWarning::UnterminatedBlock { evn: p.evn })
            }
            (WordType::Trailer, Some(info)) => match self.open.take() {
                Some(header) if header.evn != info.evn => Some(SequenceWarning::EventMismatch {
                    header_evn: header.evn,
                    trailer_evn: info.evn,
                }),
                Some(_) => None,
                None => Some(SequenceWarning::OrphanTrailer { evn: info.evn }),
            },
            (WordType::Data, _) if self.open.is_none() => Some(SequenceWarning::DataOutsideBlock),
            _ => None,
        };

        if let Some(w) = &warning {
            debug!(warning = ?w, timestamp = rec.timestamp, "Block sequence anomaly");
        }
        warning
    }
}
