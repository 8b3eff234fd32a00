//! Reader module for L0MDT readout records
//!
//! This module provides:
//! - Record decoder (decoder)
//! - Line-oriented record stream with local recovery from bad lines
//! - Text / JSON rendering of decoded records
//! - Stream statistics and block tracking (stats)

pub mod decoder;
pub mod stats;

// Re-exports
pub use decoder::{
    BlockInfo, DecodeError, DecodedRecord, FelixConfig, FelixDecoder, Payload, WordType,
};
pub use stats::{BlockTracker, SequenceWarning, StreamStats};

use std::io::{BufRead, Write};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reader error type
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: DecodeError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StreamError {
    /// True if only the current record is lost and the stream can go on
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StreamError::Decode { .. })
    }
}

/// Output format for decoded records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One `TS=... <tag> ...` line per record
    #[default]
    Text,
    /// One JSON object per record
    Json,
}

/// Rendering configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Emit an empty line before every header record
    pub blank_line_before_header: bool,
    pub format: OutputFormat,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            blank_line_before_header: true,
            format: OutputFormat::Text,
        }
    }
}

/// Iterator over the records of a line-oriented input
///
/// Blank lines are skipped. Each remaining line yields exactly one item; a
/// decode failure is returned as `StreamError::Decode` and the next call
/// continues with the following line.
pub struct RecordStream<R> {
    reader: R,
    decoder: FelixDecoder,
    line_number: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> RecordStream<R> {
    pub fn new(reader: R, decoder: FelixDecoder) -> Self {
        Self {
            reader,
            decoder,
            line_number: 0,
            buf: Vec::new(),
        }
    }

    /// 1-based number of the last line read
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl<R: BufRead> Iterator for RecordStream<R> {
    type Item = Result<DecodedRecord, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.line_number += 1;

            // A line with bad bytes loses only itself
            let result = match std::str::from_utf8(&self.buf) {
                Ok(text) => {
                    let line = text.trim();
                    if line.is_empty() {
                        continue;
                    }
                    self.decoder.decode(line)
                }
                Err(e) => Err(DecodeError::InvalidEncoding {
                    offset: e.valid_up_to(),
                }),
            };

            return Some(result.map_err(|source| StreamError::Decode {
                line: self.line_number,
                source,
            }));
        }
    }
}

/// Writes decoded records in the configured format
#[derive(Debug, Clone, Default)]
pub struct RecordWriter {
    config: RenderConfig,
}

impl RecordWriter {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn write_record<W: Write>(
        &self,
        out: &mut W,
        rec: &DecodedRecord,
    ) -> Result<(), StreamError> {
        match self.config.format {
            OutputFormat::Text => {
                if self.config.blank_line_before_header && rec.is_header() {
                    writeln!(out)?;
                }
                writeln!(out, "{}", rec)?;
            }
            OutputFormat::Json => {
                serde_json::to_writer(&mut *out, rec)?;
                writeln!(out)?;
            }
        }
        Ok(())
    }
}

/// Decode every line of `input` and write the rendered records to `out`
///
/// Bad lines are logged, counted and skipped. Only I/O and serialization
/// failures end the stream early.
pub fn decode_all<R: BufRead, W: Write>(
    input: R,
    decoder: FelixDecoder,
    writer: &RecordWriter,
    out: &mut W,
) -> Result<StreamStats, StreamError> {
    let mut stats = StreamStats::new();
    let mut tracker = BlockTracker::new();

    for item in RecordStream::new(input, decoder) {
        stats.lines += 1;
        match item {
            Ok(rec) => {
                stats.record(&rec);
                if tracker.observe(&rec).is_some() {
                    stats.sequence_warnings += 1;
                }
                writer.write_record(out, &rec)?;
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "Skipping record");
                if let StreamError::Decode { source, .. } = &e {
                    stats.record_error(source);
                }
            }
            Err(e) => return Err(e),
        }
    }
    out.flush()?;

    if let Some(open) = tracker.open_block() {
        debug!(evn = open.evn, "Stream ended inside an open block");
    }
    info!(
        lines = stats.lines,
        decoded = stats.decoded,
        malformed = stats.malformed,
        rejected = stats.rejected,
        "Stream finished"
    );
    Ok(stats)
}
