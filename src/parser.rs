// Tabular decode - delimited text into raw field tuples
// Lazy and single-pass: rows are pulled from the underlying stream one at a time.

use crate::error::{PipelineError, PipelineResult};
use crate::record::{RawRow, FIELD_COUNT};
use csv::{ReaderBuilder, StringRecord};
use std::io::{self, Read};

/// RecordParser - iterator of `RawRow` over a delimited payload
///
/// Construction consumes the header row and checks only its arity.
/// Iteration yields rows in file order and stops after the first error.
pub struct RecordParser<R: Read> {
    reader: csv::Reader<QuoteTracker<R>>,
    record: StringRecord,
    finished: bool,
}

impl<R: Read> RecordParser<R> {
    pub fn new(source: R) -> PipelineResult<Self> {
        Self::with_delimiter(source, b',')
    }

    pub fn with_delimiter(source: R, delimiter: u8) -> PipelineResult<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(QuoteTracker::new(source, delimiter));

        let mut header = StringRecord::new();
        match reader.read_record(&mut header) {
            Ok(true) => {}
            Ok(false) => {
                return Err(PipelineError::HeaderInvalid(
                    "payload has no header row".to_string(),
                ))
            }
            Err(e) => return Err(PipelineError::HeaderInvalid(e.to_string())),
        }

        if reader.is_done() && reader.get_ref().ended_inside_quotes() {
            return Err(PipelineError::HeaderInvalid(
                "unterminated quoted field".to_string(),
            ));
        }

        if header.len() != FIELD_COUNT {
            return Err(PipelineError::HeaderInvalid(format!(
                "expected {} columns, found {}",
                FIELD_COUNT,
                header.len()
            )));
        }

        Ok(RecordParser {
            reader,
            record: StringRecord::new(),
            finished: false,
        })
    }

    fn decode_current(&self) -> PipelineResult<RawRow> {
        let line = self.record.position().map(|p| p.line()).unwrap_or(0);

        // An open quote swallows the rest of the stream into the last record
        if self.reader.is_done() && self.reader.get_ref().ended_inside_quotes() {
            return Err(PipelineError::RowMalformed {
                line,
                reason: "unterminated quoted field".to_string(),
            });
        }

        if self.record.len() != FIELD_COUNT {
            return Err(PipelineError::RowMalformed {
                line,
                reason: format!(
                    "expected {} fields, found {}",
                    FIELD_COUNT,
                    self.record.len()
                ),
            });
        }

        let record = &self.record;
        Ok(RawRow {
            line,
            fields: std::array::from_fn(|i| record[i].to_string()),
        })
    }
}

impl<R: Read> Iterator for RecordParser<R> {
    type Item = PipelineResult<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let item = match self.reader.read_record(&mut self.record) {
            Ok(false) => {
                self.finished = true;
                return None;
            }
            Ok(true) => self.decode_current(),
            Err(e) => Err(PipelineError::RowMalformed {
                line: e.position().map(|p| p.line()).unwrap_or(0),
                reason: e.to_string(),
            }),
        };

        if item.is_err() {
            self.finished = true;
        }
        Some(item)
    }
}

// ============================================================================
// QUOTE TRACKING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Pass-through reader that follows RFC 4180 quoting over the raw bytes.
///
/// The csv reader accepts an unclosed quote and reads everything up to EOF
/// into that field. Once the stream is drained, `ended_inside_quotes` tells
/// whether that happened.
struct QuoteTracker<R> {
    inner: R,
    delimiter: u8,
    state: QuoteState,
}

impl<R: Read> QuoteTracker<R> {
    fn new(inner: R, delimiter: u8) -> Self {
        QuoteTracker {
            inner,
            delimiter,
            state: QuoteState::FieldStart,
        }
    }

    fn ended_inside_quotes(&self) -> bool {
        self.state == QuoteState::Quoted
    }

    fn advance(&mut self, byte: u8) {
        let boundary = byte == self.delimiter || byte == b'\n' || byte == b'\r';
        self.state = match (self.state, byte) {
            (QuoteState::Quoted, b'"') => QuoteState::QuoteInQuoted,
            (QuoteState::Quoted, _) => QuoteState::Quoted,
            // "" inside a quoted field is an escaped quote
            (QuoteState::QuoteInQuoted, b'"') => QuoteState::Quoted,
            (QuoteState::FieldStart, b'"') => QuoteState::Quoted,
            _ if boundary => QuoteState::FieldStart,
            _ => QuoteState::Unquoted,
        };
    }
}

impl<R: Read> Read for QuoteTracker<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        for &byte in &buf[..n] {
            self.advance(byte);
        }
        Ok(n)
    }
}
