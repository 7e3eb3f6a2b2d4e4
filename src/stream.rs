//! Push parser for byte streams that arrive in arbitrary chunk sizes.
//!
//! Bytes that do not complete a record are stashed and prefixed to the next
//! chunk, so record boundaries never depend on how the input was split.
use crate::codec::RecordCodec;
use crate::error::{DecodeError, ScanError};
use crate::histogram::TypeHistogram;
use crate::record::Record;

/// Receives each complete record in stream order.
pub trait RecordSink {
    fn on_record(&mut self, index: u64, record: &Record, raw: &[u8]);
}

impl<F> RecordSink for F
where
    F: FnMut(u64, &Record, &[u8]),
{
    fn on_record(&mut self, index: u64, record: &Record, raw: &[u8]) {
        self(index, record, raw)
    }
}

/// Sink that only keeps the running histogram.
#[derive(Debug, Default)]
pub struct Discard;

impl RecordSink for Discard {
    fn on_record(&mut self, _: u64, _: &Record, _: &[u8]) {}
}

pub struct StreamParser<S> {
    codec: RecordCodec,
    sink: S,
    stash: Vec<u8>,
    hist: TypeHistogram,
    seen: u64,
    bytes: u64,
}

impl<S: RecordSink> StreamParser<S> {
    pub fn new(codec: RecordCodec, sink: S) -> Self {
        Self {
            stash: Vec::with_capacity(codec.record_size()),
            codec,
            sink,
            hist: TypeHistogram::new(),
            seen: 0,
            bytes: 0,
        }
    }

    /// Consume `chunk`, emitting every record it completes.
    pub fn feed(&mut self, mut chunk: &[u8]) -> Result<(), DecodeError> {
        let record_size = self.codec.record_size();
        self.bytes += chunk.len() as u64;

        if !self.stash.is_empty() {
            let need = record_size - self.stash.len();
            if chunk.len() < need {
                self.stash.extend_from_slice(chunk);
                return Ok(());
            }
            self.stash.extend_from_slice(&chunk[..need]);
            chunk = &chunk[need..];
            let one = std::mem::take(&mut self.stash);
            self.emit(&one)?;
            self.stash = one;
            self.stash.clear();
        }

        let mut lines = chunk.chunks_exact(record_size);
        for line in &mut lines {
            self.emit(line)?;
        }
        self.stash.extend_from_slice(lines.remainder());
        Ok(())
    }

    fn emit(&mut self, line: &[u8]) -> Result<(), DecodeError> {
        let record = self.codec.decode_record(line)?;
        TypeHistogram::add(&mut self.hist, record.kind());
        self.sink.on_record(self.seen, &record, line);
        self.seen += 1;
        Ok(())
    }

    pub fn histogram(&self) -> &TypeHistogram {
        &self.hist
    }

    pub fn records_seen(&self) -> u64 {
        self.seen
    }

    pub fn bytes_fed(&self) -> u64 {
        self.bytes
    }

    /// Bytes waiting for the rest of their record.
    pub fn pending(&self) -> usize {
        self.stash.len()
    }

    /// Drop a stashed partial record so the next byte starts a new record.
    /// Returns the number of bytes discarded. Counts and the sink are kept.
    pub fn reset(&mut self) -> usize {
        let dropped = self.stash.len();
        self.stash.clear();
        dropped
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// End of stream. Leftover partial-record bytes are reported, not dropped.
    pub fn finish(self) -> Result<(TypeHistogram, S), ScanError> {
        if !self.stash.is_empty() {
            return Err(ScanError::TruncatedFile {
                len: self.bytes as usize,
                record_size: self.codec.record_size(),
                remainder: self.stash.len(),
            });
        }
        Ok((self.hist, self.sink))
    }
}
