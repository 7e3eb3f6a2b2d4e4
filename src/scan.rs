//! Scan engine: whole-buffer counting and indexed decode over fixed strides.
//!
//! The buffer is borrowed for the duration of a call and never mutated, so
//! every method can run concurrently over the same mapping.
use crate::codec::{kind_of, RecordCodec};
use crate::config::FormatConfig;
use crate::error::{DecodeError, ScanError};
use crate::histogram::TypeHistogram;
use crate::record::{Record, RecordKind};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Records classified between two reads of the cancel flag.
pub const CANCEL_CHECK_STRIDE: usize = 1 << 16;

/// Result of a cancellable count. A cancelled scan never masquerades as a
/// complete one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Complete(TypeHistogram),
    Cancelled { partial: TypeHistogram, scanned: usize },
}

impl ScanOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, ScanOutcome::Complete(_))
    }

    pub fn histogram(&self) -> &TypeHistogram {
        match self {
            ScanOutcome::Complete(h) => h,
            ScanOutcome::Cancelled { partial, .. } => partial,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanEngine {
    codec: RecordCodec,
}

// Every chunk is exactly `record_size >= LAYOUT_SPAN` bytes, so byte 0 exists.
fn tally(buf: &[u8], record_size: usize) -> TypeHistogram {
    buf.chunks_exact(record_size).map(|rec| kind_of(rec[0])).collect()
}

impl ScanEngine {
    pub fn new(config: FormatConfig) -> Self {
        Self { codec: RecordCodec::new(config) }
    }

    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    pub fn record_size(&self) -> usize {
        self.codec.record_size()
    }

    /// Number of records in `buf`, failing on a partial trailing record.
    pub fn record_count(&self, buf: &[u8]) -> Result<usize, ScanError> {
        let record_size = self.record_size();
        let remainder = buf.len() % record_size;
        if remainder != 0 {
            warn!(len = buf.len(), record_size, remainder, "buffer is not record aligned");
            return Err(ScanError::TruncatedFile { len: buf.len(), record_size, remainder });
        }
        Ok(buf.len() / record_size)
    }

    /// Count records per kind in file order. Only the discriminator is read.
    pub fn count_by_type(&self, buf: &[u8]) -> Result<TypeHistogram, ScanError> {
        let count = self.record_count(buf)?;
        debug!(records = count, "counting records");
        let hist = tally(buf, self.record_size());
        debug!(records = hist.records(), undefined = hist.get(RecordKind::Undefined), "count finished");
        Ok(hist)
    }

    /// Count over `shards` record-aligned ranges on the current rayon pool.
    ///
    /// Produces the same histogram as [`count_by_type`](Self::count_by_type).
    pub fn count_by_type_sharded(&self, buf: &[u8], shards: usize) -> Result<TypeHistogram, ScanError> {
        let count = self.record_count(buf)?;
        let record_size = self.record_size();
        let shards = shards.clamp(1, count.max(1));
        if shards == 1 {
            return Ok(tally(buf, record_size));
        }
        let per_shard = count.div_ceil(shards) * record_size;
        debug!(records = count, shards, threads = rayon::current_num_threads(), "sharded count");

        Ok(buf
            .par_chunks(per_shard)
            .map(|part| tally(part, record_size))
            .reduce(TypeHistogram::new, |a, b| a + b))
    }

    /// Count while polling `cancel`; a raised flag yields a partial outcome.
    pub fn count_by_type_cancellable(&self, buf: &[u8], cancel: &AtomicBool) -> Result<ScanOutcome, ScanError> {
        self.count_until(buf, CANCEL_CHECK_STRIDE, || cancel.load(Ordering::Relaxed))
    }

    // `stop` is asked before every block of `stride` records.
    fn count_until<F>(&self, buf: &[u8], stride: usize, mut stop: F) -> Result<ScanOutcome, ScanError>
    where
        F: FnMut() -> bool,
    {
        self.record_count(buf)?;
        let record_size = self.record_size();
        let mut hist = TypeHistogram::new();
        let mut scanned = 0usize;
        for block in buf.chunks(stride.max(1).saturating_mul(record_size)) {
            if stop() {
                warn!(scanned, "count cancelled");
                return Ok(ScanOutcome::Cancelled { partial: hist, scanned });
            }
            hist += &tally(block, record_size);
            scanned += block.len() / record_size;
        }
        Ok(ScanOutcome::Complete(hist))
    }

    fn slot<'a>(&self, buf: &'a [u8], index: usize) -> Result<&'a [u8], ScanError> {
        let count = self.record_count(buf)?;
        if index >= count {
            return Err(ScanError::IndexOutOfRange { index, count });
        }
        let start = index * self.record_size();
        Ok(&buf[start..start + self.record_size()])
    }

    /// Fully decode the record at `index`.
    pub fn decode_at(&self, buf: &[u8], index: usize) -> Result<Record, ScanError> {
        let rec = self.slot(buf, index)?;
        Ok(self.codec.decode_record(rec)?)
    }

    /// Decode the first `n` records (fewer if the buffer is shorter).
    pub fn preview(&self, buf: &[u8], n: usize) -> Result<Vec<Record>, ScanError> {
        self.record_count(buf)?;
        buf.chunks_exact(self.record_size())
            .take(n)
            .map(|rec| self.codec.decode_record(rec).map_err(ScanError::from))
            .collect()
    }

    /// Lazily decode every record in file order.
    pub fn records<'a>(
        &'a self,
        buf: &'a [u8],
    ) -> Result<impl Iterator<Item = Result<(usize, Record), DecodeError>> + 'a, ScanError> {
        self.record_count(buf)?;
        Ok(buf
            .chunks_exact(self.record_size())
            .enumerate()
            .map(|(i, rec)| self.codec.decode_record(rec).map(|r| (i, r))))
    }
}
