//! Record framing configuration.
//!
//! The record size is passed explicitly to the codec and the scan engine so
//! that several format versions can coexist in one process.
use crate::error::ConfigError;

/// Stride of one record in the DMA log files produced by the readout chain.
pub const DEFAULT_RECORD_SIZE: usize = 32;

/// Bytes of each record covered by the variant layouts. Bytes past this
/// offset in a wider slot are padding and never decoded.
pub const LAYOUT_SPAN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatConfig {
    record_size: usize,
}

impl FormatConfig {
    /// Validate and build a configuration for `record_size`-byte records.
    pub fn new(record_size: usize) -> Result<Self, ConfigError> {
        if record_size == 0 {
            return Err(ConfigError::ZeroRecordSize);
        }
        if record_size < LAYOUT_SPAN {
            return Err(ConfigError::RecordTooSmall { size: record_size, min: LAYOUT_SPAN });
        }
        Ok(Self { record_size })
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self { record_size: DEFAULT_RECORD_SIZE }
    }
}
