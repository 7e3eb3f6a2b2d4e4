//! Error types shared by the codec, scan engine and stream parser.
use crate::record::RecordKind;

/// Rejected [`FormatConfig`](crate::config::FormatConfig) values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("record size must be non-zero")]
    ZeroRecordSize,

    #[error("record size {size} is smaller than the {min}-byte record layout")]
    RecordTooSmall { size: usize, min: usize },
}

/// Failure to decode a single record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("short record: need {need} bytes, have {have}")]
    ShortRecord { need: usize, have: usize },

    #[error("record classified as {found} but decode requested {expected}")]
    InconsistentType { expected: RecordKind, found: RecordKind },
}

/// Buffer-level failures of the scan engine and stream parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error(
        "truncated file: {len} bytes is not a multiple of the {record_size}-byte record size ({remainder} trailing bytes)"
    )]
    TruncatedFile {
        len: usize,
        record_size: usize,
        remainder: usize,
    },

    #[error("record index {index} out of range ({count} records)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
