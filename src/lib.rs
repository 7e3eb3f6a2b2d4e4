//! Fixed-stride DMA log decoder.
//!
//! This crate provides the core types and logic used by the `binparse`
//! counter/preview binary and the `bpx-tail` follower:
//!
//! - `record`: decoded line variants (RDH L0/L1, trigger, data) and the
//!   generic field listing used for display
//! - `codec`: discriminator lookup and per-variant field extraction
//! - `scan`: whole-buffer counting (sequential, sharded, cancellable) and
//!   indexed decode
//! - `stream`: push parser for chunked input with partial-record carry-over
//! - `tail`: follow a growing capture file
//!
//! The library works on caller-supplied byte slices only; opening and
//! mapping files is left to the binaries.
pub mod codec;
pub mod config;
pub mod error;
pub mod histogram;
pub mod record;
pub mod scan;
pub mod stream;
pub mod tail;

pub use codec::{classify, RecordCodec};
pub use config::{FormatConfig, DEFAULT_RECORD_SIZE};
pub use error::{ConfigError, DecodeError, ScanError};
pub use histogram::TypeHistogram;
pub use record::{FieldValue, Record, RecordKind};
pub use scan::{ScanEngine, ScanOutcome};
pub use stream::{RecordSink, StreamParser};
