//! Record codec: discriminator lookup and per-variant field extraction.
//!
//! The discriminator is byte 0 of each record (the low byte of the
//! little-endian header word). Classification is a single table load so the
//! bulk counter never branches on the variant set.
use crate::config::{FormatConfig, LAYOUT_SPAN};
use crate::error::DecodeError;
use crate::record::{DataLine, RdhL0, RdhL1, Record, RecordKind, TrgLine};

pub const DISC_DATA: u8 = 0xAC;
pub const DISC_TRG: u8 = 0xBB;
pub const DISC_RDH_L0: u8 = 0x07;
pub const DISC_RDH_L1: u8 = 0x03;

static KIND_TABLE: [RecordKind; 256] = build_kind_table();

const fn build_kind_table() -> [RecordKind; 256] {
    let mut t = [RecordKind::Undefined; 256];
    t[DISC_DATA as usize] = RecordKind::Data;
    t[DISC_TRG as usize] = RecordKind::Trg;
    t[DISC_RDH_L0 as usize] = RecordKind::RdhL0;
    t[DISC_RDH_L1 as usize] = RecordKind::RdhL1;
    t
}

/// Kind for a raw discriminator byte.
#[inline]
pub fn kind_of(discriminator: u8) -> RecordKind {
    KIND_TABLE[discriminator as usize]
}

/// Classify a record by its first byte. An empty slice is `Undefined`; use
/// [`RecordCodec::classify`] when the slice length must be checked.
#[inline]
pub fn classify(record: &[u8]) -> RecordKind {
    match record.first() {
        Some(&b) => kind_of(b),
        None => RecordKind::Undefined,
    }
}

mod off_l0 {
    pub const HEADER_VERSION: usize = 0;
    pub const HEADER_SIZE: usize = 1;
    pub const FEE_ID: usize = 2;
    pub const PRIORITY_BIT: usize = 4;
    pub const SYSTEM_ID: usize = 5;
    pub const RESERVED0: usize = 6;
    pub const OFFSET_NEW_PACKET: usize = 8;
    pub const MEMORY_SIZE: usize = 10;
    pub const LINK_ID: usize = 12;
    pub const PACKET_COUNTER: usize = 13;
    pub const CRU_ID: usize = 14; // low 12 bits
    pub const DW: usize = 15; // high nibble
    pub const BC: usize = 16; // low 12 bits
    pub const RESERVED1: usize = 17; // bits 4..24 of the u32
    pub const ORBIT: usize = 20;
    pub const DATA_FORMAT: usize = 24;
    pub const RESERVED2: usize = 25; // low 24 bits
    pub const RESERVED3: usize = 28;
}

mod off_l1 {
    pub const TRG_TYPE: usize = 0;
    pub const HB_PACKET_COUNTER: usize = 4;
    pub const STOP_BIT: usize = 6;
    pub const RESERVED0: usize = 7;
    pub const RESERVED1: usize = 8;
    pub const RESERVED2: usize = 12;
    pub const DETECTOR_FIELD: usize = 16;
    pub const PAR_BIT: usize = 20;
    pub const RESERVED3: usize = 22;
    pub const RESERVED4: usize = 24;
    pub const RESERVED5: usize = 28;
}

mod off_data {
    pub const HEADER_TYPE: usize = 0;
    pub const HEADER_VLDB_ID: usize = 1;
    pub const BX_CNT: usize = 2;
    pub const OB_CNT: usize = 4;
    pub const RESERVED0: usize = 6;
    pub const DATA_WORD0: usize = 8;
}

mod off_trg {
    pub const HEADER_TYPE: usize = 0;
    pub const BX_CNT: usize = 4;
    pub const OB_CNT: usize = 12;
    pub const RESERVED0: usize = 20;
    pub const RESERVED1: usize = 24;
}

// Callers have already checked `buf.len() >= LAYOUT_SPAN`; every offset
// below plus its width stays within that span.
fn read_u8(buf: &[u8], offset: usize) -> u8 {
    buf[offset]
}

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    let mut out = [0u8; 2];
    out.copy_from_slice(&buf[offset..offset + 2]);
    u16::from_le_bytes(out)
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(out)
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(out)
}

fn parse_rdh_l0(line: &[u8]) -> RdhL0 {
    use off_l0::*;
    RdhL0 {
        header_version: read_u8(line, HEADER_VERSION),
        header_size: read_u8(line, HEADER_SIZE),
        fee_id: read_u16(line, FEE_ID),
        priority_bit: read_u8(line, PRIORITY_BIT),
        system_id: read_u8(line, SYSTEM_ID),
        reserved0: read_u16(line, RESERVED0),
        offset_new_packet: read_u16(line, OFFSET_NEW_PACKET),
        memory_size: read_u16(line, MEMORY_SIZE),
        link_id: read_u8(line, LINK_ID),
        packet_counter: read_u8(line, PACKET_COUNTER),
        cru_id: read_u16(line, CRU_ID) & 0x0FFF,
        dw: (read_u8(line, DW) >> 4) & 0x0F,
        bc: read_u16(line, BC) & 0x0FFF,
        reserved1: (read_u32(line, RESERVED1) & 0x00FF_FFF0) >> 4,
        orbit: read_u32(line, ORBIT),
        data_format: read_u8(line, DATA_FORMAT),
        reserved2: read_u32(line, RESERVED2) & 0x00FF_FFFF,
        reserved3: read_u32(line, RESERVED3),
    }
}

fn parse_rdh_l1(line: &[u8]) -> RdhL1 {
    use off_l1::*;
    RdhL1 {
        trg_type: read_u32(line, TRG_TYPE),
        hb_packet_counter: read_u16(line, HB_PACKET_COUNTER),
        stop_bit: read_u8(line, STOP_BIT),
        reserved0: read_u8(line, RESERVED0),
        reserved1: read_u32(line, RESERVED1),
        reserved2: read_u32(line, RESERVED2),
        detector_field: read_u32(line, DETECTOR_FIELD),
        par_bit: read_u16(line, PAR_BIT),
        reserved3: read_u16(line, RESERVED3),
        reserved4: read_u32(line, RESERVED4),
        reserved5: read_u32(line, RESERVED5),
    }
}

fn parse_data_line(line: &[u8]) -> DataLine {
    use off_data::*;
    let mut data_words = [0u32; 6];
    for (i, w) in data_words.iter_mut().enumerate() {
        *w = read_u32(line, DATA_WORD0 + 4 * i);
    }
    DataLine {
        header_type: read_u8(line, HEADER_TYPE),
        header_vldb_id: read_u8(line, HEADER_VLDB_ID),
        bx_cnt: read_u16(line, BX_CNT),
        ob_cnt: read_u16(line, OB_CNT),
        reserved0: read_u16(line, RESERVED0),
        data_words,
    }
}

fn parse_trg_line(line: &[u8]) -> TrgLine {
    use off_trg::*;
    TrgLine {
        header_type: read_u32(line, HEADER_TYPE),
        bx_cnt: read_u64(line, BX_CNT),
        ob_cnt: read_u64(line, OB_CNT),
        reserved0: read_u32(line, RESERVED0),
        reserved1: read_u64(line, RESERVED1),
    }
}

/// Stateless codec bound to one record size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCodec {
    config: FormatConfig,
}

impl RecordCodec {
    pub fn new(config: FormatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> FormatConfig {
        self.config
    }

    pub fn record_size(&self) -> usize {
        self.config.record_size()
    }

    fn check_len(&self, record: &[u8]) -> Result<(), DecodeError> {
        let need = self.record_size();
        if record.len() < need {
            return Err(DecodeError::ShortRecord { need, have: record.len() });
        }
        Ok(())
    }

    /// Classify one record slot, rejecting slices shorter than a record.
    pub fn classify(&self, record: &[u8]) -> Result<RecordKind, DecodeError> {
        self.check_len(record)?;
        Ok(classify(record))
    }

    /// Decode `record` as `kind`.
    ///
    /// The kind is re-derived from the discriminator; a mismatch is reported
    /// as [`DecodeError::InconsistentType`] rather than decoding the bytes
    /// under the wrong layout.
    pub fn decode(&self, record: &[u8], kind: RecordKind) -> Result<Record, DecodeError> {
        self.check_len(record)?;
        let found = classify(record);
        if found != kind {
            return Err(DecodeError::InconsistentType { expected: kind, found });
        }
        let line = &record[..LAYOUT_SPAN];
        Ok(match kind {
            RecordKind::RdhL0 => Record::RdhL0(parse_rdh_l0(line)),
            RecordKind::RdhL1 => Record::RdhL1(parse_rdh_l1(line)),
            RecordKind::Trg => Record::Trg(parse_trg_line(line)),
            RecordKind::Data => Record::Data(parse_data_line(line)),
            RecordKind::Undefined => Record::Undefined,
        })
    }

    /// Classify and decode in one step.
    pub fn decode_record(&self, record: &[u8]) -> Result<Record, DecodeError> {
        let kind = self.classify(record)?;
        self.decode(record, kind)
    }
}
