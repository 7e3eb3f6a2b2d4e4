//! Decoded record model: one struct per line variant, unified under [`Record`].
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordKind {
    #[serde(rename = "L0")]
    RdhL0,
    #[serde(rename = "L1")]
    RdhL1,
    #[serde(rename = "TRG")]
    Trg,
    #[serde(rename = "DATA")]
    Data,
    #[serde(rename = "UNDEFINED")]
    Undefined,
}

impl RecordKind {
    /// Every kind, in histogram display order.
    pub const ALL: [RecordKind; 5] = [
        RecordKind::RdhL0,
        RecordKind::RdhL1,
        RecordKind::Trg,
        RecordKind::Data,
        RecordKind::Undefined,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            RecordKind::RdhL0 => "L0",
            RecordKind::RdhL1 => "L1",
            RecordKind::Trg => "TRG",
            RecordKind::Data => "DATA",
            RecordKind::Undefined => "UNDEFINED",
        }
    }

    /// Dense slot used by histogram counters.
    pub(crate) const fn slot(self) -> usize {
        match self {
            RecordKind::RdhL0 => 0,
            RecordKind::RdhL1 => 1,
            RecordKind::Trg => 2,
            RecordKind::Data => 3,
            RecordKind::Undefined => 4,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A decoded scalar. The variant keeps the on-disk width so hex rendering
/// can pad to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

impl FieldValue {
    pub fn as_u64(self) -> u64 {
        match self {
            FieldValue::U8(v) => v as u64,
            FieldValue::U16(v) => v as u64,
            FieldValue::U32(v) => v as u64,
            FieldValue::U64(v) => v,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u64())
    }
}

impl fmt::LowerHex for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            FieldValue::U8(v) => write!(f, "{v:#04x}"),
            FieldValue::U16(v) => write!(f, "{v:#06x}"),
            FieldValue::U32(v) => write!(f, "{v:#010x}"),
            FieldValue::U64(v) => write!(f, "{v:#018x}"),
        }
    }
}

/// RDH word 0 (`L0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RdhL0 {
    pub header_version: u8,
    pub header_size: u8,
    pub fee_id: u16,
    pub priority_bit: u8,
    pub system_id: u8,
    pub reserved0: u16,
    pub offset_new_packet: u16,
    pub memory_size: u16,
    pub link_id: u8,
    pub packet_counter: u8,
    pub cru_id: u16,     // 12 bits
    pub dw: u8,          // 4 bits
    pub bc: u16,         // 12 bits
    pub reserved1: u32,  // 20 bits
    pub orbit: u32,
    pub data_format: u8,
    pub reserved2: u32,  // 24 bits
    pub reserved3: u32,
}

/// RDH word 1 (`L1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RdhL1 {
    pub trg_type: u32,
    pub hb_packet_counter: u16,
    pub stop_bit: u8,
    pub reserved0: u8,
    pub reserved1: u32,
    pub reserved2: u32,
    pub detector_field: u32,
    pub par_bit: u16,
    pub reserved3: u16,
    pub reserved4: u32,
    pub reserved5: u32,
}

/// Payload line carrying six 32-bit data words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLine {
    pub header_type: u8, // 0xAC
    pub header_vldb_id: u8,
    pub bx_cnt: u16,
    pub ob_cnt: u16,
    pub reserved0: u16,
    pub data_words: [u32; 6],
}

/// Trigger line (`TRG`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrgLine {
    pub header_type: u32, // low byte 0xBB
    pub bx_cnt: u64,
    pub ob_cnt: u64,
    pub reserved0: u32,
    pub reserved1: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    RdhL0(RdhL0),
    RdhL1(RdhL1),
    Trg(TrgLine),
    Data(DataLine),
    Undefined,
}

const DATA_WORD_NAMES: [&str; 6] = [
    "data_word0",
    "data_word1",
    "data_word2",
    "data_word3",
    "data_word4",
    "data_word5",
];

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::RdhL0(_) => RecordKind::RdhL0,
            Record::RdhL1(_) => RecordKind::RdhL1,
            Record::Trg(_) => RecordKind::Trg,
            Record::Data(_) => RecordKind::Data,
            Record::Undefined => RecordKind::Undefined,
        }
    }

    pub fn label(&self) -> &'static str {
        self.kind().label()
    }

    /// Ordered name/value listing in on-disk order. Empty for undefined lines.
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        use FieldValue::*;
        match self {
            Record::RdhL0(r) => vec![
                ("header_version", U8(r.header_version)),
                ("header_size", U8(r.header_size)),
                ("fee_id", U16(r.fee_id)),
                ("priority_bit", U8(r.priority_bit)),
                ("system_id", U8(r.system_id)),
                ("reserved0", U16(r.reserved0)),
                ("offset_new_packet", U16(r.offset_new_packet)),
                ("memory_size", U16(r.memory_size)),
                ("link_id", U8(r.link_id)),
                ("packet_counter", U8(r.packet_counter)),
                ("cru_id", U16(r.cru_id)),
                ("dw", U8(r.dw)),
                ("bc", U16(r.bc)),
                ("reserved1", U32(r.reserved1)),
                ("orbit", U32(r.orbit)),
                ("data_format", U8(r.data_format)),
                ("reserved2", U32(r.reserved2)),
                ("reserved3", U32(r.reserved3)),
            ],
            Record::RdhL1(r) => vec![
                ("trg_type", U32(r.trg_type)),
                ("hb_packet_counter", U16(r.hb_packet_counter)),
                ("stop_bit", U8(r.stop_bit)),
                ("reserved0", U8(r.reserved0)),
                ("reserved1", U32(r.reserved1)),
                ("reserved2", U32(r.reserved2)),
                ("detector_field", U32(r.detector_field)),
                ("par_bit", U16(r.par_bit)),
                ("reserved3", U16(r.reserved3)),
                ("reserved4", U32(r.reserved4)),
                ("reserved5", U32(r.reserved5)),
            ],
            Record::Data(r) => {
                let mut out = vec![
                    ("header_type", U8(r.header_type)),
                    ("header_vldb_id", U8(r.header_vldb_id)),
                    ("bx_cnt", U16(r.bx_cnt)),
                    ("ob_cnt", U16(r.ob_cnt)),
                    ("reserved0", U16(r.reserved0)),
                ];
                out.extend(DATA_WORD_NAMES.iter().zip(r.data_words).map(|(n, w)| (*n, U32(w))));
                out
            }
            Record::Trg(r) => vec![
                ("header_type", U32(r.header_type)),
                ("bx_cnt", U64(r.bx_cnt)),
                ("ob_cnt", U64(r.ob_cnt)),
                ("reserved0", U32(r.reserved0)),
                ("reserved1", U64(r.reserved1)),
            ],
            Record::Undefined => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_match_histogram_keys() {
        let labels: Vec<_> = RecordKind::ALL.iter().map(|k| k.label()).collect();
        assert_eq!(labels, ["L0", "L1", "TRG", "DATA", "UNDEFINED"]);
        for (i, k) in RecordKind::ALL.iter().enumerate() {
            assert_eq!(k.slot(), i);
        }
    }

    #[test]
    fn hex_pads_to_field_width() {
        assert_eq!(format!("{:x}", FieldValue::U8(0xac)), "0xac");
        assert_eq!(format!("{:x}", FieldValue::U16(0x7)), "0x0007");
        assert_eq!(format!("{:x}", FieldValue::U32(0xbbbb)), "0x0000bbbb");
        assert_eq!(FieldValue::U64(42).to_string(), "42");
    }

    #[test]
    fn data_fields_are_listed_in_layout_order() {
        let r = Record::Data(DataLine {
            header_type: 0xac,
            header_vldb_id: 1,
            bx_cnt: 2,
            ob_cnt: 3,
            reserved0: 0,
            data_words: [10, 11, 12, 13, 14, 15],
        });
        let fields = r.fields();
        assert_eq!(fields.len(), 11);
        assert_eq!(fields[0], ("header_type", FieldValue::U8(0xac)));
        assert_eq!(fields[5], ("data_word0", FieldValue::U32(10)));
        assert_eq!(fields[10], ("data_word5", FieldValue::U32(15)));
        assert!(Record::Undefined.fields().is_empty());
    }
}
