//! Per-kind record counts.
use crate::record::RecordKind;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::ops::{Add, AddAssign};

/// Record counts for every [`RecordKind`], `Undefined` included.
///
/// Merging is key-wise addition, so shard results can be combined in any
/// order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeHistogram {
    counts: [u64; RecordKind::ALL.len()],
}

impl TypeHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&mut self, kind: RecordKind) {
        self.counts[kind.slot()] += 1;
    }

    pub fn get(&self, kind: RecordKind) -> u64 {
        self.counts[kind.slot()]
    }

    /// Total number of records counted.
    pub fn records(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn merge(&mut self, other: &TypeHistogram) {
        for (a, b) in self.counts.iter_mut().zip(other.counts) {
            *a += b;
        }
    }

    /// `(label, count)` pairs in display order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        RecordKind::ALL.iter().map(|k| (k.label(), self.get(*k)))
    }
}

impl AddAssign<&TypeHistogram> for TypeHistogram {
    fn add_assign(&mut self, rhs: &TypeHistogram) {
        self.merge(rhs);
    }
}

impl Add for TypeHistogram {
    type Output = TypeHistogram;

    fn add(mut self, rhs: TypeHistogram) -> TypeHistogram {
        self.merge(&rhs);
        self
    }
}

impl FromIterator<RecordKind> for TypeHistogram {
    fn from_iter<I: IntoIterator<Item = RecordKind>>(iter: I) -> Self {
        let mut h = TypeHistogram::new();
        for k in iter {
            TypeHistogram::add(&mut h, k);
        }
        h
    }
}

impl Serialize for TypeHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(RecordKind::ALL.len() + 1))?;
        for (label, count) in self.entries() {
            map.serialize_entry(label, &count)?;
        }
        map.serialize_entry("LINES", &self.records())?;
        map.end()
    }
}
