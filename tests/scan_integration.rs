use binparse::codec::classify;
use binparse::stream::{Discard, StreamParser};
use binparse::{FormatConfig, Record, RecordCodec, RecordKind, ScanEngine, ScanError, TypeHistogram};
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufWriter, Write};

const RS: usize = 32;

fn rdh_l0(orbit: u32) -> [u8; RS] {
    let mut b = [0u8; RS];
    b[0] = 0x07;
    b[1] = 64;
    b[20..24].copy_from_slice(&orbit.to_le_bytes());
    b
}

fn trg(bx: u64) -> [u8; RS] {
    let mut b = [0u8; RS];
    b[0..4].copy_from_slice(&0xBBBBu32.to_le_bytes());
    b[4..12].copy_from_slice(&bx.to_le_bytes());
    b
}

fn data(word0: u32) -> [u8; RS] {
    let mut b = [0u8; RS];
    b[0] = 0xAC;
    b[8..12].copy_from_slice(&word0.to_le_bytes());
    b
}

fn write_capture(records: &[[u8; RS]]) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dma.bin");
    let mut w = BufWriter::new(File::create(&path).unwrap());
    for r in records {
        w.write_all(r).unwrap();
    }
    w.flush().unwrap();
    drop(w);
    (dir, path)
}

fn map(path: &std::path::Path) -> Mmap {
    let f = File::open(path).unwrap();
    unsafe { Mmap::map(&f) }.unwrap()
}

#[test]
fn three_record_capture_counts_and_decodes() {
    let a = rdh_l0(1234);
    let (_dir, path) = write_capture(&[a, trg(9), a]);
    let mmap = map(&path);
    let engine = ScanEngine::default();

    let h = engine.count_by_type(&mmap).unwrap();
    assert_eq!(h.get(RecordKind::RdhL0), 2);
    assert_eq!(h.get(RecordKind::Trg), 1);
    assert_eq!(h.records(), 3);

    let first = engine.decode_at(&mmap, 0).unwrap();
    let last = engine.decode_at(&mmap, 2).unwrap();
    assert_eq!(first.kind(), RecordKind::RdhL0);
    assert_eq!(first, last);
    assert_eq!(first.fields(), last.fields());
    let Record::RdhL0(r) = first else { panic!("expected L0") };
    assert_eq!(r.orbit, 1234);
}

#[test]
fn decode_at_agrees_with_classify_and_is_idempotent() {
    let recs = [data(1), trg(2), rdh_l0(3), [0x5Au8; RS], data(5)];
    let buf: Vec<u8> = recs.concat();
    let engine = ScanEngine::default();
    for i in 0..recs.len() {
        let rec = engine.decode_at(&buf, i).unwrap();
        assert_eq!(rec.kind(), classify(&buf[i * RS..(i + 1) * RS]));
        assert_eq!(engine.decode_at(&buf, i).unwrap(), rec);
    }
    let undefined = engine.decode_at(&buf, 3).unwrap();
    assert_eq!(undefined, Record::Undefined);
    assert!(undefined.fields().is_empty());
}

#[test]
fn one_past_the_end_is_out_of_range() {
    let buf: Vec<u8> = [data(1), data(2)].concat();
    let err = ScanEngine::default().decode_at(&buf, buf.len() / RS).unwrap_err();
    assert_eq!(err, ScanError::IndexOutOfRange { index: 2, count: 2 });
}

#[test]
fn two_and_a_half_records_is_truncated() {
    let mut buf: Vec<u8> = [data(1), trg(2), data(3)].concat();
    buf.truncate(RS * 5 / 2);
    let engine = ScanEngine::default();
    assert!(matches!(
        engine.count_by_type(&buf),
        Err(ScanError::TruncatedFile { remainder: 16, record_size: RS, .. })
    ));
    assert!(matches!(engine.count_by_type_sharded(&buf, 4), Err(ScanError::TruncatedFile { .. })));
    assert!(matches!(engine.decode_at(&buf, 0), Err(ScanError::TruncatedFile { .. })));
}

#[test]
fn aligned_partitions_sum_to_full_count() {
    let recs: Vec<[u8; RS]> = (0..97u32)
        .map(|i| match i % 5 {
            0 => rdh_l0(i),
            1 => trg(i as u64),
            2 | 3 => data(i),
            _ => [i as u8 | 0x40; RS],
        })
        .collect();
    let buf: Vec<u8> = recs.concat();
    let engine = ScanEngine::default();
    let full = engine.count_by_type(&buf).unwrap();
    assert_eq!(full.records(), 97);

    for cuts in [vec![0, 97], vec![0, 1, 96, 97], vec![0, 10, 10, 50, 97], vec![0, 33, 66, 97]] {
        let mut merged = TypeHistogram::new();
        for w in cuts.windows(2) {
            let part = engine.count_by_type(&buf[w[0] * RS..w[1] * RS]).unwrap();
            merged.merge(&part);
        }
        assert_eq!(merged, full, "cuts={cuts:?}");
    }
}

#[test]
fn streamed_file_matches_mapped_count() {
    let recs: Vec<[u8; RS]> = (0..40u32).map(|i| if i % 3 == 0 { trg(i as u64) } else { data(i) }).collect();
    let (_dir, path) = write_capture(&recs);
    let mmap = map(&path);
    let expected = ScanEngine::default().count_by_type(&mmap).unwrap();

    let mut p = StreamParser::new(RecordCodec::default(), Discard);
    for part in mmap.chunks(100) {
        p.feed(part).unwrap();
    }
    let (hist, _) = p.finish().unwrap();
    assert_eq!(hist, expected);
}

#[test]
fn padded_stride_capture() {
    let cfg = FormatConfig::new(40).unwrap();
    let mut buf = Vec::new();
    for r in [data(7), trg(8)] {
        buf.extend_from_slice(&r);
        buf.extend_from_slice(&[0xEE; 8]);
    }
    let engine = ScanEngine::new(cfg);
    let h = engine.count_by_type(&buf).unwrap();
    assert_eq!(h.get(RecordKind::Data), 1);
    assert_eq!(h.get(RecordKind::Trg), 1);
    let Record::Trg(t) = engine.decode_at(&buf, 1).unwrap() else { panic!("expected TRG") };
    assert_eq!(t.bx_cnt, 8);
    // the default 32-byte stride cannot frame an 80-byte buffer of 40-byte lines
    assert_eq!(ScanEngine::default().count_by_type(&buf).unwrap_err(), ScanError::TruncatedFile {
        len: 80,
        record_size: 32,
        remainder: 16
    });
}
