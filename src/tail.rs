//! Follow a capture file while the DAQ is still writing it.
use std::fs::{self, File, Metadata};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct TailOptions {
    /// Largest slice handed to the callback at once.
    pub read_chunk: usize,
    /// Sleep between size checks when no new bytes are available.
    pub poll: Duration,
    /// Return once no bytes arrived for this long. `None` follows forever.
    pub inactivity_timeout: Option<Duration>,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            read_chunk: 1 << 20,
            poll: Duration::from_millis(50),
            inactivity_timeout: None,
        }
    }
}

/// What the follower hands to its callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailEvent<'a> {
    /// Next bytes of the file, contiguous with the previous `Bytes` event.
    Bytes(&'a [u8]),
    /// The file was truncated or replaced. Bytes that follow start at offset 0
    /// of the new file, so any partial record held by the consumer is stale.
    Reopened,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailStop {
    Inactive,
    Requested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailSummary {
    pub bytes: u64,
    /// Times the file was reopened after rotation or truncation.
    pub reopened: u32,
    pub stop: TailStop,
}

#[cfg(unix)]
fn identity(meta: &Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn identity(_meta: &Metadata) -> Option<(u64, u64)> {
    None
}

/// Read `path` from the start and keep reading as it grows, passing every
/// new byte range to `on_event`.
///
/// A shrinking file or a new inode at `path` restarts from offset 0 on the
/// reopened file, announced by [`TailEvent::Reopened`] before its first bytes.
/// Reopening does not count as activity for the inactivity timeout.
pub fn tail_growing_file<F>(
    path: &Path,
    opts: &TailOptions,
    stop: &AtomicBool,
    mut on_event: F,
) -> io::Result<TailSummary>
where
    F: FnMut(TailEvent<'_>),
{
    let chunk = opts.read_chunk.max(1);
    let poll = if opts.poll.is_zero() { Duration::from_millis(50) } else { opts.poll };

    let mut file = File::open(path)?;
    let mut ident = identity(&file.metadata()?);
    let mut buf = vec![0u8; chunk];
    let mut pos = 0u64;
    let mut bytes = 0u64;
    let mut reopened = 0u32;
    let mut last_activity = Instant::now();

    let summary = |bytes, reopened, stop| TailSummary { bytes, reopened, stop };

    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(summary(bytes, reopened, TailStop::Requested));
        }

        match fs::metadata(path) {
            Ok(meta) => {
                if identity(&meta) != ident || meta.len() < pos {
                    info!(path = %path.display(), pos, len = meta.len(), "file rotated or truncated; reopening");
                    file = File::open(path)?;
                    ident = identity(&file.metadata()?);
                    pos = 0;
                    reopened += 1;
                    on_event(TailEvent::Reopened);
                }
                if meta.len() > pos {
                    let want = (meta.len() - pos).min(chunk as u64) as usize;
                    file.seek(SeekFrom::Start(pos))?;
                    let n = file.read(&mut buf[..want])?;
                    if n > 0 {
                        pos += n as u64;
                        bytes += n as u64;
                        last_activity = Instant::now();
                        on_event(TailEvent::Bytes(&buf[..n]));
                        continue;
                    }
                }
            }
            // the writer may be between unlink and create
            Err(e) => debug!(path = %path.display(), error = %e, "stat failed"),
        }

        if let Some(timeout) = opts.inactivity_timeout {
            if last_activity.elapsed() > timeout {
                return Ok(summary(bytes, reopened, TailStop::Inactive));
            }
        }
        thread::sleep(poll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn quick() -> TailOptions {
        TailOptions {
            read_chunk: 7,
            poll: Duration::from_millis(5),
            inactivity_timeout: Some(Duration::from_millis(100)),
        }
    }

    #[test]
    fn reads_existing_bytes_then_goes_idle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cap.bin");
        fs::write(&path, [1u8; 20]).unwrap();

        let mut got = Vec::new();
        let stop = AtomicBool::new(false);
        let s = tail_growing_file(&path, &quick(), &stop, |ev| match ev {
            TailEvent::Bytes(b) => {
                assert!(b.len() <= 7);
                got.extend_from_slice(b);
            }
            TailEvent::Reopened => panic!("unexpected reopen"),
        })
        .unwrap();
        assert_eq!(got, vec![1u8; 20]);
        assert_eq!(s, TailSummary { bytes: 20, reopened: 0, stop: TailStop::Inactive });
    }

    #[test]
    fn picks_up_appended_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grow.bin");
        fs::write(&path, [0xACu8; 32]).unwrap();

        let writer_path = path.clone();
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            let mut f = fs::OpenOptions::new().append(true).open(writer_path).unwrap();
            f.write_all(&[0xBBu8; 32]).unwrap();
        });

        let mut total = 0usize;
        let stop = AtomicBool::new(false);
        let s = tail_growing_file(&path, &quick(), &stop, |ev| {
            if let TailEvent::Bytes(b) = ev {
                total += b.len();
            }
        })
        .unwrap();
        writer.join().unwrap();
        assert_eq!(total, 64);
        assert_eq!(s, TailSummary { bytes: 64, reopened: 0, stop: TailStop::Inactive });
    }

    // Collects delivered bytes, starting a new segment on every reopen.
    fn follow_segments(path: &Path, opts: &TailOptions) -> (Vec<Vec<u8>>, TailSummary) {
        let stop = AtomicBool::new(false);
        let mut segments = vec![Vec::new()];
        let s = tail_growing_file(path, opts, &stop, |ev| match ev {
            TailEvent::Bytes(b) => segments.last_mut().unwrap().extend_from_slice(b),
            TailEvent::Reopened => segments.push(Vec::new()),
        })
        .unwrap();
        (segments, s)
    }

    #[test]
    fn truncated_file_is_reread_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trunc.bin");
        fs::write(&path, [0xACu8; 64]).unwrap();

        let writer_path = path.clone();
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            fs::write(writer_path, [0xBBu8; 16]).unwrap();
        });

        let opts = TailOptions { read_chunk: 1 << 10, ..quick() };
        let (segments, s) = follow_segments(&path, &opts);
        writer.join().unwrap();
        assert_eq!(s, TailSummary { bytes: 80, reopened: 1, stop: TailStop::Inactive });
        assert_eq!(segments, vec![vec![0xACu8; 64], vec![0xBBu8; 16]]);
    }

    #[cfg(unix)]
    #[test]
    fn renamed_over_path_is_followed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rot.bin");
        fs::write(&path, [0xACu8; 32]).unwrap();

        // the replacement is longer, so only the inode change reveals it
        let next = dir.path().join("rot.bin.next");
        let writer_path = path.clone();
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            fs::write(&next, [0xBBu8; 96]).unwrap();
            fs::rename(&next, writer_path).unwrap();
        });

        let opts = TailOptions { read_chunk: 1 << 10, ..quick() };
        let (segments, s) = follow_segments(&path, &opts);
        writer.join().unwrap();
        assert_eq!(s, TailSummary { bytes: 128, reopened: 1, stop: TailStop::Inactive });
        assert_eq!(segments, vec![vec![0xACu8; 32], vec![0xBBu8; 96]]);
    }

    #[test]
    fn stop_flag_ends_follow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stop.bin");
        fs::write(&path, b"").unwrap();
        let stop = AtomicBool::new(true);
        let opts = TailOptions { inactivity_timeout: None, ..quick() };
        let s = tail_growing_file(&path, &opts, &stop, |_| {}).unwrap();
        assert_eq!(s.stop, TailStop::Requested);
        assert_eq!(s.bytes, 0);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let stop = AtomicBool::new(false);
        let err = tail_growing_file(&dir.path().join("nope"), &quick(), &stop, |_| {}).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
