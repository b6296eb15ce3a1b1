//! Seekable read-only view over one captured snapshot.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use bytes::Bytes;
use tracekey_core::Timestamp;

use super::snapshot::Snapshot;

/// An `io::Read + io::Seek` view of a snapshot suffix.
///
/// The view is fixed when it is created: later writes to the cache publish
/// new snapshots and never change what an existing reader sees. Positions
/// are relative to the start of the view.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    snapshot: Arc<Snapshot>,
    start: u64,
    pos: u64,
}

impl SnapshotReader {
    /// View `snapshot` from absolute offset `start` to its end.
    pub fn new(snapshot: Arc<Snapshot>, start: u64) -> Self {
        let start = start.min(snapshot.len());
        Self {
            snapshot,
            start,
            pos: 0,
        }
    }

    /// View the whole snapshot.
    pub fn full(snapshot: Arc<Snapshot>) -> Self {
        Self::new(snapshot, 0)
    }

    /// Length of the view in bytes. Always a multiple of 20.
    pub fn len(&self) -> u64 {
        self.snapshot.len() - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current position within the view.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Freshness timestamp of the snapshot this view was taken from.
    pub fn last_modified(&self) -> Timestamp {
        self.snapshot.last_modified()
    }

    /// The whole view as one buffer, regardless of the current position.
    pub fn to_bytes(&self) -> Bytes {
        self.snapshot.slice_from(self.start)
    }
}

impl Read for SnapshotReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.len();
        if self.pos >= len || buf.is_empty() {
            return Ok(0);
        }
        let want = (len - self.pos).min(buf.len() as u64) as usize;
        let n = self.snapshot.copy_at(self.start + self.pos, &mut buf[..want]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for SnapshotReader {
    fn seek(&mut self, style: SeekFrom) -> io::Result<u64> {
        let (base, offset) = match style {
            SeekFrom::Start(n) => {
                self.pos = n;
                return Ok(n);
            }
            SeekFrom::End(n) => (self.len(), n),
            SeekFrom::Current(n) => (self.pos, n),
        };
        match base.checked_add_signed(offset) {
            Some(n) => {
                self.pos = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tracekey_core::{decode, DayBoundary, DiagnosisKey};

    fn snapshot_of(n: u8) -> Arc<Snapshot> {
        let ts = Utc.with_ymd_and_hms(2020, 6, 1, 8, 0, 0).unwrap();
        let boundary = DayBoundary::utc();
        let mut snapshot = Snapshot::empty();
        for i in 0..n {
            let key = DiagnosisKey::new([i; 16], i as u32);
            snapshot = snapshot.append(&[key], ts, &boundary, 64);
        }
        Arc::new(snapshot)
    }

    #[test]
    fn test_read_to_end_across_segments() {
        let mut reader = SnapshotReader::full(snapshot_of(4));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();

        assert_eq!(out.len(), 80);
        let keys = decode(&out).unwrap();
        assert_eq!(keys.len(), 4);
        assert_eq!(keys[3].interval_number, 3);
    }

    #[test]
    fn test_seek_end_reports_view_length() {
        let mut reader = SnapshotReader::new(snapshot_of(3), 20);
        assert_eq!(reader.seek(SeekFrom::End(0)).unwrap(), 40);
        assert_eq!(reader.len(), 40);
    }

    #[test]
    fn test_seek_then_read() {
        let mut reader = SnapshotReader::full(snapshot_of(3));
        reader.seek(SeekFrom::Start(40)).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(decode(&out).unwrap()[0].interval_number, 2);

        reader.seek(SeekFrom::Current(-20)).unwrap();
        assert_eq!(reader.position(), 40);
    }

    #[test]
    fn test_seek_before_start_is_error() {
        let mut reader = SnapshotReader::full(snapshot_of(1));
        let err = reader.seek(SeekFrom::End(-21)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_read_past_end_returns_zero() {
        let mut reader = SnapshotReader::full(snapshot_of(1));
        reader.seek(SeekFrom::Start(100)).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_start_clamped_to_length() {
        let reader = SnapshotReader::new(snapshot_of(1), 500);
        assert!(reader.is_empty());
        assert!(reader.to_bytes().is_empty());
    }

    #[test]
    fn test_to_bytes_ignores_position() {
        let mut reader = SnapshotReader::full(snapshot_of(2));
        reader.seek(SeekFrom::Start(30)).unwrap();
        assert_eq!(reader.to_bytes().len(), 40);
    }
}
