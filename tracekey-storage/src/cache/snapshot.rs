//! Immutable serialized view of the cached key set.
//!
//! A [`Snapshot`] is never mutated once published. Writers derive a new one
//! from the current value ([`Snapshot::append_encoded`]) or build one from
//! scratch ([`Snapshot::build`]); readers hold an `Arc<Snapshot>` for as long
//! as they need it.

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, NaiveDate};
use tracekey_core::{encode, encode_into, DayBoundary, DiagnosisKey, Timestamp, DIAGNOSIS_KEY_SIZE};

/// A contiguous run of encoded frames starting at `offset`.
#[derive(Debug, Clone)]
struct Segment {
    offset: u64,
    data: Bytes,
}

impl Segment {
    fn end(&self) -> u64 {
        self.offset + self.data.len() as u64
    }
}

/// Encoded keys plus the day index used to seek exports.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Ordered, non-overlapping, gap-free segments covering `0..len`.
    segments: Vec<Segment>,
    len: u64,
    /// Day -> first byte offset at or after which every key was uploaded on
    /// or after that day. Offsets are non-decreasing in day order.
    day_index: BTreeMap<NaiveDate, u64>,
    last_modified: Timestamp,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl Snapshot {
    /// The never-populated snapshot.
    pub fn empty() -> Self {
        Self {
            segments: Vec::new(),
            len: 0,
            day_index: BTreeMap::new(),
            last_modified: DateTime::UNIX_EPOCH,
        }
    }

    /// Serialize the full key set.
    ///
    /// Keys are laid out by upload time (stable, keys without one first) so
    /// that each indexed day starts a suffix of the buffer.
    pub fn build(keys: &[DiagnosisKey], last_modified: Timestamp, boundary: &DayBoundary) -> Self {
        let mut ordered: Vec<&DiagnosisKey> = keys.iter().collect();
        ordered.sort_by_key(|key| key.uploaded_at);

        let mut buf = BytesMut::with_capacity(keys.len() * DIAGNOSIS_KEY_SIZE);
        let mut day_index = BTreeMap::new();
        for key in ordered {
            if let Some(day) = key.uploaded_on(boundary) {
                day_index.entry(day).or_insert(buf.len() as u64);
            }
            encode_into(&mut buf, std::slice::from_ref(key));
        }

        let data = buf.freeze();
        let len = data.len() as u64;
        let segments = if data.is_empty() {
            Vec::new()
        } else {
            vec![Segment { offset: 0, data }]
        };

        Self {
            segments,
            len,
            day_index,
            last_modified,
        }
    }

    /// Derive a snapshot with `keys` appended.
    pub fn append(
        &self,
        keys: &[DiagnosisKey],
        uploaded_at: Timestamp,
        boundary: &DayBoundary,
        max_segments: usize,
    ) -> Self {
        self.append_encoded(encode(keys), uploaded_at, boundary, max_segments)
    }

    /// Derive a snapshot with already-encoded frames appended.
    ///
    /// Existing bytes are shared, not copied, until the segment count
    /// exceeds `max_segments` and the result is coalesced.
    pub fn append_encoded(
        &self,
        data: Bytes,
        uploaded_at: Timestamp,
        boundary: &DayBoundary,
        max_segments: usize,
    ) -> Self {
        debug_assert_eq!(data.len() % DIAGNOSIS_KEY_SIZE, 0);
        let mut next = self.clone();

        if !data.is_empty() {
            // An earlier, unindexed day stays covered by the next later entry.
            let day = boundary.truncate(uploaded_at);
            let is_latest_day = next
                .day_index
                .last_key_value()
                .map_or(true, |(last, _)| day > *last);
            if is_latest_day {
                next.day_index.insert(day, next.len);
            }

            let added = data.len() as u64;
            next.segments.push(Segment {
                offset: next.len,
                data,
            });
            next.len += added;
        }

        if uploaded_at > next.last_modified {
            next.last_modified = uploaded_at;
        }

        if next.segments.len() > max_segments.max(1) {
            next.coalesce();
        }

        next
    }

    fn coalesce(&mut self) {
        let mut buf = BytesMut::with_capacity(self.len as usize);
        for segment in &self.segments {
            buf.extend_from_slice(&segment.data);
        }
        tracing::debug!(
            segments = self.segments.len(),
            size = self.len,
            "Coalesced cache snapshot segments"
        );
        self.segments = vec![Segment {
            offset: 0,
            data: buf.freeze(),
        }];
    }

    /// Total encoded length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of keys held.
    pub fn key_count(&self) -> u64 {
        self.len / DIAGNOSIS_KEY_SIZE as u64
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn indexed_days(&self) -> usize {
        self.day_index.len()
    }

    /// Freshness timestamp reported to callers.
    pub fn last_modified(&self) -> Timestamp {
        self.last_modified
    }

    /// Offset of the first indexed day on or after `day`, or the end of the
    /// buffer when every indexed day is earlier.
    pub fn offset_since(&self, day: NaiveDate) -> u64 {
        self.day_index
            .range(day..)
            .next()
            .map_or(self.len, |(_, offset)| *offset)
    }

    /// Copy bytes starting at absolute offset `pos` into `out`.
    ///
    /// Returns the number of bytes copied, zero at or past the end.
    pub(crate) fn copy_at(&self, mut pos: u64, out: &mut [u8]) -> usize {
        let mut copied = 0;
        let mut idx = self.segments.partition_point(|s| s.end() <= pos);

        while copied < out.len() {
            let Some(segment) = self.segments.get(idx) else {
                break;
            };
            let start = (pos - segment.offset) as usize;
            let available = &segment.data[start..];
            let n = available.len().min(out.len() - copied);
            out[copied..copied + n].copy_from_slice(&available[..n]);
            copied += n;
            pos += n as u64;
            idx += 1;
        }

        copied
    }

    /// The bytes from `start` to the end.
    ///
    /// Zero-copy when the range lies in a single segment.
    pub(crate) fn slice_from(&self, start: u64) -> Bytes {
        if start >= self.len {
            return Bytes::new();
        }
        let idx = self.segments.partition_point(|s| s.end() <= start);
        if idx + 1 == self.segments.len() {
            let segment = &self.segments[idx];
            return segment.data.slice((start - segment.offset) as usize..);
        }

        let mut buf = vec![0u8; (self.len - start) as usize];
        let copied = self.copy_at(start, &mut buf);
        buf.truncate(copied);
        Bytes::from(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tracekey_core::decode;

    fn day(d: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2020, 6, d, 12, 0, 0).unwrap()
    }

    fn key(fill: u8, uploaded: Timestamp) -> DiagnosisKey {
        DiagnosisKey::new([fill; 16], fill as u32).with_uploaded_at(uploaded)
    }

    fn bytes_of(snapshot: &Snapshot) -> Vec<u8> {
        snapshot.slice_from(0).to_vec()
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Snapshot::empty();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.last_modified(), DateTime::UNIX_EPOCH);
        assert_eq!(snapshot.offset_since(day(1).date_naive()), 0);
    }

    #[test]
    fn test_build_orders_by_upload_and_indexes_days() {
        let boundary = DayBoundary::utc();
        let keys = vec![key(3, day(3)), key(1, day(1)), key(2, day(2)), key(4, day(1))];
        let snapshot = Snapshot::build(&keys, day(3), &boundary);

        assert_eq!(snapshot.len(), 80);
        assert_eq!(snapshot.indexed_days(), 3);
        let order: Vec<u8> = decode(&bytes_of(&snapshot))
            .unwrap()
            .iter()
            .map(|k| k.temporary_exposure_key[0])
            .collect();
        assert_eq!(order, vec![1, 4, 2, 3]);

        assert_eq!(snapshot.offset_since(day(1).date_naive()), 0);
        assert_eq!(snapshot.offset_since(day(2).date_naive()), 40);
        assert_eq!(snapshot.offset_since(day(3).date_naive()), 60);
        assert_eq!(snapshot.offset_since(day(4).date_naive()), 80);
    }

    #[test]
    fn test_missing_day_uses_next_later_entry() {
        let boundary = DayBoundary::utc();
        let keys = vec![key(1, day(1)), key(5, day(5))];
        let snapshot = Snapshot::build(&keys, day(5), &boundary);
        assert_eq!(snapshot.offset_since(day(3).date_naive()), 20);
    }

    #[test]
    fn test_append_shares_existing_bytes() {
        let boundary = DayBoundary::utc();
        let base = Snapshot::build(&[key(1, day(1))], day(1), &boundary);
        let next = base.append(&[key(2, day(2)), key(3, day(2))], day(2), &boundary, 64);

        assert_eq!(base.len(), 20);
        assert_eq!(next.len(), 60);
        assert_eq!(next.segment_count(), 2);
        assert_eq!(next.offset_since(day(2).date_naive()), 20);
        assert_eq!(next.last_modified(), day(2));
        assert_eq!(&bytes_of(&next)[..20], &bytes_of(&base)[..]);
    }

    #[test]
    fn test_append_same_day_keeps_first_offset() {
        let boundary = DayBoundary::utc();
        let base = Snapshot::build(&[key(1, day(2))], day(2), &boundary);
        let next = base.append(&[key(2, day(2))], day(2), &boundary, 64);
        assert_eq!(next.indexed_days(), 1);
        assert_eq!(next.offset_since(day(2).date_naive()), 0);
    }

    #[test]
    fn test_append_earlier_day_not_indexed() {
        let boundary = DayBoundary::utc();
        let base = Snapshot::build(&[key(1, day(3))], day(3), &boundary);
        let next = base.append(&[key(2, day(1))], day(1), &boundary, 64);

        assert_eq!(next.indexed_days(), 1);
        assert_eq!(next.last_modified(), day(3));
        // Still reachable from the earlier day.
        assert_eq!(next.offset_since(day(1).date_naive()), 0);
    }

    #[test]
    fn test_append_coalesces_past_limit() {
        let boundary = DayBoundary::utc();
        let mut snapshot = Snapshot::empty();
        for i in 0..5u8 {
            snapshot = snapshot.append(&[key(i, day(1))], day(1), &boundary, 3);
        }
        assert!(snapshot.segment_count() <= 3);
        assert_eq!(snapshot.key_count(), 5);
        let fills: Vec<u8> = decode(&bytes_of(&snapshot))
            .unwrap()
            .iter()
            .map(|k| k.temporary_exposure_key[0])
            .collect();
        assert_eq!(fills, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_copy_at_spans_segments() {
        let boundary = DayBoundary::utc();
        let snapshot = Snapshot::empty()
            .append(&[key(1, day(1))], day(1), &boundary, 64)
            .append(&[key(2, day(1))], day(1), &boundary, 64);

        let mut out = [0u8; 10];
        assert_eq!(snapshot.copy_at(15, &mut out), 10);
        // Last key byte and the big-endian interval of the first frame.
        assert_eq!(&out[..5], &[1, 0, 0, 0, 1]);
        assert_eq!(&out[5..], &[2u8; 5]);

        assert_eq!(snapshot.copy_at(40, &mut out), 0);
    }
}
