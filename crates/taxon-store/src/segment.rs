// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fixed-size segments of slots and their file codec.
//!
//! ```text
//! i32 segment_index
//! repeat segment_size times:
//!     i32 length          (-1 = empty)
//!     [u8; length] blob
//! ```
//!
//! All integers are big endian. Encoding is byte-exact: decoding a file and
//! encoding the result reproduces the file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use bytes::{Buf, BufMut, BytesMut};

use crate::error::StoreError;

const EMPTY_SLOT: i32 = -1;

/// Blob held in a slot. The `Arc` identity is what compare-and-set compares.
pub(crate) type Blob = Arc<Vec<u8>>;

/// One resident segment: `segment_size` atomically swappable slots.
#[derive(Debug)]
pub(crate) struct Segment {
    index: usize,
    slots: Box<[ArcSwapOption<Vec<u8>>]>,
    dirty: AtomicBool,
}

impl Segment {
    pub(crate) fn empty(index: usize, segment_size: usize) -> Self {
        let slots = (0..segment_size).map(|_| ArcSwapOption::empty()).collect();
        Self {
            index,
            slots,
            dirty: AtomicBool::new(false),
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn slot(&self, offset: usize) -> &ArcSwapOption<Vec<u8>> {
        &self.slots[offset]
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clear the dirty flag, returning whether it was set.
    pub(crate) fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Number of populated slots.
    pub(crate) fn populated(&self) -> usize {
        self.slots.iter().filter(|s| s.load().is_some()).count()
    }

    /// Snapshot the segment into its file representation.
    pub(crate) fn encode(&self) -> Result<Vec<u8>, StoreError> {
        let mut buf = BytesMut::with_capacity(4 + self.slots.len() * 4);
        buf.put_i32(header_i32(self.index, self.index)?);
        for slot in self.slots.iter() {
            match slot.load_full() {
                Some(blob) => {
                    buf.put_i32(header_i32(self.index, blob.len())?);
                    buf.put_slice(&blob);
                }
                None => buf.put_i32(EMPTY_SLOT),
            }
        }
        Ok(buf.to_vec())
    }

    /// Parse a segment file image.
    pub(crate) fn decode(
        bytes: &[u8],
        expected_index: usize,
        segment_size: usize,
        path: &Path,
    ) -> Result<Self, StoreError> {
        let truncated = || StoreError::Truncated {
            path: path.to_path_buf(),
        };
        let mut cur = bytes;
        if cur.remaining() < 4 {
            return Err(truncated());
        }
        let found = cur.get_i32();
        if usize::try_from(found).ok() != Some(expected_index) {
            return Err(StoreError::SegmentMismatch {
                expected: expected_index,
                found: i64::from(found),
            });
        }

        let segment = Self::empty(expected_index, segment_size);
        for slot in segment.slots.iter() {
            if cur.remaining() < 4 {
                return Err(truncated());
            }
            let length = cur.get_i32();
            if length == EMPTY_SLOT {
                continue;
            }
            let len = usize::try_from(length).map_err(|_| StoreError::InvalidLength {
                path: path.to_path_buf(),
                length,
            })?;
            if cur.remaining() < len {
                return Err(truncated());
            }
            let blob = cur[..len].to_vec();
            cur.advance(len);
            slot.store(Some(Arc::new(blob)));
        }
        Ok(segment)
    }

    /// Load the segment stored at `path`.
    pub(crate) fn read_from(
        path: &Path,
        expected_index: usize,
        segment_size: usize,
    ) -> Result<Self, StoreError> {
        let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
        Self::decode(&bytes, expected_index, segment_size, path)
    }

    /// Persist the segment to `path` via a temporary file and rename, so a
    /// reader never observes a half-written segment.
    pub(crate) fn write_to(&self, path: &Path) -> Result<(), StoreError> {
        let bytes = self.encode()?;
        let tmp = temp_path(path);
        let mut file = fs::File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        file.write_all(&bytes)
            .and_then(|()| file.sync_all())
            .map_err(|e| StoreError::io(&tmp, e))?;
        drop(file);
        fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Segment index or slot length as a file header field.
fn header_i32(segment: usize, value: usize) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::HeaderOverflow { segment, value })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Segment {
        let seg = Segment::empty(3, 4);
        seg.slot(0).store(Some(Arc::new(vec![0, 0, 0, 1, 9, 9])));
        seg.slot(2).store(Some(Arc::new(vec![0, 0, 0, 2])));
        seg
    }

    #[test]
    fn encoding_matches_documented_layout() {
        let bytes = sample().encode().unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&3i32.to_be_bytes());
        expected.extend_from_slice(&6i32.to_be_bytes());
        expected.extend_from_slice(&[0, 0, 0, 1, 9, 9]);
        expected.extend_from_slice(&(-1i32).to_be_bytes());
        expected.extend_from_slice(&4i32.to_be_bytes());
        expected.extend_from_slice(&[0, 0, 0, 2]);
        expected.extend_from_slice(&(-1i32).to_be_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn decode_then_encode_is_byte_exact() {
        let bytes = sample().encode().unwrap();
        let decoded = Segment::decode(&bytes, 3, 4, Path::new("mem")).unwrap();
        assert_eq!(decoded.populated(), 2);
        assert_eq!(decoded.encode().unwrap(), bytes);
    }

    #[test]
    fn wrong_index_is_rejected() {
        let bytes = sample().encode().unwrap();
        let err = Segment::decode(&bytes, 4, 4, Path::new("mem")).unwrap_err();
        assert!(matches!(
            err,
            StoreError::SegmentMismatch {
                expected: 4,
                found: 3
            }
        ));
    }

    #[test]
    fn truncated_file_is_rejected() {
        let bytes = sample().encode().unwrap();
        let err = Segment::decode(&bytes[..bytes.len() - 2], 3, 4, Path::new("mem")).unwrap_err();
        assert!(matches!(err, StoreError::Truncated { .. }));
    }

    #[test]
    fn write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment-3.seg");
        let seg = sample();
        seg.write_to(&path).unwrap();
        assert!(!temp_path(&path).exists());
        let back = Segment::read_from(&path, 3, 4).unwrap();
        assert_eq!(back.encode().unwrap(), seg.encode().unwrap());
    }

    #[test]
    fn oversized_header_fields_are_errors() {
        let max = usize::try_from(i32::MAX).unwrap();
        assert_eq!(header_i32(7, max).unwrap(), i32::MAX);
        assert!(matches!(
            header_i32(7, max + 1),
            Err(StoreError::HeaderOverflow { segment: 7, value }) if value == max + 1
        ));
    }

    #[test]
    fn dirty_flag_is_taken_once() {
        let seg = Segment::empty(0, 1);
        assert!(!seg.is_dirty());
        seg.mark_dirty();
        assert!(seg.take_dirty());
        assert!(!seg.take_dirty());
    }
}
