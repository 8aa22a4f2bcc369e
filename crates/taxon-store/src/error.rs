// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error types for the segmented store.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed decode failure reported by a value codec.
pub type BoxedDecodeError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by [`WaitFreeMap`](crate::WaitFreeMap) operations.
///
/// I/O failures are never retried internally; the caller decides how to react.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing a segment file failed.
    #[error("segment i/o failed for {path}: {source}")]
    Io {
        /// File or directory involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A slot blob could not be decoded into a value.
    #[error("slot {sequence} could not be decoded: {source}")]
    Decode {
        /// Map sequence of the slot.
        sequence: usize,
        /// Codec failure.
        #[source]
        source: BoxedDecodeError,
    },

    /// A slot blob is shorter than its write-sequence header.
    #[error("slot {sequence} holds {len} bytes, shorter than the write-sequence header")]
    ShortBlob {
        /// Map sequence of the slot.
        sequence: usize,
        /// Observed blob length.
        len: usize,
    },

    /// A segment file declares a different index than the one requested.
    #[error("segment file declares index {found}, expected {expected}")]
    SegmentMismatch {
        /// Index that was requested.
        expected: usize,
        /// Index found in the file header.
        found: i64,
    },

    /// A segment file ended before all slots were read.
    #[error("segment file {path} is truncated")]
    Truncated {
        /// Offending file.
        path: PathBuf,
    },

    /// A slot blob in a segment file declares an invalid length.
    #[error("segment file {path} declares invalid slot length {length}")]
    InvalidLength {
        /// Offending file.
        path: PathBuf,
        /// Declared length.
        length: i32,
    },

    /// A segment index or slot length does not fit its `i32` header field.
    #[error("segment {segment}: {value} does not fit an i32 file header")]
    HeaderOverflow {
        /// Segment being encoded.
        segment: usize,
        /// Value that overflowed.
        value: usize,
    },

    /// The compare-and-set loop exceeded the configured retry limit.
    ///
    /// Under a correct merge function every retry makes progress; hitting this
    /// limit means the merge never converges.
    #[error("compare-and-set for slot {sequence} gave up after {attempts} attempts")]
    CasRetryExhausted {
        /// Map sequence of the contended slot.
        sequence: usize,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// Configuration rejected at open time.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
