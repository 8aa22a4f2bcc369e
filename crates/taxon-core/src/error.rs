// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error types for taxonomy operations.

use std::path::PathBuf;

use taxon_store::{ConfigError, StoreError};
use thiserror::Error;

use crate::ident::{Nid, StampSequence};
use crate::logic::NodeSemantic;

/// Errors raised while updating or reading taxonomy records.
///
/// Contradictions are not errors; they surface as multi-element results.
#[derive(Debug, Error)]
pub enum TaxonomyError {
    /// Storage-layer failure, propagated unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A diff root has no taxonomy mapping.
    #[error("concept {concept}: {semantic:?} has no taxonomy mapping")]
    UnsupportedConstruct {
        /// Concept whose definition was being processed.
        concept: Nid,
        /// Semantic of the offending node.
        semantic: NodeSemantic,
    },

    /// A stamp sequence does not resolve to an interned stamp.
    #[error("unknown {0}")]
    UnknownStamp(StampSequence),

    /// The stamp table has used up every positive sequence.
    #[error("stamp table is full: slot {0} has no i32 sequence")]
    StampTableFull(usize),

    /// The nid lies in the reserved negative range.
    #[error("nid {0} has not been assigned a sequence")]
    UnassignedNid(Nid),

    /// A packed taxonomy record could not be decoded.
    #[error(transparent)]
    Decode(#[from] RecordDecodeError),

    /// A logical expression is structurally invalid.
    #[error("malformed logical expression: {0}")]
    MalformedExpression(String),

    /// Persisting or loading stamp/path tables failed.
    #[error("i/o failed for {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Engine configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Stamp/path table (de)serialization failed.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Failure to unpack a taxonomy record's flat integer form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordDecodeError {
    /// Payload byte length is not a whole number of 32-bit integers.
    #[error("payload of {0} bytes is not a whole number of ints")]
    RaggedPayload(usize),

    /// A destination group declares more triples than remain.
    #[error("destination {destination} declares {declared} triples but only {available} ints remain")]
    TruncatedGroup {
        /// Destination whose group is short.
        destination: Nid,
        /// Declared triple count.
        declared: i32,
        /// Integers left in the array.
        available: usize,
    },

    /// A destination group header is incomplete.
    #[error("dangling destination header at offset {0}")]
    DanglingHeader(usize),

    /// A triple count is negative.
    #[error("destination {destination} declares negative triple count {declared}")]
    NegativeCount {
        /// Destination with the bad count.
        destination: Nid,
        /// Declared count.
        declared: i32,
    },
}
