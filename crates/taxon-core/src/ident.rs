// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier types.

use serde::{Deserialize, Serialize};

use crate::error::TaxonomyError;

/// Dense identifier of a concept or semantic assertion.
///
/// Assigned once at first reference and never reused. The negative range is
/// reserved for identifiers that have not yet been assigned a positive
/// sequence; such nids cannot address storage.
pub type Nid = i32;

/// Interned handle for one [`Stamp`](crate::Stamp) tuple.
///
/// Sequences start at 1; [`StampSequence::NONE`] never resolves.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct StampSequence(pub i32);

impl StampSequence {
    /// Placeholder that never resolves to a stamp.
    pub const NONE: Self = Self(0);

    /// Raw integer value as stored in packed records.
    #[inline]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for StampSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stamp#{}", self.0)
    }
}

/// Map sequence addressing the storage slot for `nid`.
pub fn nid_to_sequence(nid: Nid) -> Result<usize, TaxonomyError> {
    usize::try_from(nid).map_err(|_| TaxonomyError::UnassignedNid(nid))
}

/// Inverse of [`nid_to_sequence`].
pub fn sequence_to_nid(sequence: usize) -> Option<Nid> {
    Nid::try_from(sequence).ok()
}
