// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Provenance bits carried by every taxonomy edge triple.
    ///
    /// Stored as the third integer of a packed triple, so the bit layout is
    /// part of the record format.
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
    pub struct TaxonomyFlags: i32 {
        /// Edge derived from the stated (authored) form.
        const STATED = 0b0001;
        /// Edge derived from the inferred (classified) form.
        const INFERRED = 0b0010;
        /// Edge asserted by a semantic rather than a logical definition.
        const SEMEME = 0b0100;
        /// Triple records the concept's own status, not a relationship.
        const CONCEPT_STATUS = 0b1000;
    }
}

impl TaxonomyFlags {
    /// Returns `true` when a triple carrying `self` answers a query for
    /// `query`. Concept-status triples only answer queries that ask for them.
    pub const fn answers(self, query: Self) -> bool {
        self.contains(query)
            && (query.contains(Self::CONCEPT_STATUS) || !self.contains(Self::CONCEPT_STATUS))
    }
}
