// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-concept taxonomy records and their edge flags.

mod flags;
mod record;

pub use flags::TaxonomyFlags;
pub use record::{EdgeTriple, TaxonomyRecord};
