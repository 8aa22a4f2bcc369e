// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code, clippy::unwrap_used)]

use taxon_core::{
    EngineConfig, LogicalExpression, Nid, StampSequence, StampService, Stamp, Status,
    TaxonomyEngine,
};

pub const IS_A: Nid = 16;
pub const MAIN: Nid = 1;
pub const AUTHOR: Nid = 500;
pub const MODULE_A: Nid = 600;
pub const MODULE_B: Nid = 601;

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Memory-only engine with small segments and a root `MAIN` path.
pub fn engine() -> TaxonomyEngine {
    let mut config = EngineConfig::in_memory().with_is_a_nid(IS_A);
    config.store.segment_size = 32;
    let engine = TaxonomyEngine::open(config).unwrap();
    engine.add_path(MAIN, []);
    engine
}

/// Intern a stamp by `AUTHOR`.
pub fn stamp(
    engine: &TaxonomyEngine,
    status: Status,
    time: i64,
    module: Nid,
    path: Nid,
) -> StampSequence {
    engine
        .stamps()
        .intern(Stamp::new(status, time, AUTHOR, module, path))
        .unwrap()
}

/// `Necessary[And[Concept(p) for p in parents, Some(role -> filler) for each role]]`.
pub fn definition(parents: &[Nid], roles: &[(Nid, Nid)]) -> LogicalExpression {
    let mut b = LogicalExpression::builder();
    let mut conjuncts = Vec::new();
    for &p in parents {
        conjuncts.push(b.concept(p));
    }
    for &(role, filler) in roles {
        let f = b.concept(filler);
        conjuncts.push(b.some_role(role, f));
    }
    let and = b.and(&conjuncts);
    let set = b.necessary(&[and]);
    b.build(&[set]).unwrap()
}
