// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Navigator queries over a small hierarchy, in memory and after reopen.
#![allow(missing_docs, clippy::unwrap_used)]

mod common;

use std::collections::BTreeSet;

use common::{definition, engine, init_tracing, stamp, IS_A, MAIN, MODULE_A};
use taxon_core::{
    EngineConfig, ManifoldCoordinate, PathOrigin, PremiseType, StampFilter, Status,
    TaxonomyEngine,
};

const THING: i32 = 100;
const ANIMAL: i32 = 101;
const DOG: i32 = 102;
const CAT: i32 = 103;
const PUPPY: i32 = 104;
const HAS_OWNER: i32 = 40;
const PERSON: i32 = 41;

fn populate(engine: &TaxonomyEngine) {
    let s = stamp(engine, Status::Active, 10, MODULE_A, MAIN);
    let updater = engine.updater();
    for (concept, parents, roles) in [
        (ANIMAL, vec![THING], vec![]),
        (DOG, vec![ANIMAL], vec![(HAS_OWNER, PERSON)]),
        (CAT, vec![ANIMAL], vec![]),
        (PUPPY, vec![DOG], vec![]),
        (PERSON, vec![THING], vec![]),
    ] {
        updater
            .update(
                concept,
                None,
                &definition(&parents, &roles),
                s,
                PremiseType::Stated,
            )
            .unwrap();
        updater.update_concept_status(concept, s).unwrap();
    }
}

#[test]
fn hierarchy_queries() {
    init_tracing();
    let engine = engine();
    populate(&engine);
    let nav = engine.navigator(ManifoldCoordinate::stated_latest(MAIN));

    assert_eq!(nav.parents(DOG).unwrap(), vec![ANIMAL]);
    assert_eq!(nav.children(ANIMAL).unwrap(), vec![DOG, CAT]);
    assert_eq!(nav.children(PUPPY).unwrap(), Vec::<i32>::new());
    assert!(nav.is_child_of(PUPPY, DOG).unwrap());
    assert!(!nav.is_child_of(PUPPY, ANIMAL).unwrap());
    assert!(nav.is_kind_of(PUPPY, THING).unwrap());
    assert!(nav.is_kind_of(CAT, CAT).unwrap());
    assert!(!nav.is_kind_of(CAT, DOG).unwrap());
    assert_eq!(
        nav.ancestors(PUPPY).unwrap(),
        BTreeSet::from([DOG, ANIMAL, THING])
    );
    assert_eq!(
        nav.descendants(ANIMAL).unwrap(),
        BTreeSet::from([DOG, CAT, PUPPY])
    );
    assert_eq!(nav.roots().unwrap(), vec![THING]);
    assert_eq!(nav.role_destinations(DOG, HAS_OWNER).unwrap(), vec![PERSON]);
    assert!(nav.is_concept_active(CAT).unwrap());
    assert!(!nav.is_concept_active(999).unwrap());
}

#[test]
fn navigator_respects_its_time_position() {
    let engine = engine();
    populate(&engine);
    let s2 = stamp(&engine, Status::Active, 20, MODULE_A, MAIN);
    engine
        .updater()
        .update(
            CAT,
            Some(&definition(&[ANIMAL], &[])),
            &definition(&[THING], &[]),
            s2,
            PremiseType::Stated,
        )
        .unwrap();

    let now = engine.navigator(ManifoldCoordinate::stated_latest(MAIN));
    assert_eq!(now.parents(CAT).unwrap(), vec![THING]);
    assert_eq!(now.children(ANIMAL).unwrap(), vec![DOG]);

    let earlier = engine.navigator(ManifoldCoordinate::new(
        StampFilter::latest_active(MAIN).at_time(15),
        PremiseType::Stated,
    ));
    assert_eq!(earlier.parents(CAT).unwrap(), vec![ANIMAL]);
    assert_eq!(earlier.children(ANIMAL).unwrap(), vec![DOG, CAT]);
}

#[test]
fn branch_edits_stay_on_their_branch() {
    let engine = engine();
    populate(&engine);
    let branch = 7;
    engine.add_path(branch, [PathOrigin::new(MAIN, 50)]);
    let on_branch = stamp(&engine, Status::Inactive, 60, MODULE_A, branch);
    engine.updater().update_concept_status(CAT, on_branch).unwrap();

    let main = engine.navigator(ManifoldCoordinate::stated_latest(MAIN));
    let edit = engine.navigator(ManifoldCoordinate::stated_latest(branch));
    assert!(main.is_concept_active(CAT).unwrap());
    assert!(!edit.is_concept_active(CAT).unwrap());
    assert_eq!(edit.parents(CAT).unwrap(), vec![ANIMAL]);
}

#[test]
fn reopened_engine_answers_the_same() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::on_disk(dir.path()).with_is_a_nid(IS_A);
    config.store.segment_size = 16;
    config.store.cache_capacity = 2;

    {
        let engine = TaxonomyEngine::open(config.clone()).unwrap();
        engine.add_path(MAIN, []);
        populate(&engine);
        engine.flush().unwrap();
    }

    let engine = TaxonomyEngine::open(config).unwrap();
    assert!(!engine.stamps().is_empty());
    assert!(engine.paths().contains(MAIN));
    let nav = engine.navigator(ManifoldCoordinate::stated_latest(MAIN));
    assert_eq!(nav.children(ANIMAL).unwrap(), vec![DOG, CAT]);
    assert_eq!(nav.ancestors(PUPPY).unwrap().len(), 3);
    assert!(nav.is_concept_active(PERSON).unwrap());
}
