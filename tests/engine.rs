//! Integration tests for the mutation engine against the in-memory store.
//!
//! The in-memory store serializes through the same JSON codec as the git
//! store, so every test doubles as a wire round-trip check.

use sill_data::{
    CompiledData, Db, Engine, Error, MemoryRowStore, MimGroup, OpError, Operation, Outcome, Patch,
    ReferentRow, RowJoinBuilder, RowStore, SoftwareDraft, SoftwareId, SoftwarePatch, SoftwareRow,
    WallClock,
};

fn software_row(id: SoftwareId, name: &str) -> SoftwareRow {
    SoftwareRow {
        id,
        name: name.to_string(),
        function: "office suite".into(),
        referenced_since_time: WallClock(1_600_000_000_000),
        dereferencing: None,
        is_still_in_observation: false,
        parent_software: None,
        is_from_french_public_service: false,
        is_present_in_support_contract: false,
        alike_softwares: Vec::new(),
        wikidata_id: None,
        comptoir_du_libre_id: None,
        license: "MPL-2.0".into(),
        context_of_use: None,
        catalog_numerique_gouv_fr_id: None,
        mim_group: MimGroup::MIMO,
        version_min: "7.0".into(),
        workshop_urls: Vec::new(),
        test_urls: Vec::new(),
        use_case_urls: Vec::new(),
        agent_workstation: true,
    }
}

fn referent(email: &str) -> ReferentRow {
    ReferentRow {
        email: email.to_string(),
        email_alt: None,
    }
}

fn draft(name: &str) -> SoftwareDraft {
    SoftwareDraft {
        name: name.to_string(),
        function: "drawing".into(),
        license: "GPL-3.0".into(),
        version_min: "1.0".into(),
        ..Default::default()
    }
}

/// Engine over a db whose compiled catalog matches the rows.
fn engine_with(db: Db) -> Engine<MemoryRowStore, RowJoinBuilder> {
    use sill_data::CatalogBuilder;
    let compiled = RowJoinBuilder
        .build(&CompiledData::default(), &db)
        .expect("row join is infallible");
    let store = MemoryRowStore::new(&compiled, &db).expect("seed store");
    Engine::bootstrap(store, RowJoinBuilder).expect("bootstrap")
}

fn one_software_db() -> Db {
    Db {
        software_rows: vec![software_row(1, "Foo")],
        ..Default::default()
    }
}

#[test]
fn create_referent_link_records_the_expert_flag() {
    let engine = engine_with(one_software_db());

    let outcome = engine
        .create_referent_link(referent("a@example.gouv.fr"), 1, true, "daily".into())
        .unwrap();
    assert_eq!(outcome, Outcome::Committed);

    let (_, state) = engine.current();
    let relation = &state.db.software_referent_rows[0];
    assert_eq!(relation.software_id, 1);
    assert_eq!(relation.referent_email, "a@example.gouv.fr");
    assert!(relation.is_expert);
    assert_eq!(relation.use_case_description, "daily");
    assert_eq!(state.db.referent_rows.len(), 1);
    assert_eq!(
        engine.store().commit_messages(),
        vec!["Add referent a@example.gouv.fr to software Foo".to_string()]
    );
}

#[test]
fn identical_link_twice_commits_exactly_once() {
    let engine = engine_with(one_software_db());

    engine
        .create_referent_link(referent("a@example.gouv.fr"), 1, false, "".into())
        .unwrap();
    let second = engine
        .create_referent_link(referent("a@example.gouv.fr"), 1, false, "".into())
        .unwrap();

    assert_eq!(second, Outcome::Unchanged);
    assert_eq!(engine.store().commit_count(), 1);
    let (_, state) = engine.current();
    assert_eq!(state.db.software_referent_rows.len(), 1);
}

#[test]
fn differing_expert_flag_updates_in_place() {
    let engine = engine_with(one_software_db());

    engine
        .create_referent_link(referent("a@example.gouv.fr"), 1, false, "".into())
        .unwrap();
    let outcome = engine
        .create_referent_link(referent("a@example.gouv.fr"), 1, true, "".into())
        .unwrap();

    assert_eq!(outcome, Outcome::Committed);
    assert_eq!(engine.store().commit_count(), 2);
    let (_, state) = engine.current();
    assert_eq!(state.db.software_referent_rows.len(), 1);
    assert!(state.db.software_referent_rows[0].is_expert);
}

#[test]
fn create_link_to_unknown_software_is_not_found() {
    let engine = engine_with(one_software_db());
    let err = engine
        .create_referent_link(referent("a@example.gouv.fr"), 99, false, "".into())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Op(OpError::SoftwareNotFound(99))
    ));
    assert_eq!(engine.store().commit_count(), 0);
}

#[test]
fn referent_row_is_garbage_collected_with_its_last_relation() {
    let mut db = one_software_db();
    db.software_rows.push(software_row(2, "Bar"));
    let engine = engine_with(db);

    engine
        .create_referent_link(referent("a@example.gouv.fr"), 1, false, "".into())
        .unwrap();
    engine
        .create_referent_link(referent("a@example.gouv.fr"), 2, false, "".into())
        .unwrap();

    engine.remove_referent_link("a@example.gouv.fr", 1).unwrap();
    let (_, state) = engine.current();
    assert_eq!(state.db.referent_rows.len(), 1, "one relation remains");

    engine.remove_referent_link("a@example.gouv.fr", 2).unwrap();
    let (_, state) = engine.current();
    assert!(state.db.referent_rows.is_empty(), "last relation removed");
    assert!(state.db.software_referent_rows.is_empty());
    assert!(engine
        .store()
        .commit_messages()
        .contains(&"Remove referent a@example.gouv.fr from software Bar".to_string()));
}

#[test]
fn removing_an_absent_relation_is_a_no_op() {
    let engine = engine_with(one_software_db());
    let outcome = engine.remove_referent_link("a@example.gouv.fr", 1).unwrap();
    assert_eq!(outcome, Outcome::Unchanged);
    assert_eq!(engine.store().commit_count(), 0);
}

#[test]
fn add_software_rejects_names_differing_only_by_case_or_spacing() {
    let mut db = one_software_db();
    db.software_rows.push(software_row(2, "Libre Office"));
    let engine = engine_with(db);

    let err = engine
        .add_software(
            draft("libre-office"),
            referent("a@example.gouv.fr"),
            false,
            "".into(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Op(OpError::NameConflict { .. })));

    let err = engine
        .add_software(
            draft("LIBRE OFFICE"),
            referent("a@example.gouv.fr"),
            false,
            "".into(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Op(OpError::NameConflict { .. })));
    assert_eq!(engine.store().commit_count(), 0);
}

#[test]
fn add_software_allocates_max_id_plus_one_over_holes() {
    let db = Db {
        software_rows: vec![
            software_row(1, "One"),
            software_row(5, "Five"),
            software_row(7, "Seven"),
        ],
        ..Default::default()
    };
    let engine = engine_with(db);

    let compiled = engine
        .add_software(draft("Eight"), referent("a@example.gouv.fr"), false, "".into())
        .unwrap();
    assert_eq!(compiled.id(), 8);
}

#[test]
fn add_software_scenario_seeds_defaults_and_joins_the_referent() {
    let engine = engine_with(one_software_db());
    let before = WallClock::now();

    let compiled = engine
        .add_software(
            draft("Bar"),
            referent("referent-a@example.gouv.fr"),
            false,
            "".into(),
        )
        .unwrap();

    assert_eq!(compiled.id(), 2);
    assert!(compiled.row.referenced_since_time >= before);
    assert!(!compiled.row.is_still_in_observation);
    assert!(!compiled.row.is_present_in_support_contract);
    assert_eq!(compiled.row.mim_group, MimGroup::MIMO);
    assert_eq!(compiled.referents.len(), 1);
    assert_eq!(compiled.referents[0].referent.email, "referent-a@example.gouv.fr");

    let (_, state) = engine.current();
    let ids: Vec<_> = state.db.software_rows.iter().map(|row| row.id).collect();
    assert_eq!(ids, vec![1, 2]);
    let entry = state.compiled_data.entry(2).expect("catalog entry for Bar");
    assert_eq!(entry.referents[0].referent.email, "referent-a@example.gouv.fr");
    assert_eq!(
        engine.store().commit_messages(),
        vec!["Add Bar and referent-a@example.gouv.fr as referent".to_string()]
    );
}

#[test]
fn update_software_merges_only_supplied_fields() {
    let engine = engine_with(one_software_db());
    engine
        .create_referent_link(referent("a@example.gouv.fr"), 1, false, "".into())
        .unwrap();

    let patch = SoftwarePatch {
        version_min: Patch::Set("8.1".into()),
        ..Default::default()
    };
    let compiled = engine
        .update_software(1, "a@example.gouv.fr", patch)
        .unwrap();

    assert_eq!(compiled.row.version_min, "8.1");
    assert_eq!(compiled.row.name, "Foo", "omitted field untouched");
    assert_eq!(compiled.row.license, "MPL-2.0");
    assert!(engine
        .store()
        .commit_messages()
        .contains(&"Update software Foo".to_string()));
}

#[test]
fn update_software_requires_the_requester_to_be_a_referent() {
    let engine = engine_with(one_software_db());
    let err = engine
        .update_software(1, "stranger@example.com", SoftwarePatch::default())
        .unwrap_err();
    assert!(matches!(err, Error::Op(OpError::NotAReferent { .. })));
    assert_eq!(engine.store().commit_count(), 0);
}

#[test]
fn update_software_rejects_clearing_a_required_field_without_committing() {
    let engine = engine_with(one_software_db());
    engine
        .create_referent_link(referent("a@example.gouv.fr"), 1, false, "".into())
        .unwrap();
    let commits_before = engine.store().commit_count();

    let patch = SoftwarePatch {
        license: Patch::Clear,
        ..Default::default()
    };
    let err = engine
        .update_software(1, "a@example.gouv.fr", patch)
        .unwrap_err();
    assert!(matches!(err, Error::Op(OpError::ValidationFailed { .. })));
    assert_eq!(engine.store().commit_count(), commits_before);
}

#[test]
fn update_of_unknown_software_is_not_found() {
    let engine = engine_with(one_software_db());
    engine
        .create_referent_link(referent("a@example.gouv.fr"), 1, false, "".into())
        .unwrap();
    let err = engine
        .update_software(42, "a@example.gouv.fr", SoftwarePatch::default())
        .unwrap_err();
    assert!(matches!(err, Error::Op(OpError::SoftwareNotFound(42))));
}

#[test]
fn failed_commit_leaves_the_cache_untouched() {
    let engine = engine_with(one_software_db());
    let (version_before, state_before) = engine.current();

    engine.store().fail_next_commit();
    let err = engine
        .create_referent_link(referent("a@example.gouv.fr"), 1, true, "".into())
        .unwrap_err();
    assert!(matches!(err, Error::Store(_)));
    assert_eq!(err.effect(), sill_data::Effect::None);

    let (version_after, state_after) = engine.current();
    assert_eq!(version_after, version_before);
    assert_eq!(*state_after, *state_before);
    assert!(state_after.db.software_referent_rows.is_empty());
}

#[test]
fn committed_rows_round_trip_value_equal_through_the_store() {
    let engine = engine_with(one_software_db());
    engine
        .add_software(draft("Bar"), referent("a@example.gouv.fr"), true, "ci".into())
        .unwrap();

    let (_, state) = engine.current();
    let refetched = engine.store().fetch_db().unwrap();
    assert_eq!(refetched, state.db);
}

#[test]
fn refresh_replaces_the_cache_wholesale() {
    use sill_data::CatalogBuilder;

    let engine = engine_with(one_software_db());
    let (version_before, _) = engine.current();

    // Out-of-band rebuild: new rows and a freshly compiled catalog land
    // in the store behind the engine's back.
    let mut rebuilt_db = one_software_db();
    rebuilt_db.software_rows.push(software_row(2, "Bar"));
    let rebuilt_compiled = RowJoinBuilder
        .build(&CompiledData::default(), &rebuilt_db)
        .unwrap();
    engine.store().set_db(&rebuilt_db).unwrap();
    engine.store().set_compiled(&rebuilt_compiled).unwrap();

    assert!(engine.refresh().unwrap());
    let (version_after, state) = engine.current();
    assert!(version_after > version_before);
    assert_eq!(state.db.software_rows.len(), 2);
    assert_eq!(state.compiled_data.catalog.len(), 2);
}

#[test]
fn subscribers_observe_recomputed_views_after_a_mutation() {
    let engine = engine_with(one_software_db());
    let rx = engine.subscribe();
    let initial = rx.recv().unwrap();
    assert_eq!(initial.version, 1);

    engine
        .create_referent_link(referent("a@example.gouv.fr"), 1, true, "".into())
        .unwrap();

    let change = rx.recv().unwrap();
    assert_eq!(change.version, 2);
    let referents = &change.views.referents_by_software_id[&1];
    assert_eq!(referents.len(), 1);
    assert!(referents[0].is_expert);
    assert_eq!(change.views.catalog_without_referents[0].referent_count, 1);
}

#[test]
fn audit_records_carry_operation_actor_and_versions() {
    let (tx, rx) = crossbeam::channel::unbounded();
    let engine = {
        use sill_data::CatalogBuilder;
        let db = one_software_db();
        let compiled = RowJoinBuilder.build(&CompiledData::default(), &db).unwrap();
        let store = MemoryRowStore::new(&compiled, &db).unwrap();
        Engine::bootstrap(store, RowJoinBuilder)
            .unwrap()
            .with_audit(tx)
    };

    engine
        .add_software(draft("Bar"), referent("a@example.gouv.fr"), false, "".into())
        .unwrap();
    engine.remove_referent_link("a@example.gouv.fr", 2).unwrap();

    let first = rx.recv().unwrap();
    assert_eq!(first.operation, Operation::AddSoftware);
    assert_eq!(first.actor, "a@example.gouv.fr");
    assert_eq!(first.before_version, 1);
    assert_eq!(first.after_version, 2);
    assert!(first.timestamp_ms > 0);

    let second = rx.recv().unwrap();
    assert_eq!(second.operation, Operation::RemoveReferentLink);
    assert_eq!(second.before_version, 2);
    assert_eq!(second.after_version, 3);
}

#[test]
fn no_op_calls_emit_no_audit_record() {
    let (tx, rx) = crossbeam::channel::unbounded();
    let engine = {
        use sill_data::CatalogBuilder;
        let db = one_software_db();
        let compiled = RowJoinBuilder.build(&CompiledData::default(), &db).unwrap();
        let store = MemoryRowStore::new(&compiled, &db).unwrap();
        Engine::bootstrap(store, RowJoinBuilder)
            .unwrap()
            .with_audit(tx)
    };

    engine.remove_referent_link("nobody@example.com", 1).unwrap();
    assert!(rx.try_recv().is_err());
}
