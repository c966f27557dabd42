//! Scheme lifecycle transitions and identifier allocation against PostgreSQL.
//!
//! Covers:
//! - promotion to active mints one identifier and one URI per concept
//! - URIs are only written once the scheme has an identifier
//! - only draft concepts are numbered
//! - a repeated promotion writes nothing
//! - state propagates to concepts but never to retired ones
//! - concurrent allocations receive disjoint consecutive numbers
//! - a used counter refuses a new start number
//!
//! Requires a PostgreSQL database. Run with:
//! `DATABASE_URL=postgres://... cargo test -p lingo-db --test lifecycle_sync_test -- --ignored`

use std::collections::BTreeSet;

use futures::future::join_all;
use lingo_core::graph_model::nodes::{CONCEPT_URI_NODEGROUP, SCHEME_URI_NODEGROUP};
use lingo_db::test_fixtures::TestDatabase;
use lingo_db::{
    Error, IdentifierAllocator, LifecycleState, LifecycleSynchronizer, LifecycleTransition,
    ResourceIdentifier, ResourceRepository,
};
use uuid::Uuid;

async fn identify_scheme(test_db: &TestDatabase, scheme_id: Uuid, identifier: &str) {
    test_db
        .db
        .identifiers
        .add_identifier(&ResourceIdentifier {
            resource_id: scheme_id,
            identifier: identifier.to_string(),
            source: "arches-lingo".to_string(),
            identifier_type: Some("identifier".to_string()),
        })
        .await
        .unwrap();
}

async fn uri_tile_count(test_db: &TestDatabase, resource_ids: &[Uuid]) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM tiles
         WHERE resourceinstanceid = ANY($1) AND nodegroupid = ANY($2)",
    )
    .bind(resource_ids)
    .bind(vec![CONCEPT_URI_NODEGROUP, SCHEME_URI_NODEGROUP])
    .fetch_one(&test_db.pool)
    .await
    .unwrap()
}

#[tokio::test]
#[ignore]
async fn test_promotion_assigns_identifiers_and_uris_once() {
    let test_db = TestDatabase::new().await;
    let summary = test_db.import_fixture().await;
    let scheme_id = summary.scheme_ids[0];
    let sync = LifecycleSynchronizer::new(test_db.db.clone(), test_db.config.clone());
    let promote = LifecycleTransition::new(LifecycleState::Draft, LifecycleState::Active);
    identify_scheme(&test_db, scheme_id, "TS").await;

    let first = sync.sync(scheme_id, promote).await.unwrap();
    assert_eq!(first.identifiers_assigned, 5);
    // Five concept URIs plus the scheme's own.
    assert_eq!(first.uri_tiles_created + first.uri_tiles_updated, 6);
    assert_eq!(first.resources_updated, 6);

    let counter = test_db
        .db
        .identifiers
        .counter(scheme_id)
        .await
        .unwrap()
        .expect("counter created");
    assert_eq!(counter.next_number, counter.start_number + 5);

    let concepts = test_db
        .db
        .resources
        .concepts_in_scheme(scheme_id)
        .await
        .unwrap();
    let mut minted = BTreeSet::new();
    for concept in &concepts {
        let identifiers = test_db.db.identifiers.identifiers_for(*concept).await.unwrap();
        let ours: Vec<_> = identifiers
            .iter()
            .filter(|i| i.source == "arches-lingo")
            .collect();
        assert_eq!(ours.len(), 1);
        minted.insert(ours[0].identifier.parse::<i64>().unwrap());
    }
    let expected: BTreeSet<i64> = (counter.start_number..counter.next_number).collect();
    assert_eq!(minted, expected);

    let second = sync.sync(scheme_id, promote).await.unwrap();
    assert_eq!(second.tile_writes(), 0);
    assert_eq!(second.resources_updated, 0);

    test_db.cleanup(&[summary.load_id]).await;
}

#[tokio::test]
#[ignore]
async fn test_scheme_without_identifier_gets_no_uris() {
    let test_db = TestDatabase::new().await;
    let summary = test_db.import_fixture().await;
    let scheme_id = summary.scheme_ids[0];
    let sync = LifecycleSynchronizer::new(test_db.db.clone(), test_db.config.clone());

    let result = sync
        .sync(
            scheme_id,
            LifecycleTransition::new(LifecycleState::Draft, LifecycleState::Active),
        )
        .await
        .unwrap();
    assert_eq!(result.identifiers_assigned, 5);
    assert_eq!(result.uri_tiles_created, 0);
    assert_eq!(result.uri_tiles_updated, 0);
    assert_eq!(result.resources_updated, 6);

    let mut resources = test_db
        .db
        .resources
        .concepts_in_scheme(scheme_id)
        .await
        .unwrap();
    resources.push(scheme_id);
    assert_eq!(uri_tile_count(&test_db, &resources).await, 0);

    test_db.cleanup(&[summary.load_id]).await;
}

#[tokio::test]
#[ignore]
async fn test_editing_concepts_are_not_numbered() {
    let test_db = TestDatabase::new().await;
    let summary = test_db.import_fixture().await;
    let scheme_id = summary.scheme_ids[0];
    let mut concepts = test_db
        .db
        .resources
        .concepts_in_scheme(scheme_id)
        .await
        .unwrap();
    concepts.sort();
    let editing = concepts[0];

    sqlx::query("UPDATE resource_instances SET lifecycle_state = 'editing' WHERE resourceinstanceid = $1")
        .bind(editing)
        .execute(&test_db.pool)
        .await
        .unwrap();

    let sync = LifecycleSynchronizer::new(test_db.db.clone(), test_db.config.clone());
    let result = sync
        .sync(
            scheme_id,
            LifecycleTransition::new(LifecycleState::Draft, LifecycleState::Active),
        )
        .await
        .unwrap();
    assert_eq!(result.identifiers_assigned, 4);
    assert!(test_db
        .db
        .identifiers
        .identifiers_for(editing)
        .await
        .unwrap()
        .iter()
        .all(|i| i.source != "arches-lingo"));
    // Still moved to the target state with the rest.
    let concept = test_db.db.resources.get(editing).await.unwrap().unwrap();
    assert_eq!(concept.lifecycle_state, LifecycleState::Active);

    test_db.cleanup(&[summary.load_id]).await;
}

#[tokio::test]
#[ignore]
async fn test_retired_concepts_are_left_alone() {
    let test_db = TestDatabase::new().await;
    let summary = test_db.import_fixture().await;
    let scheme_id = summary.scheme_ids[0];
    let concepts = test_db
        .db
        .resources
        .concepts_in_scheme(scheme_id)
        .await
        .unwrap();

    sqlx::query("UPDATE resource_instances SET lifecycle_state = 'retired' WHERE resourceinstanceid = $1")
        .bind(concepts[0])
        .execute(&test_db.pool)
        .await
        .unwrap();

    let sync = LifecycleSynchronizer::new(test_db.db.clone(), test_db.config.clone());
    let result = sync
        .sync(
            scheme_id,
            LifecycleTransition::new(LifecycleState::Draft, LifecycleState::Active),
        )
        .await
        .unwrap();
    assert_eq!(result.identifiers_assigned, 4);

    let retired = test_db.db.resources.get(concepts[0]).await.unwrap().unwrap();
    assert_eq!(retired.lifecycle_state, LifecycleState::Retired);
    assert!(test_db
        .db
        .identifiers
        .identifiers_for(concepts[0])
        .await
        .unwrap()
        .is_empty());

    let editing = sync
        .sync(
            scheme_id,
            LifecycleTransition::new(LifecycleState::Active, LifecycleState::Editing),
        )
        .await
        .unwrap();
    assert_eq!(editing.tile_writes(), 0);
    assert_eq!(editing.resources_updated, 5);
    assert_eq!(
        test_db
            .db
            .resources
            .count_in_state(&concepts, LifecycleState::Editing)
            .await
            .unwrap(),
        4
    );

    test_db.cleanup(&[summary.load_id]).await;
}

#[tokio::test]
#[ignore]
async fn test_concurrent_allocations_are_disjoint() {
    let test_db = TestDatabase::new().await;
    let summary = test_db.import_fixture().await;
    let scheme_id = summary.scheme_ids[0];
    let start = test_db
        .db
        .identifiers
        .ensure_counter(scheme_id)
        .await
        .unwrap()
        .next_number;

    let allocator = &test_db.db.identifiers;
    let results = join_all((0..20).map(|_| allocator.allocate(scheme_id, 1))).await;
    let numbers: BTreeSet<i64> = results.into_iter().map(|r| r.unwrap()).collect();

    let expected: BTreeSet<i64> = (start..start + 20).collect();
    assert_eq!(numbers, expected);

    test_db.cleanup(&[summary.load_id]).await;
}

#[tokio::test]
#[ignore]
async fn test_counter_start_fixed_once_used() {
    let test_db = TestDatabase::new().await;
    let summary = test_db.import_fixture().await;
    let scheme_id = summary.scheme_ids[0];
    let allocator = &test_db.db.identifiers;

    let counter = allocator.set_counter_start(scheme_id, 1000).await.unwrap();
    assert_eq!(counter.start_number, 1000);
    assert_eq!(counter.next_number, 1000);

    assert_eq!(allocator.allocate(scheme_id, 3).await.unwrap(), 1000);
    assert_eq!(allocator.allocate(scheme_id, 1).await.unwrap(), 1003);

    let err = allocator.set_counter_start(scheme_id, 5).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(ref msg) if msg.contains("already been used")));
    assert!(matches!(
        allocator.allocate(scheme_id, 0).await,
        Err(Error::InvalidInput(_))
    ));

    test_db.cleanup(&[summary.load_id]).await;
}
