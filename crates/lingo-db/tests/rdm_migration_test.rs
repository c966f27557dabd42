//! Legacy RDM tables → committed resources, against PostgreSQL.
//!
//! Requires a PostgreSQL database. Run with:
//! `DATABASE_URL=postgres://... cargo test -p lingo-db --test rdm_migration_test -- --ignored`

use lingo_db::test_fixtures::TestDatabase;
use lingo_db::{
    ImportSource, LoadEventRepository, LoadStatus, OverwriteOption, ResourceKind,
    ResourceRepository,
};
use sqlx::PgPool;
use uuid::Uuid;

struct LegacyThesaurus {
    scheme: Uuid,
    stone: Uuid,
    marble: Uuid,
    granite: Uuid,
}

impl LegacyThesaurus {
    fn ids(&self) -> Vec<Uuid> {
        vec![self.scheme, self.stone, self.marble, self.granite]
    }
}

async fn insert_concept(pool: &PgPool, id: Uuid, nodetype: &str, label: &str) {
    sqlx::query("INSERT INTO concepts (conceptid, nodetype) VALUES ($1, $2)")
        .bind(id)
        .bind(nodetype)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        r#"INSERT INTO "values" (conceptid, valuetype, value, languageid)
           VALUES ($1, 'prefLabel', $2, 'en')"#,
    )
    .bind(id)
    .bind(label)
    .execute(pool)
    .await
    .unwrap();
}

async fn insert_relation(pool: &PgPool, from: Uuid, to: Uuid, relation_type: &str) {
    sqlx::query("INSERT INTO relations (conceptidfrom, conceptidto, relationtype) VALUES ($1, $2, $3)")
        .bind(from)
        .bind(to)
        .bind(relation_type)
        .execute(pool)
        .await
        .unwrap();
}

/// Stone → {Marble, Granite}, with Marble related to Granite.
async fn seed(pool: &PgPool) -> LegacyThesaurus {
    let t = LegacyThesaurus {
        scheme: Uuid::new_v4(),
        stone: Uuid::new_v4(),
        marble: Uuid::new_v4(),
        granite: Uuid::new_v4(),
    };
    insert_concept(pool, t.scheme, "ConceptScheme", "Materials").await;
    insert_concept(pool, t.stone, "Concept", "Stone").await;
    insert_concept(pool, t.marble, "Concept", "Marble").await;
    insert_concept(pool, t.granite, "Concept", "Granite").await;
    insert_relation(pool, t.scheme, t.stone, "hasTopConcept").await;
    insert_relation(pool, t.stone, t.marble, "narrower").await;
    insert_relation(pool, t.stone, t.granite, "narrower").await;
    insert_relation(pool, t.marble, t.granite, "related").await;
    t
}

async fn remove(pool: &PgPool, t: &LegacyThesaurus) {
    let _ = sqlx::query("DELETE FROM concepts WHERE conceptid = ANY($1)")
        .bind(t.ids())
        .execute(pool)
        .await;
}

#[tokio::test]
#[ignore]
async fn test_rdm_scheme_migrates_with_legacy_ids() {
    let test_db = TestDatabase::new().await;
    let t = seed(&test_db.pool).await;

    let summary = test_db
        .importer()
        .execute(
            Uuid::now_v7(),
            &ImportSource::Rdm { scheme_id: t.scheme },
            OverwriteOption::Overwrite,
        )
        .await
        .unwrap();
    assert_eq!(summary.scheme_ids, vec![t.scheme]);
    assert_eq!(summary.resource_count, 4);

    let scheme = test_db.db.resources.get(t.scheme).await.unwrap().unwrap();
    assert_eq!(scheme.kind, ResourceKind::Scheme);
    assert_eq!(scheme.name.as_deref(), Some("Materials"));
    assert_eq!(scheme.legacy_id, Some(t.scheme.to_string()));

    let mut members = test_db
        .db
        .resources
        .concepts_in_scheme(t.scheme)
        .await
        .unwrap();
    members.sort();
    let mut expected = vec![t.stone, t.marble, t.granite];
    expected.sort();
    assert_eq!(members, expected);

    let trees = test_db.db.concepts.trees().await.unwrap();
    let tree = trees.iter().find(|tree| tree.id == t.scheme).unwrap();
    assert_eq!(tree.top_concepts.len(), 1);
    assert_eq!(tree.top_concepts[0].id, t.stone);
    assert_eq!(tree.top_concepts[0].narrower.len(), 2);

    let event = test_db
        .db
        .load_events
        .get(summary.load_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.status, LoadStatus::Indexed);
    assert_eq!(event.load_details["resources"], 4);

    test_db.cleanup(&[summary.load_id]).await;
    remove(&test_db.pool, &t).await;
}

#[tokio::test]
#[ignore]
async fn test_ignore_option_skips_existing_resources() {
    let test_db = TestDatabase::new().await;
    let t = seed(&test_db.pool).await;
    let source = ImportSource::Rdm { scheme_id: t.scheme };
    let importer = test_db.importer();

    let first = importer
        .execute(Uuid::now_v7(), &source, OverwriteOption::Overwrite)
        .await
        .unwrap();
    let second = importer
        .execute(Uuid::now_v7(), &source, OverwriteOption::Ignore)
        .await
        .unwrap();
    assert_eq!(second.promotion.resources_created, 0);
    assert_eq!(second.promotion.resources_skipped, 4);
    assert_eq!(second.promotion.tiles_written, 0);

    let third = importer
        .execute(Uuid::now_v7(), &source, OverwriteOption::Overwrite)
        .await
        .unwrap();
    assert_eq!(third.promotion.tiles_replaced, first.promotion.tiles_written);

    test_db
        .cleanup(&[first.load_id, second.load_id, third.load_id])
        .await;
    remove(&test_db.pool, &t).await;
}

#[tokio::test]
#[ignore]
async fn test_unknown_scheme_fails_load() {
    let test_db = TestDatabase::new().await;

    let outcome = test_db
        .importer()
        .run(
            &ImportSource::Rdm {
                scheme_id: Uuid::new_v4(),
            },
            OverwriteOption::Overwrite,
        )
        .await;
    assert!(!outcome.success);

    let event = test_db
        .db
        .load_events
        .get(outcome.load_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.status, LoadStatus::Failed);

    test_db.cleanup(&[outcome.load_id]).await;
}
