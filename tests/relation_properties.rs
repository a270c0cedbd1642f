//! Relation invariants across planner and cascade operations

use relkeeper::config::{DuplicatePolicy, EngineConfig, FallbackPolicy, LanguageConfig};
use relkeeper::database::entities::RecordKind;
use relkeeper::harness::fixtures::*;
use relkeeper::harness::Fixture;
use relkeeper::services::{NewRecord, Position, RecordEdit, RelationContext};
use relkeeper::{RelationEngine, RelationError};

const LIVE: RelationContext = RelationContext::LIVE;

async fn engine_with(config: EngineConfig) -> RelationEngine {
    let engine = RelationEngine::connect(config).await.unwrap();
    Fixture::many_to_many().load(&engine).await.unwrap();
    engine
}

async fn fixture_engine() -> RelationEngine {
    engine_with(Fixture::config()).await
}

fn strict_config() -> EngineConfig {
    let mut config = Fixture::config();
    config.localization.fallback = FallbackPolicy::Strict;
    config
}

async fn ordered(engine: &RelationEngine, left: i32) -> Vec<i32> {
    engine.store().list_ordered(left, LIVE).await.unwrap()
}

#[tokio::test]
async fn test_resolve_has_no_duplicates_and_follows_sorting() {
    let engine = fixture_engine().await;
    let planner = engine.planner();
    planner
        .replace_relations(
            CONTENT_ID_FIRST,
            &[CATEGORY_ID_THIRD, CATEGORY_ID_FIRST, CATEGORY_ID_THIRD, CATEGORY_ID_FOURTH],
            LIVE,
        )
        .await
        .unwrap();

    let resolved = engine.verifier().resolve(CONTENT_ID_FIRST, 0, 0).await.unwrap();
    let ids: Vec<i32> = resolved.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![CATEGORY_ID_THIRD, CATEGORY_ID_FIRST, CATEGORY_ID_FOURTH]);

    let rows = engine.store().list_rows(CONTENT_ID_FIRST, LIVE).await.unwrap();
    let sortings: Vec<i32> = rows.iter().map(|r| r.sorting).collect();
    assert_eq!(sortings, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_add_then_remove_restores_list() {
    let engine = fixture_engine().await;
    let before = ordered(&engine, CONTENT_ID_FIRST).await;

    let planner = engine.planner();
    planner
        .add_relation(CONTENT_ID_FIRST, CATEGORY_ID_THIRD, LIVE, Position::After(CATEGORY_ID_FIRST))
        .await
        .unwrap();
    assert_eq!(
        ordered(&engine, CONTENT_ID_FIRST).await,
        vec![CATEGORY_ID_FIRST, CATEGORY_ID_THIRD, CATEGORY_ID_SECOND]
    );

    planner
        .remove_relation(CONTENT_ID_FIRST, CATEGORY_ID_THIRD, LIVE)
        .await
        .unwrap();
    assert_eq!(ordered(&engine, CONTENT_ID_FIRST).await, before);

    let report = engine.verifier().verify(CONTENT_ID_FIRST, LIVE).await.unwrap();
    assert!(report.is_consistent());
}

#[tokio::test]
async fn test_remove_then_add_appends() {
    let engine = fixture_engine().await;
    let planner = engine.planner();
    planner
        .remove_relation(CONTENT_ID_FIRST, CATEGORY_ID_FIRST, LIVE)
        .await
        .unwrap();
    planner
        .add_relation(CONTENT_ID_FIRST, CATEGORY_ID_FIRST, LIVE, Position::Append)
        .await
        .unwrap();
    assert_eq!(
        ordered(&engine, CONTENT_ID_FIRST).await,
        vec![CATEGORY_ID_SECOND, CATEGORY_ID_FIRST]
    );
}

#[tokio::test]
async fn test_reorder_round_trip() {
    let engine = fixture_engine().await;
    let planner = engine.planner();
    planner
        .add_relation(CONTENT_ID_FIRST, CATEGORY_ID_THIRD, LIVE, Position::Append)
        .await
        .unwrap();

    let permutation = vec![CATEGORY_ID_THIRD, CATEGORY_ID_FIRST, CATEGORY_ID_SECOND];
    planner
        .reorder_relations(CONTENT_ID_FIRST, &permutation, LIVE)
        .await
        .unwrap();
    assert_eq!(ordered(&engine, CONTENT_ID_FIRST).await, permutation);

    let unknown = planner
        .reorder_relations(CONTENT_ID_FIRST, &[CATEGORY_ID_FOURTH], LIVE)
        .await;
    assert!(matches!(unknown, Err(RelationError::UnknownMember { .. })));
    assert_eq!(ordered(&engine, CONTENT_ID_FIRST).await, permutation);
}

#[tokio::test]
async fn test_later_prepend_takes_the_position() {
    let engine = fixture_engine().await;
    let planner = engine.planner();
    planner
        .add_relation(CONTENT_ID_FIRST, CATEGORY_ID_THIRD, LIVE, Position::Prepend)
        .await
        .unwrap();
    planner
        .add_relation(CONTENT_ID_FIRST, CATEGORY_ID_FOURTH, LIVE, Position::Prepend)
        .await
        .unwrap();
    assert_eq!(
        ordered(&engine, CONTENT_ID_FIRST).await,
        vec![CATEGORY_ID_FOURTH, CATEGORY_ID_THIRD, CATEGORY_ID_FIRST, CATEGORY_ID_SECOND]
    );
}

#[tokio::test]
async fn test_duplicate_policy() {
    let engine = fixture_engine().await;
    let duplicate = engine
        .planner()
        .add_relation(CONTENT_ID_FIRST, CATEGORY_ID_FIRST, LIVE, Position::Append)
        .await;
    assert!(matches!(duplicate, Err(RelationError::DuplicateRelation { .. })));

    let mut config = Fixture::config();
    config.relations.duplicate_policy = DuplicatePolicy::Ignore;
    let engine = engine_with(config).await;
    engine
        .planner()
        .add_relation(CONTENT_ID_FIRST, CATEGORY_ID_FIRST, LIVE, Position::Append)
        .await
        .unwrap();
    assert_eq!(
        ordered(&engine, CONTENT_ID_FIRST).await,
        vec![CATEGORY_ID_FIRST, CATEGORY_ID_SECOND]
    );
}

#[tokio::test]
async fn test_relations_to_missing_or_deleted_records_are_rejected() {
    let engine = fixture_engine().await;
    let planner = engine.planner();

    let missing = planner
        .add_relation(CONTENT_ID_FIRST, 404, LIVE, Position::Append)
        .await;
    assert!(matches!(missing, Err(RelationError::RecordNotFound(404))));

    engine.cascade().delete(CATEGORY_ID_THIRD).await.unwrap();
    let deleted = planner
        .add_relation(CONTENT_ID_FIRST, CATEGORY_ID_THIRD, LIVE, Position::Append)
        .await;
    assert!(matches!(deleted, Err(RelationError::InvalidOperation(_))));

    let itself = planner
        .add_relation(CONTENT_ID_FIRST, CONTENT_ID_FIRST, LIVE, Position::Append)
        .await;
    assert!(matches!(itself, Err(RelationError::InvalidOperation(_))));
}

#[tokio::test]
async fn test_deleted_records_are_excluded_until_restored() {
    let engine = fixture_engine().await;
    engine.cascade().delete(CATEGORY_ID_SECOND).await.unwrap();

    for content in [CONTENT_ID_FIRST, CONTENT_ID_LAST] {
        let resolved = engine.verifier().resolve(content, 0, 0).await.unwrap();
        assert!(resolved.iter().all(|e| e.id != CATEGORY_ID_SECOND));
    }

    engine.repository().restore(CATEGORY_ID_SECOND).await.unwrap();
    assert_eq!(
        ordered(&engine, CONTENT_ID_FIRST).await,
        vec![CATEGORY_ID_FIRST, CATEGORY_ID_SECOND]
    );
}

#[tokio::test]
async fn test_insert_with_relations_and_edit() {
    let engine = fixture_engine().await;
    let planner = engine.planner();
    let created = planner
        .insert_with_relations(
            NewRecord::new(RecordKind::Content, "Regular Element #3").on_page(PAGE_ID),
            &[CATEGORY_ID_THIRD, CATEGORY_ID_FIRST],
            LIVE,
        )
        .await
        .unwrap();
    assert_eq!(ordered(&engine, created.id).await, vec![CATEGORY_ID_THIRD, CATEGORY_ID_FIRST]);

    let edited = planner
        .edit_record(
            created.id,
            RecordEdit {
                title: Some("Edited".to_string()),
                relations: Some(vec![CATEGORY_ID_FIRST, CATEGORY_ID_SECOND]),
            },
            LIVE,
        )
        .await
        .unwrap();
    assert_eq!(edited.title, "Edited");
    assert_eq!(ordered(&engine, created.id).await, vec![CATEGORY_ID_FIRST, CATEGORY_ID_SECOND]);

    // a failing relation change keeps the old title too
    let failed = planner
        .edit_record(
            created.id,
            RecordEdit {
                title: Some("Never stored".to_string()),
                relations: Some(vec![404]),
            },
            LIVE,
        )
        .await;
    assert!(matches!(failed, Err(RelationError::RecordNotFound(404))));
    assert_eq!(engine.repository().get(created.id).await.unwrap().title, "Edited");
}

#[tokio::test]
async fn test_copy_keeps_relations_of_source() {
    let engine = fixture_engine().await;
    let copy = engine
        .cascade()
        .copy(CONTENT_ID_FIRST, Some(PAGE_ID_TARGET), 0)
        .await
        .unwrap();

    assert_eq!(
        ordered(&engine, copy.root).await,
        ordered(&engine, CONTENT_ID_FIRST).await
    );
    // no clash on the target page, so the title is kept
    let record = engine.repository().get(copy.root).await.unwrap();
    assert_eq!(record.title, "Regular Element #1");
    assert_eq!(record.page_id, Some(PAGE_ID_TARGET));
}

#[tokio::test]
async fn test_copy_suffix_counts_up() {
    let engine = fixture_engine().await;
    let cascade = engine.cascade();
    let first = cascade.copy(CATEGORY_ID_FIRST, None, 0).await.unwrap();
    let second = cascade.copy(CATEGORY_ID_FIRST, None, 0).await.unwrap();

    let repo = engine.repository();
    assert_eq!(repo.get(first.root).await.unwrap().title, "Category A (copy 1)");
    assert_eq!(repo.get(second.root).await.unwrap().title, "Category A (copy 2)");
    assert_eq!(
        repo.latest_copy_of(CATEGORY_ID_FIRST).await.unwrap().map(|r| r.id),
        Some(second.root)
    );
}

#[tokio::test]
async fn test_page_copy_retargets_siblings() {
    let mut fixture = Fixture::many_to_many();
    fixture.records.push(
        NewRecord::new(RecordKind::Category, "Page Category")
            .with_id(40)
            .on_page(PAGE_ID),
    );
    fixture.relations.push(FixtureRelation {
        left: CONTENT_ID_FIRST,
        right: 40,
        language: 0,
        workspace: 0,
    });
    let engine = RelationEngine::connect(Fixture::config()).await.unwrap();
    fixture.load(&engine).await.unwrap();

    let copy = engine
        .cascade()
        .copy_page(PAGE_ID, Some(PAGE_ID_TARGET), 0)
        .await
        .unwrap();
    let new_content = copy.copy_of(CONTENT_ID_FIRST).unwrap();
    let new_category = copy.copy_of(40).unwrap();

    assert_eq!(
        ordered(&engine, new_content).await,
        vec![CATEGORY_ID_FIRST, CATEGORY_ID_SECOND, new_category]
    );
    // the original still points at the original sibling
    assert_eq!(
        ordered(&engine, CONTENT_ID_FIRST).await,
        vec![CATEGORY_ID_FIRST, CATEGORY_ID_SECOND, 40]
    );
    assert_eq!(
        engine.repository().get(new_category).await.unwrap().title,
        "Page Category"
    );
}

#[tokio::test]
async fn test_localization_uses_localized_counterparts() {
    let engine = fixture_engine().await;
    let cascade = engine.cascade();
    let category_da = cascade
        .localize(CATEGORY_ID_FIRST, LANGUAGE_ID, 0)
        .await
        .unwrap();
    let content_da = cascade
        .localize(CONTENT_ID_FIRST, LANGUAGE_ID, 0)
        .await
        .unwrap();

    let resolved = engine
        .verifier()
        .resolve(content_da.id, LANGUAGE_ID, 0)
        .await
        .unwrap();
    let ids: Vec<i32> = resolved.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![category_da.id, CATEGORY_ID_SECOND]);
    assert_eq!(resolved[0].default_id, CATEGORY_ID_FIRST);

    let again = cascade.localize(CONTENT_ID_FIRST, LANGUAGE_ID, 0).await;
    assert!(matches!(again, Err(RelationError::AlreadyLocalized { .. })));
}

#[tokio::test]
async fn test_localizing_a_category_retargets_localized_rows() {
    let engine = fixture_engine().await;
    let cascade = engine.cascade();
    let content_da = cascade
        .localize(CONTENT_ID_FIRST, LANGUAGE_ID, 0)
        .await
        .unwrap();
    let danish = RelationContext::new(LANGUAGE_ID, 0);
    assert_eq!(
        engine.store().list_ordered(content_da.id, danish).await.unwrap(),
        vec![CATEGORY_ID_FIRST, CATEGORY_ID_SECOND]
    );

    let category_da = cascade
        .localize(CATEGORY_ID_FIRST, LANGUAGE_ID, 0)
        .await
        .unwrap();
    assert_eq!(
        engine.store().list_ordered(content_da.id, danish).await.unwrap(),
        vec![category_da.id, CATEGORY_ID_SECOND]
    );
    assert!(engine
        .verifier()
        .verify(content_da.id, danish)
        .await
        .unwrap()
        .is_consistent());
}

#[tokio::test]
async fn test_strict_localization_rolls_back() {
    let engine = engine_with(strict_config()).await;
    let cascade = engine.cascade();
    cascade
        .localize(CATEGORY_ID_FIRST, LANGUAGE_ID, 0)
        .await
        .unwrap();

    // category B has no Danish counterpart
    let failed = cascade.localize(CONTENT_ID_FIRST, LANGUAGE_ID, 0).await;
    assert!(matches!(
        failed,
        Err(RelationError::UnresolvedCascade {
            record: CONTENT_ID_FIRST,
            ..
        })
    ));

    assert!(engine
        .repository()
        .find_localization(CONTENT_ID_FIRST, LANGUAGE_ID)
        .await
        .unwrap()
        .is_none());
    let page = engine.verifier().resolve_page(PAGE_ID, 0, 0).await.unwrap();
    assert_eq!(page.contents.len(), 2);

    // strict overlay hides untranslated categories when resolving
    let titles = engine
        .verifier()
        .resolve_titles(CONTENT_ID_FIRST, LANGUAGE_ID, 0)
        .await
        .unwrap();
    assert_eq!(titles, vec!["[Translate to Dansk:] Category A"]);
}

#[tokio::test]
async fn test_per_language_fallback_override() {
    let mut config = strict_config();
    config.localization.languages[0].fallback = Some(FallbackPolicy::Permissive);
    config.localization.languages.push(LanguageConfig {
        id: 2,
        title: "Deutsch".to_string(),
        fallback: None,
    });
    let engine = engine_with(config).await;
    let cascade = engine.cascade();

    cascade.localize(CONTENT_ID_FIRST, LANGUAGE_ID, 0).await.unwrap();
    let german = cascade.localize(CONTENT_ID_FIRST, 2, 0).await;
    assert!(matches!(german, Err(RelationError::UnresolvedCascade { .. })));
}

#[tokio::test]
async fn test_unconfigured_language_is_rejected() {
    let engine = fixture_engine().await;
    let result = engine.cascade().localize(CONTENT_ID_FIRST, 7, 0).await;
    assert!(matches!(result, Err(RelationError::InvalidConfiguration(_))));
}

#[tokio::test]
async fn test_deleting_a_page_hides_its_contents() {
    let engine = fixture_engine().await;
    let deleted = engine.cascade().delete(PAGE_ID).await.unwrap();
    assert!(deleted.contains(&CONTENT_ID_FIRST));
    assert!(deleted.contains(&CONTENT_ID_LAST));

    let page = engine.verifier().resolve_page(PAGE_ID, 0, 0).await;
    assert!(matches!(page, Err(RelationError::RecordNotFound(PAGE_ID))));
    assert!(!engine.repository().exists(CONTENT_ID_LAST).await.unwrap());
}

#[tokio::test]
async fn test_restore_undoes_a_localized_delete() {
    let engine = fixture_engine().await;
    let cascade = engine.cascade();
    let content_da = cascade
        .localize(CONTENT_ID_FIRST, LANGUAGE_ID, 0)
        .await
        .unwrap();

    let deleted = cascade.delete(CONTENT_ID_FIRST).await.unwrap();
    assert_eq!(deleted, vec![CONTENT_ID_FIRST, content_da.id]);

    let restored = cascade.restore(CONTENT_ID_FIRST).await.unwrap();
    assert_eq!(restored, vec![CONTENT_ID_FIRST, content_da.id]);
    let found = engine
        .repository()
        .find_localization(CONTENT_ID_FIRST, LANGUAGE_ID)
        .await
        .unwrap();
    assert_eq!(found.map(|r| r.id), Some(content_da.id));

    let page = engine
        .verifier()
        .resolve_page(PAGE_ID, LANGUAGE_ID, 0)
        .await
        .unwrap();
    let header = page.content(CONTENT_ID_FIRST).map(|c| c.header.clone());
    assert_eq!(
        header.as_deref(),
        Some("[Translate to Dansk:] Regular Element #1")
    );

    let again = cascade.localize(CONTENT_ID_FIRST, LANGUAGE_ID, 0).await;
    assert!(matches!(again, Err(RelationError::AlreadyLocalized { .. })));
}

#[tokio::test]
async fn test_restoring_a_page_keeps_earlier_deletes() {
    let engine = fixture_engine().await;
    let cascade = engine.cascade();
    cascade.delete(CONTENT_ID_LAST).await.unwrap();
    cascade.delete(PAGE_ID).await.unwrap();

    let restored = cascade.restore(PAGE_ID).await.unwrap();
    assert_eq!(restored, vec![PAGE_ID, CONTENT_ID_FIRST]);
    assert!(!engine.repository().exists(CONTENT_ID_LAST).await.unwrap());

    let page = engine.verifier().resolve_page(PAGE_ID, 0, 0).await.unwrap();
    let headers: Vec<&str> = page.contents.iter().map(|c| c.header.as_str()).collect();
    assert_eq!(headers, vec!["Regular Element #1"]);

    // a live record is left alone
    assert!(cascade.restore(PAGE_ID).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_needs_a_live_page() {
    let engine = fixture_engine().await;
    let cascade = engine.cascade();
    cascade.delete(PAGE_ID).await.unwrap();

    let result = cascade.restore(CONTENT_ID_FIRST).await;
    assert!(matches!(result, Err(RelationError::InvalidOperation(_))));
    assert!(!engine.repository().exists(CONTENT_ID_FIRST).await.unwrap());
}

#[tokio::test]
async fn test_relations_must_match_the_record_language() {
    let engine = fixture_engine().await;
    let planner = engine.planner();
    let danish = RelationContext::new(LANGUAGE_ID, 0);
    let content_da = engine
        .cascade()
        .localize(CONTENT_ID_FIRST, LANGUAGE_ID, 0)
        .await
        .unwrap();

    let result = planner
        .add_relation(content_da.id, CATEGORY_ID_THIRD, LIVE, Position::Append)
        .await;
    assert!(matches!(result, Err(RelationError::InvalidOperation(_))));
    assert!(ordered(&engine, content_da.id).await.is_empty());

    let result = planner
        .replace_relations(CONTENT_ID_LAST, &[CATEGORY_ID_FOURTH], danish)
        .await;
    assert!(matches!(result, Err(RelationError::InvalidOperation(_))));
    assert!(engine
        .store()
        .list_ordered(CONTENT_ID_LAST, danish)
        .await
        .unwrap()
        .is_empty());

    let result = planner
        .remove_relation(content_da.id, CATEGORY_ID_FIRST, LIVE)
        .await;
    assert!(matches!(result, Err(RelationError::InvalidOperation(_))));

    let result = planner
        .insert_with_relations(
            NewRecord::new(RecordKind::Content, "Regular Element #3").on_page(PAGE_ID),
            &[CATEGORY_ID_FIRST],
            danish,
        )
        .await;
    assert!(matches!(result, Err(RelationError::InvalidOperation(_))));

    // the localization's own language still works
    planner
        .add_relation(content_da.id, CATEGORY_ID_THIRD, danish, Position::Append)
        .await
        .unwrap();
    assert_eq!(
        engine
            .verifier()
            .resolve_titles(content_da.id, LANGUAGE_ID, 0)
            .await
            .unwrap(),
        vec!["Category A", "Category B", "Category C"]
    );
}

#[tokio::test]
async fn test_move_rejects_a_page_below_its_subpage() {
    let engine = fixture_engine().await;
    let result = engine.cascade().move_to_page(ROOT_PAGE_ID, PAGE_ID).await;
    assert!(matches!(result, Err(RelationError::InvalidOperation(_))));
    assert_eq!(
        engine.repository().get(ROOT_PAGE_ID).await.unwrap().page_id,
        None
    );

    // sibling pages can still nest
    let moved = engine
        .cascade()
        .move_to_page(PAGE_ID_TARGET, PAGE_ID)
        .await
        .unwrap();
    assert_eq!(moved.page_id, Some(PAGE_ID));
}

#[tokio::test]
async fn test_move_rejects_non_pages() {
    let engine = fixture_engine().await;
    let result = engine
        .cascade()
        .move_to_page(CONTENT_ID_FIRST, CATEGORY_ID_FIRST)
        .await;
    assert!(matches!(result, Err(RelationError::InvalidOperation(_))));
    assert_eq!(
        engine.repository().get(CONTENT_ID_FIRST).await.unwrap().page_id,
        Some(PAGE_ID)
    );
}

#[tokio::test]
async fn test_workspaces_are_isolated() {
    let engine = fixture_engine().await;
    let draft = RelationContext::new(0, 1);
    engine
        .planner()
        .replace_relations(CONTENT_ID_FIRST, &[CATEGORY_ID_THIRD], draft)
        .await
        .unwrap();

    assert_eq!(
        engine.verifier().resolve_titles(CONTENT_ID_FIRST, 0, 1).await.unwrap(),
        vec!["Category C"]
    );
    assert_eq!(
        engine.verifier().resolve_titles(CONTENT_ID_FIRST, 0, 0).await.unwrap(),
        vec!["Category A", "Category B"]
    );
}
