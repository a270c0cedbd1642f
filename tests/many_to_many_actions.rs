//! Named many-to-many actions against the content/category fixture
//!
//! Each test loads page 89 with content 297 (categories A, B) and 298
//! (categories B, C), performs one action and checks what the page renders.

use relkeeper::harness::fixtures::*;
use relkeeper::harness::{perform, Fixture, NamedAction};
use relkeeper::RelationEngine;

async fn fixture_engine() -> RelationEngine {
    let engine = RelationEngine::connect(Fixture::config()).await.unwrap();
    Fixture::many_to_many().load(&engine).await.unwrap();
    engine
}

async fn titles(engine: &RelationEngine, record: i32, language: i32) -> Vec<String> {
    engine
        .verifier()
        .resolve_titles(record, language, 0)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_fixture_baseline() {
    let engine = fixture_engine().await;
    assert_eq!(titles(&engine, CONTENT_ID_FIRST, 0).await, vec!["Category A", "Category B"]);
    assert_eq!(titles(&engine, CONTENT_ID_LAST, 0).await, vec!["Category B", "Category C"]);

    let page = engine.verifier().resolve_page(PAGE_ID, 0, 0).await.unwrap();
    assert_eq!(page.title, "Relations");
    let headers: Vec<&str> = page.contents.iter().map(|c| c.header.as_str()).collect();
    assert_eq!(headers, vec!["Regular Element #1", "Regular Element #2"]);
}

#[tokio::test]
async fn test_add_category_relation() {
    let engine = fixture_engine().await;
    perform(&engine, NamedAction::AddCategoryRelation).await.unwrap();

    assert_eq!(
        titles(&engine, CONTENT_ID_FIRST, 0).await,
        vec!["Category A", "Category B", "Category A.A"]
    );
}

#[tokio::test]
async fn test_delete_category_relation() {
    let engine = fixture_engine().await;
    perform(&engine, NamedAction::DeleteCategoryRelation).await.unwrap();

    assert_eq!(titles(&engine, CONTENT_ID_FIRST, 0).await, vec!["Category A"]);
    assert_eq!(titles(&engine, CONTENT_ID_LAST, 0).await, vec!["Category B", "Category C"]);
}

#[tokio::test]
async fn test_change_category_relation_sorting() {
    let engine = fixture_engine().await;
    perform(&engine, NamedAction::ChangeCategoryRelationSorting)
        .await
        .unwrap();

    assert_eq!(titles(&engine, CONTENT_ID_FIRST, 0).await, vec!["Category B", "Category A"]);
}

#[tokio::test]
async fn test_modify_category_of_relation() {
    let engine = fixture_engine().await;
    perform(&engine, NamedAction::ModifyCategoryOfRelation).await.unwrap();

    assert_eq!(titles(&engine, CONTENT_ID_FIRST, 0).await, vec!["Testing #1", "Category B"]);
}

#[tokio::test]
async fn test_modify_content_of_relation() {
    let engine = fixture_engine().await;
    perform(&engine, NamedAction::ModifyContentOfRelation).await.unwrap();

    let page = engine.verifier().resolve_page(PAGE_ID, 0, 0).await.unwrap();
    let content = page.content_by_header("Testing #1").unwrap();
    assert_eq!(content.id, CONTENT_ID_FIRST);
    assert_eq!(content.category_titles(), vec!["Category A", "Category B"]);
}

#[tokio::test]
async fn test_modify_boths_of_relation() {
    let engine = fixture_engine().await;
    perform(&engine, NamedAction::ModifyBothsOfRelation).await.unwrap();

    let page = engine.verifier().resolve_page(PAGE_ID, 0, 0).await.unwrap();
    let content = page.content_by_header("Testing #1").unwrap();
    assert_eq!(content.category_titles(), vec!["Testing #1", "Category B"]);
}

#[tokio::test]
async fn test_delete_content_of_relation() {
    let engine = fixture_engine().await;
    perform(&engine, NamedAction::DeleteContentOfRelation).await.unwrap();

    let page = engine.verifier().resolve_page(PAGE_ID, 0, 0).await.unwrap();
    assert!(page.content(CONTENT_ID_FIRST).is_none());
    assert!(page.content_by_header("Regular Element #1").is_none());
    assert!(titles(&engine, CONTENT_ID_FIRST, 0).await.is_empty());

    // rows are kept for undo
    let rows = engine
        .store()
        .list_rows(CONTENT_ID_FIRST, Default::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_delete_category_of_relation() {
    let engine = fixture_engine().await;
    perform(&engine, NamedAction::DeleteCategoryOfRelation).await.unwrap();

    assert_eq!(titles(&engine, CONTENT_ID_FIRST, 0).await, vec!["Category B"]);
    assert_eq!(titles(&engine, CONTENT_ID_LAST, 0).await, vec!["Category B", "Category C"]);
}

#[tokio::test]
async fn test_copy_content_of_relation() {
    let engine = fixture_engine().await;
    let outcome = perform(&engine, NamedAction::CopyContentOfRelation).await.unwrap();
    let new_content = outcome.id("newContentId").unwrap();

    assert_ne!(new_content, CONTENT_ID_LAST);
    assert_eq!(titles(&engine, new_content, 0).await, vec!["Category B", "Category C"]);

    let copy = engine.repository().get(new_content).await.unwrap();
    assert_eq!(copy.page_id, Some(PAGE_ID));
    assert_eq!(copy.copied_from, Some(CONTENT_ID_LAST));
    assert_eq!(copy.title, "Regular Element #2 (copy 1)");
}

#[tokio::test]
async fn test_copy_category_of_relation() {
    let engine = fixture_engine().await;
    let outcome = perform(&engine, NamedAction::CopyCategoryOfRelation).await.unwrap();
    let new_category = outcome.id("newCategoryId").unwrap();

    let related = titles(&engine, CONTENT_ID_FIRST, 0).await;
    assert!(related.contains(&"Category A".to_string()));
    assert!(related.contains(&"Category A (copy 1)".to_string()));

    let referencing = engine
        .store()
        .list_referencing(new_category, Default::default())
        .await
        .unwrap();
    assert_eq!(referencing, vec![CONTENT_ID_FIRST]);
}

#[tokio::test]
async fn test_localize_content_of_relation() {
    let engine = fixture_engine().await;
    let outcome = perform(&engine, NamedAction::LocalizeContentOfRelation).await.unwrap();
    let localized = outcome.id("localizedContentId").unwrap();

    assert_eq!(
        titles(&engine, CONTENT_ID_LAST, LANGUAGE_ID).await,
        vec!["Category B", "Category C"]
    );
    assert_eq!(
        titles(&engine, localized, LANGUAGE_ID).await,
        vec!["Category B", "Category C"]
    );

    let page = engine
        .verifier()
        .resolve_page(PAGE_ID, LANGUAGE_ID, 0)
        .await
        .unwrap();
    let content = page.content(CONTENT_ID_LAST).unwrap();
    assert_eq!(content.id, localized);
    assert_eq!(content.header, "[Translate to Dansk:] Regular Element #2");
}

#[tokio::test]
async fn test_localize_category_of_relation() {
    let engine = fixture_engine().await;
    perform(&engine, NamedAction::LocalizeCategoryOfRelation).await.unwrap();

    assert_eq!(
        titles(&engine, CONTENT_ID_FIRST, LANGUAGE_ID).await,
        vec!["[Translate to Dansk:] Category A", "Category B"]
    );
    // the default language is untouched
    assert_eq!(titles(&engine, CONTENT_ID_FIRST, 0).await, vec!["Category A", "Category B"]);
}

#[tokio::test]
async fn test_move_content_of_relation_to_different_page() {
    let engine = fixture_engine().await;
    perform(&engine, NamedAction::MoveContentOfRelationToDifferentPage)
        .await
        .unwrap();

    let target = engine
        .verifier()
        .resolve_page(PAGE_ID_TARGET, 0, 0)
        .await
        .unwrap();
    let moved = target.content_by_header("Regular Element #2").unwrap();
    assert_eq!(moved.id, CONTENT_ID_LAST);
    assert_eq!(moved.category_titles(), vec!["Category B", "Category C"]);

    let source = engine.verifier().resolve_page(PAGE_ID, 0, 0).await.unwrap();
    assert!(source.content(CONTENT_ID_LAST).is_none());
}

#[tokio::test]
async fn test_copy_page() {
    let engine = fixture_engine().await;
    let outcome = perform(&engine, NamedAction::CopyPage).await.unwrap();
    let new_page = outcome.id("newPageId").unwrap();

    let page = engine.verifier().resolve_page(new_page, 0, 0).await.unwrap();
    assert_eq!(page.title, "Relations");

    let first = page.content_by_header("Regular Element #1").unwrap();
    assert_eq!(first.category_titles(), vec!["Category A", "Category B"]);
    assert_eq!(Some(first.id), outcome.id("newContentIdFirst"));
    assert_ne!(first.id, CONTENT_ID_FIRST);

    let last = page.content_by_header("Regular Element #2").unwrap();
    assert_eq!(last.category_titles(), vec!["Category B", "Category C"]);
    assert_eq!(Some(last.id), outcome.id("newContentIdLast"));

    let copied = engine.repository().get(new_page).await.unwrap();
    assert_eq!(copied.page_id, Some(PAGE_ID_TARGET));
}

#[tokio::test]
async fn test_every_action_keeps_sorting_dense() {
    for action in NamedAction::ALL {
        let engine = fixture_engine().await;
        perform(&engine, action).await.unwrap();

        for record in [CONTENT_ID_FIRST, CONTENT_ID_LAST] {
            for language in [0, LANGUAGE_ID] {
                let report = engine
                    .verifier()
                    .verify(record, relkeeper::services::RelationContext::new(language, 0))
                    .await
                    .unwrap();
                assert!(report.is_consistent(), "{} broke {:?}", action, report);
            }
        }
    }
}
