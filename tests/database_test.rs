//! Database functionality tests
//!
//! Migrations, entity operations and the constraints the relation store relies on

use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, Set,
};
use tempfile::NamedTempFile;

use relkeeper::database::entities::{records, relations, RecordKind, RecordStatus};
use relkeeper::database::{migrate_database, open_database, setup_database, MigrateDirection};

/// Create a test database connection with migrations
async fn setup_test_db() -> Result<(DatabaseConnection, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", temp_file.path().display());

    let db = Database::connect(&db_url).await?;
    setup_database(&db).await?;

    Ok((db, temp_file))
}

async fn insert_record(db: &DatabaseConnection, kind: RecordKind, title: &str) -> Result<records::Model> {
    let now = Utc::now();
    let record = records::ActiveModel {
        kind: Set(kind.as_str().to_string()),
        title: Set(title.to_string()),
        page_id: Set(None),
        language_id: Set(0),
        origin_id: Set(None),
        copied_from: Set(None),
        status: Set(RecordStatus::Live.into()),
        sorting: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    Ok(record.insert(db).await?)
}

async fn insert_relation(db: &DatabaseConnection, left: i32, right: i32) -> Result<relations::Model, sea_orm::DbErr> {
    relations::ActiveModel {
        left_id: Set(left),
        right_id: Set(right),
        sorting: Set(1),
        sorting_foreign: Set(1),
        language_id: Set(0),
        workspace_id: Set(0),
        ..Default::default()
    }
    .insert(db)
    .await
}

#[tokio::test]
async fn test_database_migrations() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;

    let records = records::Entity::find().all(&db).await?;
    assert_eq!(records.len(), 0);

    let relations = relations::Entity::find().all(&db).await?;
    assert_eq!(relations.len(), 0);

    // running them again is a no-op
    setup_database(&db).await?;
    Ok(())
}

#[tokio::test]
async fn test_record_crud_operations() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;

    let record = insert_record(&db, RecordKind::Category, "Category A").await?;
    assert_eq!(record.get_kind(), RecordKind::Category);
    assert!(record.is_live());

    let found = records::Entity::find_by_id(record.id)
        .one(&db)
        .await?
        .expect("Record should exist");
    assert_eq!(found.title, "Category A");

    let mut update: records::ActiveModel = found.into();
    update.title = Set("Category A.A".to_string());
    let updated = update.update(&db).await?;
    assert_eq!(updated.title, "Category A.A");

    updated.delete(&db).await?;
    assert!(records::Entity::find_by_id(record.id).one(&db).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_relation_tuple_is_unique() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let content = insert_record(&db, RecordKind::Content, "Regular Element #1").await?;
    let category = insert_record(&db, RecordKind::Category, "Category A").await?;

    insert_relation(&db, content.id, category.id).await?;
    let duplicate = insert_relation(&db, content.id, category.id).await;
    assert!(duplicate.is_err());

    let err = relkeeper::RelationError::from_insert(duplicate.unwrap_err(), content.id, category.id, 0, 0);
    assert_eq!(err.error_code(), "CONFLICT");
    Ok(())
}

#[tokio::test]
async fn test_relation_to_missing_record_is_rejected() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let content = insert_record(&db, RecordKind::Content, "Regular Element #1").await?;

    let dangling = insert_relation(&db, content.id, 404).await;
    assert!(dangling.is_err());

    let err = relkeeper::RelationError::from_insert(dangling.unwrap_err(), content.id, 404, 0, 0);
    assert_eq!(err.error_code(), "INVALID_OPERATION");
    Ok(())
}

#[tokio::test]
async fn test_relations_follow_physical_deletes()-> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let content = insert_record(&db, RecordKind::Content, "Regular Element #1").await?;
    let category = insert_record(&db, RecordKind::Category, "Category A").await?;
    insert_relation(&db, content.id, category.id).await?;

    category.delete(&db).await?;
    let remaining = relations::Entity::find()
        .filter(relations::Column::LeftId.eq(content.id))
        .all(&db)
        .await?;
    assert!(remaining.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_migrate_down_and_fresh() -> Result<()> {
    let temp_file = NamedTempFile::new()?;
    let path = temp_file.path().display().to_string();

    let db = open_database(Some(&path)).await?;
    insert_record(&db, RecordKind::Page, "Root").await?;
    drop(db);

    migrate_database(Some(&path), MigrateDirection::Fresh).await?;
    let db = open_database(Some(&path)).await?;
    assert!(records::Entity::find().all(&db).await?.is_empty());
    drop(db);

    migrate_database(Some(&path), MigrateDirection::Down).await?;
    let db = Database::connect(format!("sqlite://{}?mode=rwc", path)).await?;
    assert!(records::Entity::find().all(&db).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_in_memory_database_is_migrated() -> Result<()> {
    let db = open_database(Some(":memory:")).await?;
    let page = insert_record(&db, RecordKind::Page, "Root").await?;
    assert_eq!(page.language_id, 0);
    assert_eq!(page.get_status(), RecordStatus::Live);
    Ok(())
}
