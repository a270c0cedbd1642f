use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::database::entities::records::{self, Entity as Records};
use crate::database::entities::{RecordKind, RecordStatus};
use crate::errors::{RelationError, RelationResult};

/// Input for creating a record.
///
/// `id` is only set when loading fixtures that need stable identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecord {
    #[serde(default)]
    pub id: Option<i32>,
    pub kind: RecordKind,
    pub title: String,
    #[serde(default)]
    pub page_id: Option<i32>,
    #[serde(default)]
    pub language_id: i32,
    #[serde(default)]
    pub origin_id: Option<i32>,
    #[serde(default, skip_serializing)]
    pub copied_from: Option<i32>,
}

impl NewRecord {
    pub fn new(kind: RecordKind, title: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            title: title.into(),
            page_id: None,
            language_id: 0,
            origin_id: None,
            copied_from: None,
        }
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn on_page(mut self, page_id: i32) -> Self {
        self.page_id = Some(page_id);
        self
    }

    pub fn localization_of(mut self, origin_id: i32, language_id: i32) -> Self {
        self.origin_id = Some(origin_id);
        self.language_id = language_id;
        self
    }
}

fn page_condition(page_id: Option<i32>) -> Condition {
    match page_id {
        Some(page_id) => Condition::all().add(records::Column::PageId.eq(page_id)),
        None => Condition::all().add(records::Column::PageId.is_null()),
    }
}

/// Next free `sorting` value among records on a page
pub async fn next_sorting<C: ConnectionTrait>(conn: &C, page_id: Option<i32>) -> RelationResult<i32> {
    let last = Records::find()
        .filter(page_condition(page_id))
        .order_by_desc(records::Column::Sorting)
        .one(conn)
        .await?;

    Ok(last.map(|r| r.sorting + 1).unwrap_or(1))
}

pub async fn insert_record<C: ConnectionTrait>(
    conn: &C,
    new: NewRecord,
) -> RelationResult<records::Model> {
    if new.language_id < 0 {
        return Err(RelationError::InvalidOperation(format!(
            "language id {} is not valid",
            new.language_id
        )));
    }
    if new.language_id != 0 && new.origin_id.is_none() && new.kind != RecordKind::Content {
        return Err(RelationError::InvalidOperation(format!(
            "{} records in language {} need a default-language origin",
            new.kind.as_str(),
            new.language_id
        )));
    }

    let sorting = next_sorting(conn, new.page_id).await?;
    let now = Utc::now();
    let record = records::ActiveModel {
        id: new.id.map(ActiveValue::Set).unwrap_or(ActiveValue::NotSet),
        kind: Set(new.kind.into()),
        title: Set(new.title),
        page_id: Set(new.page_id),
        language_id: Set(new.language_id),
        origin_id: Set(new.origin_id),
        copied_from: Set(new.copied_from),
        status: Set(RecordStatus::Live.into()),
        sorting: Set(sorting),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let record = record.insert(conn).await?;
    debug!(
        "Created {} record {} '{}' (language {})",
        record.kind, record.id, record.title, record.language_id
    );
    Ok(record)
}

pub async fn find_record<C: ConnectionTrait>(conn: &C, id: i32) -> RelationResult<records::Model> {
    Records::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(RelationError::RecordNotFound(id))
}

/// Records keyed by id; unknown ids are simply absent from the map
pub async fn load_records<C: ConnectionTrait>(
    conn: &C,
    ids: &[i32],
) -> RelationResult<HashMap<i32, records::Model>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = Records::find()
        .filter(records::Column::Id.is_in(ids.to_vec()))
        .all(conn)
        .await?;

    Ok(rows.into_iter().map(|r| (r.id, r)).collect())
}

pub async fn live_ids<C: ConnectionTrait>(conn: &C, ids: &[i32]) -> RelationResult<HashSet<i32>> {
    Ok(load_records(conn, ids)
        .await?
        .into_values()
        .filter(|r| r.is_live())
        .map(|r| r.id)
        .collect())
}

/// Live localization of `origin_id` in `language_id`, if any
pub async fn find_localization<C: ConnectionTrait>(
    conn: &C,
    origin_id: i32,
    language_id: i32,
) -> RelationResult<Option<records::Model>> {
    Ok(Records::find()
        .filter(records::Column::OriginId.eq(origin_id))
        .filter(records::Column::LanguageId.eq(language_id))
        .filter(records::Column::Status.eq(String::from(RecordStatus::Live)))
        .order_by_asc(records::Column::Id)
        .one(conn)
        .await?)
}

/// Live localizations of a default-language record, by language
pub async fn localizations_of<C: ConnectionTrait>(
    conn: &C,
    origin_id: i32,
) -> RelationResult<Vec<records::Model>> {
    Ok(Records::find()
        .filter(records::Column::OriginId.eq(origin_id))
        .filter(records::Column::Status.eq(String::from(RecordStatus::Live)))
        .order_by_asc(records::Column::LanguageId)
        .order_by_asc(records::Column::Id)
        .all(conn)
        .await?)
}

/// Live records placed on a page, ordered by their sorting
pub async fn records_on_page<C: ConnectionTrait>(
    conn: &C,
    page_id: i32,
) -> RelationResult<Vec<records::Model>> {
    Ok(Records::find()
        .filter(records::Column::PageId.eq(page_id))
        .filter(records::Column::Status.eq(String::from(RecordStatus::Live)))
        .order_by_asc(records::Column::Sorting)
        .order_by_asc(records::Column::Id)
        .all(conn)
        .await?)
}

/// Deleted localizations of `record` and, for a page, deleted records on it,
/// limited to those deleted no earlier than `record` itself
pub async fn deleted_with<C: ConnectionTrait>(
    conn: &C,
    record: &records::Model,
) -> RelationResult<Vec<records::Model>> {
    let mut owner = Condition::any().add(records::Column::OriginId.eq(record.id));
    if record.get_kind() == RecordKind::Page {
        owner = owner.add(records::Column::PageId.eq(record.id));
    }

    Ok(Records::find()
        .filter(owner)
        .filter(records::Column::Status.eq(String::from(RecordStatus::Deleted)))
        .filter(records::Column::UpdatedAt.gte(record.updated_at))
        .order_by_asc(records::Column::LanguageId)
        .order_by_asc(records::Column::Id)
        .all(conn)
        .await?)
}

/// True when a live default-language record of `kind` titled `title` sits on the page
pub async fn title_taken<C: ConnectionTrait>(
    conn: &C,
    kind: RecordKind,
    page_id: Option<i32>,
    title: &str,
) -> RelationResult<bool> {
    let existing = Records::find()
        .filter(page_condition(page_id))
        .filter(records::Column::Kind.eq(kind.as_str()))
        .filter(records::Column::Title.eq(title))
        .filter(records::Column::LanguageId.eq(0))
        .filter(records::Column::Status.eq(String::from(RecordStatus::Live)))
        .one(conn)
        .await?;

    Ok(existing.is_some())
}

pub async fn set_title<C: ConnectionTrait>(
    conn: &C,
    record: records::Model,
    title: &str,
) -> RelationResult<records::Model> {
    let mut active: records::ActiveModel = record.into();
    active.title = Set(title.to_string());
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

pub async fn set_status<C: ConnectionTrait>(
    conn: &C,
    record: records::Model,
    status: RecordStatus,
) -> RelationResult<records::Model> {
    let mut active: records::ActiveModel = record.into();
    active.status = Set(status.into());
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

pub async fn set_page<C: ConnectionTrait>(
    conn: &C,
    record: records::Model,
    page_id: Option<i32>,
    sorting: i32,
) -> RelationResult<records::Model> {
    let mut active: records::ActiveModel = record.into();
    active.page_id = Set(page_id);
    active.sorting = Set(sorting);
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

/// Record-level access without any relation cascade.
///
/// Copy, localize, move and cascading delete live in `CascadeResolver`;
/// this service only touches single rows.
#[derive(Clone)]
pub struct EntityRepository {
    db: DatabaseConnection,
}

impl EntityRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewRecord) -> RelationResult<records::Model> {
        if let Some(origin_id) = new.origin_id {
            let origin = find_record(&self.db, origin_id).await?;
            if origin.language_id != 0 {
                return Err(RelationError::InvalidOperation(format!(
                    "record {} is itself a localization",
                    origin_id
                )));
            }
        }

        let record = insert_record(&self.db, new).await?;
        info!("Created {} record {}", record.kind, record.id);
        Ok(record)
    }

    /// Insert several records in one transaction, keeping explicit ids
    pub async fn create_many(&self, records: Vec<NewRecord>) -> RelationResult<Vec<records::Model>> {
        let txn = self.db.begin().await?;
        let mut created = Vec::with_capacity(records.len());
        for new in records {
            created.push(insert_record(&txn, new).await?);
        }
        txn.commit().await?;
        Ok(created)
    }

    pub async fn get(&self, id: i32) -> RelationResult<records::Model> {
        find_record(&self.db, id).await
    }

    /// Existence check; soft-deleted records do not count
    pub async fn exists(&self, id: i32) -> RelationResult<bool> {
        Ok(Records::find_by_id(id)
            .one(&self.db)
            .await?
            .map(|r| r.is_live())
            .unwrap_or(false))
    }

    pub async fn rename(&self, id: i32, title: &str) -> RelationResult<records::Model> {
        let record = find_record(&self.db, id).await?;
        set_title(&self.db, record, title).await
    }

    /// Mark a single record deleted. Relation rows stay untouched.
    pub async fn soft_delete(&self, id: i32) -> RelationResult<records::Model> {
        let record = find_record(&self.db, id).await?;
        if !record.is_live() {
            return Ok(record);
        }
        let record = set_status(&self.db, record, RecordStatus::Deleted).await?;
        info!("Soft-deleted {} record {}", record.kind, record.id);
        Ok(record)
    }

    pub async fn restore(&self, id: i32) -> RelationResult<records::Model> {
        let record = find_record(&self.db, id).await?;
        if record.is_live() {
            return Ok(record);
        }
        let record = set_status(&self.db, record, RecordStatus::Live).await?;
        info!("Restored {} record {}", record.kind, record.id);
        Ok(record)
    }

    pub async fn find_localization(
        &self,
        origin_id: i32,
        language_id: i32,
    ) -> RelationResult<Option<records::Model>> {
        find_localization(&self.db, origin_id, language_id).await
    }

    pub async fn localizations_of(&self, origin_id: i32) -> RelationResult<Vec<records::Model>> {
        localizations_of(&self.db, origin_id).await
    }

    pub async fn records_on_page(&self, page_id: i32) -> RelationResult<Vec<records::Model>> {
        records_on_page(&self.db, page_id).await
    }

    /// Most recent copy of `source_id`, if it was ever copied
    pub async fn latest_copy_of(&self, source_id: i32) -> RelationResult<Option<records::Model>> {
        Ok(Records::find()
            .filter(records::Column::CopiedFrom.eq(source_id))
            .filter(records::Column::LanguageId.eq(0))
            .order_by_desc(records::Column::Id)
            .one(&self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::setup_test_db;

    #[tokio::test]
    async fn test_create_keeps_explicit_id_and_sorts_on_page() {
        let repo = EntityRepository::new(setup_test_db().await);
        let page = repo
            .create(NewRecord::new(RecordKind::Page, "Relations").with_id(89))
            .await
            .unwrap();
        assert_eq!(page.id, 89);

        let first = repo
            .create(NewRecord::new(RecordKind::Content, "Regular Element #1").on_page(89))
            .await
            .unwrap();
        let second = repo
            .create(NewRecord::new(RecordKind::Content, "Regular Element #2").on_page(89))
            .await
            .unwrap();
        assert_eq!(first.sorting, 1);
        assert_eq!(second.sorting, 2);

        let on_page: Vec<i32> = repo.records_on_page(89).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(on_page, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_soft_delete_and_restore() {
        let repo = EntityRepository::new(setup_test_db().await);
        let category = repo
            .create(NewRecord::new(RecordKind::Category, "Category A"))
            .await
            .unwrap();

        assert!(repo.exists(category.id).await.unwrap());
        repo.soft_delete(category.id).await.unwrap();
        assert!(!repo.exists(category.id).await.unwrap());
        assert_eq!(repo.get(category.id).await.unwrap().get_status(), RecordStatus::Deleted);

        repo.restore(category.id).await.unwrap();
        assert!(repo.exists(category.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_localization_lookup() {
        let repo = EntityRepository::new(setup_test_db().await);
        let category = repo
            .create(NewRecord::new(RecordKind::Category, "Category A"))
            .await
            .unwrap();
        let danish = repo
            .create(NewRecord::new(RecordKind::Category, "Kategori A").localization_of(category.id, 1))
            .await
            .unwrap();

        let found = repo.find_localization(category.id, 1).await.unwrap();
        assert_eq!(found.map(|r| r.id), Some(danish.id));
        assert!(repo.find_localization(category.id, 2).await.unwrap().is_none());

        let nested = repo
            .create(NewRecord::new(RecordKind::Category, "Nested").localization_of(danish.id, 2))
            .await;
        assert!(matches!(nested, Err(RelationError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_missing_record() {
        let repo = EntityRepository::new(setup_test_db().await);
        assert!(matches!(repo.get(404).await, Err(RelationError::RecordNotFound(404))));
        assert!(!repo.exists(404).await.unwrap());
    }
}
