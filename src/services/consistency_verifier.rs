use std::collections::HashSet;

use sea_orm::{ConnectionTrait, DatabaseConnection};
use serde::Serialize;
use tracing::debug;

use super::entity_repository as entities;
use super::relation_store::{self as store, RelationContext};
use crate::config::{FallbackPolicy, LocalizationConfig};
use crate::database::entities::{records, RecordKind};
use crate::errors::{RelationError, RelationResult};

/// A related record as seen in one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEntity {
    /// Id of the record actually displayed (a localization when one exists)
    pub id: i32,
    /// Default-language id the displayed record stands for
    pub default_id: i32,
    pub title: String,
}

impl From<&records::Model> for ResolvedEntity {
    fn from(record: &records::Model) -> Self {
        Self {
            id: record.id,
            default_id: record.default_language_id(),
            title: record.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentView {
    pub id: i32,
    pub default_id: i32,
    pub header: String,
    pub categories: Vec<ResolvedEntity>,
}

impl ContentView {
    pub fn category_titles(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.title.as_str()).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub id: i32,
    pub title: String,
    pub contents: Vec<ContentView>,
}

impl PageView {
    pub fn content_by_header(&self, header: &str) -> Option<&ContentView> {
        self.contents.iter().find(|c| c.header == header)
    }

    pub fn content(&self, default_id: i32) -> Option<&ContentView> {
        self.contents.iter().find(|c| c.default_id == default_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    /// The same right id appears on more than one row
    DuplicateRight { right: i32 },
    /// Sorting is not the dense sequence 1..n
    SortingGap { right: i32, expected: i32, found: i32 },
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyReport {
    pub left: i32,
    pub context: RelationContext,
    pub violations: Vec<Violation>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Read side of the engine: what a record's relations look like in a
/// given language and workspace after overlays and deletions.
#[derive(Clone)]
pub struct ConsistencyVerifier {
    db: DatabaseConnection,
    localization: LocalizationConfig,
}

impl ConsistencyVerifier {
    pub fn new(db: DatabaseConnection, localization: LocalizationConfig) -> Self {
        Self { db, localization }
    }

    /// The record shown for `record` in `language_id`, or `None` if hidden
    async fn overlay<C: ConnectionTrait>(
        &self,
        conn: &C,
        record: &records::Model,
        language_id: i32,
    ) -> RelationResult<Option<records::Model>> {
        if !record.is_live() {
            return Ok(None);
        }
        if record.language_id == language_id {
            return Ok(Some(record.clone()));
        }
        if record.language_id != 0 {
            // localization of another language
            return Ok(None);
        }
        match entities::find_localization(conn, record.id, language_id).await? {
            Some(counterpart) => Ok(Some(counterpart)),
            None => match self.localization.fallback_for(language_id) {
                FallbackPolicy::Permissive => Ok(Some(record.clone())),
                FallbackPolicy::Strict => Ok(None),
            },
        }
    }

    async fn resolve_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        record: &records::Model,
        language_id: i32,
        workspace_id: i32,
    ) -> RelationResult<Vec<ResolvedEntity>> {
        if !record.is_live() {
            return Ok(Vec::new());
        }

        // pick the row set: the record's own language, else its localization,
        // else the default-language rows
        let (left, rows_language) = if record.language_id == language_id {
            (record.id, language_id)
        } else if record.language_id == 0 {
            match entities::find_localization(conn, record.id, language_id).await? {
                Some(localized) => (localized.id, language_id),
                None => (record.id, 0),
            }
        } else {
            (record.id, record.language_id)
        };

        let rows = store::list_rows(conn, left, RelationContext::new(rows_language, workspace_id)).await?;
        let rights: Vec<i32> = rows.iter().map(|r| r.right_id).collect();
        let right_records = entities::load_records(conn, &rights).await?;

        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(rows.len());
        for right in rights.iter().filter_map(|id| right_records.get(id)) {
            if let Some(shown) = self.overlay(conn, right, language_id).await? {
                if seen.insert(shown.id) {
                    resolved.push(ResolvedEntity::from(&shown));
                }
            }
        }

        debug!(
            "Resolved {} in language {} workspace {} via {} rows of {}",
            record.id,
            language_id,
            workspace_id,
            rows.len(),
            left
        );
        Ok(resolved)
    }

    /// Related records of `record_id` as displayed in a language and workspace.
    ///
    /// Soft-deleted records are never returned; a deleted `record_id`
    /// resolves to an empty list.
    pub async fn resolve(
        &self,
        record_id: i32,
        language_id: i32,
        workspace_id: i32,
    ) -> RelationResult<Vec<ResolvedEntity>> {
        let record = entities::find_record(&self.db, record_id).await?;
        self.resolve_in(&self.db, &record, language_id, workspace_id).await
    }

    pub async fn resolve_titles(
        &self,
        record_id: i32,
        language_id: i32,
        workspace_id: i32,
    ) -> RelationResult<Vec<String>> {
        Ok(self
            .resolve(record_id, language_id, workspace_id)
            .await?
            .into_iter()
            .map(|e| e.title)
            .collect())
    }

    /// Live content records referencing `record_id` through relations
    pub async fn referencing(
        &self,
        record_id: i32,
        ctx: RelationContext,
    ) -> RelationResult<Vec<i32>> {
        store::list_referencing(&self.db, record_id, ctx).await
    }

    /// Page rendering: visible contents with their resolved categories
    pub async fn resolve_page(
        &self,
        page_id: i32,
        language_id: i32,
        workspace_id: i32,
    ) -> RelationResult<PageView> {
        let page = entities::find_record(&self.db, page_id).await?;
        if page.get_kind() != RecordKind::Page || !page.is_live() {
            return Err(RelationError::RecordNotFound(page_id));
        }
        let shown_page = self
            .overlay(&self.db, &page, language_id)
            .await?
            .unwrap_or_else(|| page.clone());

        let mut contents = Vec::new();
        for record in entities::records_on_page(&self.db, page_id).await? {
            if record.get_kind() != RecordKind::Content {
                continue;
            }
            let shown = if record.language_id == 0 {
                self.overlay(&self.db, &record, language_id).await?
            } else if language_id != 0 && record.language_id == language_id && record.origin_id.is_none() {
                // content created directly in this language
                Some(record)
            } else {
                None
            };
            let Some(shown) = shown else { continue };

            let categories = self
                .resolve_in(&self.db, &shown, language_id, workspace_id)
                .await?;
            contents.push(ContentView {
                id: shown.id,
                default_id: shown.default_language_id(),
                header: shown.title.clone(),
                categories,
            });
        }

        Ok(PageView {
            id: page.id,
            title: shown_page.title,
            contents,
        })
    }

    /// Check ordering invariants of one left's rows
    pub async fn verify(&self, left: i32, ctx: RelationContext) -> RelationResult<ConsistencyReport> {
        let rows = store::list_rows(&self.db, left, ctx).await?;
        let mut seen = HashSet::new();
        let mut violations = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if !seen.insert(row.right_id) {
                violations.push(Violation::DuplicateRight { right: row.right_id });
            }
            let expected = index as i32 + 1;
            if row.sorting != expected {
                violations.push(Violation::SortingGap {
                    right: row.right_id,
                    expected,
                    found: row.sorting,
                });
            }
        }

        Ok(ConsistencyReport {
            left,
            context: ctx,
            violations,
        })
    }
}
