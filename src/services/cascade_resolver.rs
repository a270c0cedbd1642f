use std::collections::HashSet;

use indexmap::IndexMap;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::entity_repository::{self as entities, NewRecord};
use super::relation_store::{self as store, Position, RelationContext};
use crate::config::{CopyConfig, FallbackPolicy, LocalizationConfig};
use crate::database::entities::{records, RecordKind, RecordStatus};
use crate::errors::{RelationError, RelationResult};

/// Result of a copy cascade
#[derive(Debug, Clone, Serialize)]
pub struct CopyOutcome {
    /// Id of the copy of the requested record
    pub root: i32,
    /// Source id to copy id, in creation order
    pub id_map: IndexMap<i32, i32>,
}

impl CopyOutcome {
    pub fn copy_of(&self, source: i32) -> Option<i32> {
        self.id_map.get(&source).copied()
    }
}

/// Propagates entity-level operations to relation rows.
///
/// Each operation runs in one transaction and is rolled back as a whole
/// when any step fails.
#[derive(Clone)]
pub struct CascadeResolver {
    db: DatabaseConnection,
    localization: LocalizationConfig,
    copy: CopyConfig,
}

impl CascadeResolver {
    pub fn new(db: DatabaseConnection, localization: LocalizationConfig, copy: CopyConfig) -> Self {
        Self {
            db,
            localization,
            copy,
        }
    }

    /// Copy a default-language record with its localizations and relations.
    ///
    /// `target_page` of `None` copies onto the source's own page.
    pub async fn copy(
        &self,
        record_id: i32,
        target_page: Option<i32>,
        workspace_id: i32,
    ) -> RelationResult<CopyOutcome> {
        let txn = self.db.begin().await?;
        match self.copy_in(&txn, record_id, target_page, workspace_id).await {
            Ok(outcome) => {
                txn.commit().await?;
                info!(
                    "Copied record {} to {} ({} records)",
                    record_id,
                    outcome.root,
                    outcome.id_map.len()
                );
                Ok(outcome)
            }
            Err(err) => {
                txn.rollback().await?;
                warn!("Copy of record {} rolled back: {}", record_id, err);
                Err(err)
            }
        }
    }

    /// Copy a page below `target_parent` together with every record on it
    pub async fn copy_page(
        &self,
        page_id: i32,
        target_parent: Option<i32>,
        workspace_id: i32,
    ) -> RelationResult<CopyOutcome> {
        let txn = self.db.begin().await?;
        match self.copy_page_in(&txn, page_id, target_parent, workspace_id).await {
            Ok(outcome) => {
                txn.commit().await?;
                info!(
                    "Copied page {} to {} ({} records)",
                    page_id,
                    outcome.root,
                    outcome.id_map.len()
                );
                Ok(outcome)
            }
            Err(err) => {
                txn.rollback().await?;
                warn!("Copy of page {} rolled back: {}", page_id, err);
                Err(err)
            }
        }
    }

    /// Soft-delete a record, its localizations and (for pages) the records on it.
    ///
    /// Relation rows are kept; readers filter deleted records out. Returns
    /// the ids that changed state.
    pub async fn delete(&self, record_id: i32) -> RelationResult<Vec<i32>> {
        let txn = self.db.begin().await?;
        match self.delete_in(&txn, record_id).await {
            Ok(deleted) => {
                txn.commit().await?;
                info!("Deleted record {} ({} records)", record_id, deleted.len());
                Ok(deleted)
            }
            Err(err) => {
                txn.rollback().await?;
                warn!("Delete of record {} rolled back: {}", record_id, err);
                Err(err)
            }
        }
    }

    /// Undo a cascading delete.
    ///
    /// Brings back the record plus the localizations and page records that
    /// were deleted with it. Returns the ids that changed state.
    pub async fn restore(&self, record_id: i32) -> RelationResult<Vec<i32>> {
        let txn = self.db.begin().await?;
        match self.restore_in(&txn, record_id).await {
            Ok(restored) => {
                txn.commit().await?;
                info!("Restored record {} ({} records)", record_id, restored.len());
                Ok(restored)
            }
            Err(err) => {
                txn.rollback().await?;
                warn!("Restore of record {} rolled back: {}", record_id, err);
                Err(err)
            }
        }
    }

    /// Create the `language_id` localization of a record and its relation rows
    pub async fn localize(
        &self,
        record_id: i32,
        language_id: i32,
        workspace_id: i32,
    ) -> RelationResult<records::Model> {
        let txn = self.db.begin().await?;
        match self.localize_in(&txn, record_id, language_id, workspace_id).await {
            Ok(localized) => {
                txn.commit().await?;
                info!(
                    "Localized record {} into language {} as {}",
                    record_id, language_id, localized.id
                );
                Ok(localized)
            }
            Err(err) => {
                txn.rollback().await?;
                warn!(
                    "Localization of record {} into language {} rolled back: {}",
                    record_id, language_id, err
                );
                Err(err)
            }
        }
    }

    /// Move a record (and its localizations) to the end of another page.
    ///
    /// Relation rows are keyed by record id and need no change.
    pub async fn move_to_page(&self, record_id: i32, page_id: i32) -> RelationResult<records::Model> {
        let txn = self.db.begin().await?;
        match self.move_in(&txn, record_id, page_id).await {
            Ok(moved) => {
                txn.commit().await?;
                info!("Moved record {} to page {}", record_id, page_id);
                Ok(moved)
            }
            Err(err) => {
                txn.rollback().await?;
                warn!("Move of record {} rolled back: {}", record_id, err);
                Err(err)
            }
        }
    }

    async fn copyable<C: ConnectionTrait>(
        &self,
        conn: &C,
        record_id: i32,
    ) -> RelationResult<records::Model> {
        let source = entities::find_record(conn, record_id).await?;
        if !source.is_live() {
            return Err(RelationError::InvalidOperation(format!(
                "record {} is deleted",
                record_id
            )));
        }
        if source.language_id != 0 {
            return Err(RelationError::InvalidOperation(format!(
                "record {} is a localization; copy its default-language record {}",
                record_id,
                source.default_language_id()
            )));
        }
        Ok(source)
    }

    async fn unique_copy_title<C: ConnectionTrait>(
        &self,
        conn: &C,
        kind: RecordKind,
        page_id: Option<i32>,
        title: &str,
    ) -> RelationResult<String> {
        if !entities::title_taken(conn, kind, page_id, title).await? {
            return Ok(title.to_string());
        }
        let mut n = 1;
        loop {
            let candidate = self.copy.copy_title(title, n);
            if !entities::title_taken(conn, kind, page_id, &candidate).await? {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    /// Copy one record row plus its live localizations into `page_id`
    async fn copy_rows<C: ConnectionTrait>(
        &self,
        conn: &C,
        source: &records::Model,
        title: String,
        page_id: Option<i32>,
        id_map: &mut IndexMap<i32, i32>,
    ) -> RelationResult<records::Model> {
        let mut new = NewRecord::new(source.get_kind(), title);
        new.page_id = page_id;
        new.copied_from = Some(source.id);
        let copy = entities::insert_record(conn, new).await?;
        id_map.insert(source.id, copy.id);

        for localization in entities::localizations_of(conn, source.id).await? {
            let mut new = NewRecord::new(localization.get_kind(), localization.title.clone())
                .localization_of(copy.id, localization.language_id);
            new.page_id = page_id;
            new.copied_from = Some(localization.id);
            let localized_copy = entities::insert_record(conn, new).await?;
            id_map.insert(localization.id, localized_copy.id);
        }

        Ok(copy)
    }

    /// Recreate the relation rows of every copied record.
    ///
    /// Rows owned by a copied left are duplicated with their sorting, pointing
    /// at the copied right when that right was copied in the same batch.
    /// Rows from outside the batch pointing at a copied right gain an
    /// appended row to the copy.
    async fn copy_relations<C: ConnectionTrait>(
        &self,
        conn: &C,
        id_map: &IndexMap<i32, i32>,
        workspace_id: i32,
    ) -> RelationResult<()> {
        for (source, copy) in id_map {
            let (as_left, as_right) = store::rows_touching(conn, *source, workspace_id).await?;

            for row in as_left {
                let right = id_map.get(&row.right_id).copied().unwrap_or(row.right_id);
                let ctx = RelationContext::new(row.language_id, row.workspace_id);
                store::insert_row(conn, *copy, right, ctx, row.sorting).await?;
            }

            for row in as_right.into_iter().filter(|r| !id_map.contains_key(&r.left_id)) {
                let ctx = RelationContext::new(row.language_id, row.workspace_id);
                match store::add_relation(conn, row.left_id, *copy, ctx, Position::Append).await {
                    Ok(_) | Err(RelationError::DuplicateRelation { .. }) => {}
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(())
    }

    async fn copy_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        record_id: i32,
        target_page: Option<i32>,
        workspace_id: i32,
    ) -> RelationResult<CopyOutcome> {
        let source = self.copyable(conn, record_id).await?;
        let page_id = target_page.or(source.page_id);
        if let Some(page_id) = target_page {
            self.ensure_page(conn, page_id).await?;
        }

        let title = self
            .unique_copy_title(conn, source.get_kind(), page_id, &source.title)
            .await?;
        let mut id_map = IndexMap::new();
        let copy = self.copy_rows(conn, &source, title, page_id, &mut id_map).await?;
        self.copy_relations(conn, &id_map, workspace_id).await?;

        Ok(CopyOutcome {
            root: copy.id,
            id_map,
        })
    }

    async fn copy_page_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        page_id: i32,
        target_parent: Option<i32>,
        workspace_id: i32,
    ) -> RelationResult<CopyOutcome> {
        let page = self.copyable(conn, page_id).await?;
        if page.get_kind() != RecordKind::Page {
            return Err(RelationError::InvalidOperation(format!(
                "record {} is not a page",
                page_id
            )));
        }
        if let Some(parent) = target_parent {
            if parent == page_id {
                return Err(RelationError::InvalidOperation(format!(
                    "page {} cannot be copied into itself",
                    page_id
                )));
            }
            self.ensure_page(conn, parent).await?;
        }

        let title = self
            .unique_copy_title(conn, RecordKind::Page, target_parent, &page.title)
            .await?;
        let mut id_map = IndexMap::new();
        let new_page = self
            .copy_rows(conn, &page, title, target_parent, &mut id_map)
            .await?;

        // subpages are not part of a page copy
        let children: Vec<records::Model> = entities::records_on_page(conn, page_id)
            .await?
            .into_iter()
            .filter(|r| r.language_id == 0 && r.get_kind() != RecordKind::Page)
            .collect();
        for child in &children {
            self.copy_rows(conn, child, child.title.clone(), Some(new_page.id), &mut id_map)
                .await?;
        }

        self.copy_relations(conn, &id_map, workspace_id).await?;
        debug!("Page copy {} -> {} covered {:?}", page_id, new_page.id, id_map);

        Ok(CopyOutcome {
            root: new_page.id,
            id_map,
        })
    }

    async fn ensure_page<C: ConnectionTrait>(&self, conn: &C, page_id: i32) -> RelationResult<()> {
        let page = entities::find_record(conn, page_id).await?;
        if page.get_kind() != RecordKind::Page || !page.is_live() {
            return Err(RelationError::InvalidOperation(format!(
                "record {} is not a live page",
                page_id
            )));
        }
        Ok(())
    }

    /// Fails when `page_id` sits anywhere below `ancestor_id`
    async fn ensure_not_below<C: ConnectionTrait>(
        &self,
        conn: &C,
        page_id: i32,
        ancestor_id: i32,
    ) -> RelationResult<()> {
        let mut visited = HashSet::new();
        let mut current = Some(page_id);
        while let Some(id) = current {
            if id == ancestor_id {
                return Err(RelationError::InvalidOperation(format!(
                    "page {} cannot be moved below its own subpage {}",
                    ancestor_id, page_id
                )));
            }
            if !visited.insert(id) {
                break;
            }
            current = entities::find_record(conn, id).await?.page_id;
        }
        Ok(())
    }

    async fn delete_in<C: ConnectionTrait>(&self, conn: &C, record_id: i32) -> RelationResult<Vec<i32>> {
        let record = entities::find_record(conn, record_id).await?;
        if !record.is_live() {
            return Ok(Vec::new());
        }

        let mut targets = vec![record.clone()];
        targets.extend(entities::localizations_of(conn, record.id).await?);
        if record.get_kind() == RecordKind::Page {
            targets.extend(entities::records_on_page(conn, record.id).await?);
        }

        let mut deleted = Vec::with_capacity(targets.len());
        for target in targets {
            if deleted.contains(&target.id) {
                continue;
            }
            deleted.push(target.id);
            entities::set_status(conn, target, RecordStatus::Deleted).await?;
        }
        Ok(deleted)
    }

    async fn restore_in<C: ConnectionTrait>(&self, conn: &C, record_id: i32) -> RelationResult<Vec<i32>> {
        let record = entities::find_record(conn, record_id).await?;
        if record.is_live() {
            return Ok(Vec::new());
        }
        if let Some(page_id) = record.page_id {
            if !entities::find_record(conn, page_id).await?.is_live() {
                return Err(RelationError::InvalidOperation(format!(
                    "record {} sits on deleted page {}; restore the page first",
                    record_id, page_id
                )));
            }
        }
        if let Some(origin_id) = record.origin_id {
            if !entities::find_record(conn, origin_id).await?.is_live() {
                return Err(RelationError::InvalidOperation(format!(
                    "record {} is a localization of deleted record {}",
                    record_id, origin_id
                )));
            }
            if entities::find_localization(conn, origin_id, record.language_id)
                .await?
                .is_some()
            {
                return Err(RelationError::AlreadyLocalized {
                    record: origin_id,
                    language: record.language_id,
                });
            }
        }

        let dependents = entities::deleted_with(conn, &record).await?;
        let mut restored = vec![record.id];
        entities::set_status(conn, record, RecordStatus::Live).await?;

        for dependent in dependents {
            if restored.contains(&dependent.id) {
                continue;
            }
            // a newer localization took this one's place
            if let Some(origin_id) = dependent.origin_id {
                if entities::find_localization(conn, origin_id, dependent.language_id)
                    .await?
                    .is_some()
                {
                    debug!(
                        "Leaving record {} deleted, language {} is taken",
                        dependent.id, dependent.language_id
                    );
                    continue;
                }
            }
            restored.push(dependent.id);
            entities::set_status(conn, dependent, RecordStatus::Live).await?;
        }
        Ok(restored)
    }

    async fn localize_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        record_id: i32,
        language_id: i32,
        workspace_id: i32,
    ) -> RelationResult<records::Model> {
        if language_id == 0 {
            return Err(RelationError::InvalidOperation(
                "cannot localize into the default language".to_string(),
            ));
        }
        let source = entities::find_record(conn, record_id).await?;
        if !source.is_live() {
            return Err(RelationError::InvalidOperation(format!(
                "record {} is deleted",
                record_id
            )));
        }
        if source.language_id != 0 {
            return Err(RelationError::InvalidOperation(format!(
                "record {} is already a localization",
                record_id
            )));
        }
        if entities::find_localization(conn, record_id, language_id)
            .await?
            .is_some()
        {
            return Err(RelationError::AlreadyLocalized {
                record: record_id,
                language: language_id,
            });
        }

        let title = self.localization.localized_title(&source.title, language_id)?;
        let mut new = NewRecord::new(source.get_kind(), title).localization_of(source.id, language_id);
        new.page_id = source.page_id;
        let localized = entities::insert_record(conn, new).await?;

        let policy = self.localization.fallback_for(language_id);
        let default_ctx = RelationContext::new(0, workspace_id);
        let localized_ctx = RelationContext::new(language_id, workspace_id);

        let rows = store::list_rows(conn, source.id, default_ctx).await?;
        let rights: Vec<i32> = rows.iter().map(|r| r.right_id).collect();
        let right_records = entities::load_records(conn, &rights).await?;
        for row in &rows {
            let target = match right_records.get(&row.right_id) {
                Some(right) if right.is_live() => {
                    match entities::find_localization(conn, right.id, language_id).await? {
                        Some(counterpart) => counterpart.id,
                        None if policy == FallbackPolicy::Permissive => right.id,
                        None => {
                            return Err(RelationError::UnresolvedCascade {
                                record: record_id,
                                reason: format!(
                                    "related record {} has no localization in language {}",
                                    right.id, language_id
                                ),
                            })
                        }
                    }
                }
                // deleted rights are carried over untouched
                _ => row.right_id,
            };
            store::insert_row(conn, localized.id, target, localized_ctx, row.sorting).await?;
        }

        // rows in this language pointing at the default record move to the localization
        for row in store::rows_referencing(conn, source.id, localized_ctx).await? {
            if store::find_relation(conn, row.left_id, localized.id, localized_ctx)
                .await?
                .is_some()
            {
                continue;
            }
            store::retarget_right(conn, row, localized.id).await?;
        }

        Ok(localized)
    }

    async fn move_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        record_id: i32,
        page_id: i32,
    ) -> RelationResult<records::Model> {
        if record_id == page_id {
            return Err(RelationError::InvalidOperation(format!(
                "record {} cannot be moved into itself",
                record_id
            )));
        }
        let record = entities::find_record(conn, record_id).await?;
        if !record.is_live() {
            return Err(RelationError::InvalidOperation(format!(
                "record {} is deleted",
                record_id
            )));
        }
        if record.language_id != 0 {
            return Err(RelationError::InvalidOperation(format!(
                "record {} is a localization; move its default-language record",
                record_id
            )));
        }
        self.ensure_page(conn, page_id).await?;
        if record.page_id == Some(page_id) {
            return Ok(record);
        }
        if record.get_kind() == RecordKind::Page {
            self.ensure_not_below(conn, page_id, record_id).await?;
        }

        let sorting = entities::next_sorting(conn, Some(page_id)).await?;
        let moved = entities::set_page(conn, record, Some(page_id), sorting).await?;
        for localization in entities::localizations_of(conn, moved.id).await? {
            entities::set_page(conn, localization, Some(page_id), sorting).await?;
        }
        Ok(moved)
    }
}
