use std::collections::HashSet;

use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::entity_repository::{self as entities, NewRecord};
use super::relation_store::{self as store, Position, RelationContext};
use crate::config::{DuplicatePolicy, RelationConfig};
use crate::database::entities::{records, RecordStatus};
use crate::errors::{RelationError, RelationResult};

/// One relation write produced by the planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "write", rename_all = "snake_case")]
pub enum PlannedWrite {
    Add {
        left: i32,
        right: i32,
        position: Position,
    },
    Remove {
        left: i32,
        right: i32,
    },
    Reorder {
        left: i32,
        order: Vec<i32>,
    },
}

/// Ordered writes for one context, applied in a single transaction
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MutationPlan {
    pub context: RelationContext,
    pub writes: Vec<PlannedWrite>,
}

impl MutationPlan {
    pub fn new(context: RelationContext) -> Self {
        Self {
            context,
            writes: Vec::new(),
        }
    }

    /// Writes turning `current` into `requested`.
    ///
    /// Stale ids are removed, new ones appended, then everything is put in
    /// the requested order. Repeated requested ids count once.
    pub fn replace(left: i32, current: &[i32], requested: &[i32], context: RelationContext) -> Self {
        let mut seen = HashSet::new();
        let requested: Vec<i32> = requested.iter().copied().filter(|id| seen.insert(*id)).collect();
        let current_set: HashSet<i32> = current.iter().copied().collect();

        let mut plan = Self::new(context);
        for right in current.iter().filter(|id| !seen.contains(id)) {
            plan.writes.push(PlannedWrite::Remove {
                left,
                right: *right,
            });
        }
        for right in requested.iter().filter(|id| !current_set.contains(id)) {
            plan.writes.push(PlannedWrite::Add {
                left,
                right: *right,
                position: Position::Append,
            });
        }

        let kept: Vec<i32> = current.iter().copied().filter(|id| seen.contains(id)).collect();
        let appended: Vec<i32> = requested
            .iter()
            .copied()
            .filter(|id| !current_set.contains(id))
            .collect();
        let resulting: Vec<i32> = kept.into_iter().chain(appended).collect();
        if !requested.is_empty() && resulting != requested {
            plan.writes.push(PlannedWrite::Reorder {
                left,
                order: requested,
            });
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Apply a plan on an open connection or transaction
pub async fn apply_plan<C: ConnectionTrait>(
    conn: &C,
    plan: &MutationPlan,
    duplicate_policy: DuplicatePolicy,
) -> RelationResult<()> {
    let ctx = plan.context;
    for write in &plan.writes {
        match write {
            PlannedWrite::Add {
                left,
                right,
                position,
            } => match store::add_relation(conn, *left, *right, ctx, *position).await {
                Err(RelationError::DuplicateRelation { .. })
                    if duplicate_policy == DuplicatePolicy::Ignore =>
                {
                    debug!("Ignoring existing relation {} -> {}", left, right);
                }
                other => {
                    other?;
                }
            },
            PlannedWrite::Remove { left, right } => {
                store::remove_relation(conn, *left, *right, ctx).await?;
            }
            PlannedWrite::Reorder { left, order } => {
                store::reorder_relations(conn, *left, order, ctx).await?;
            }
        }
    }
    Ok(())
}

async fn ensure_live<C: ConnectionTrait>(conn: &C, id: i32) -> RelationResult<records::Model> {
    let record = entities::find_record(conn, id).await?;
    if !record.is_live() {
        return Err(RelationError::InvalidOperation(format!(
            "record {} is deleted",
            id
        )));
    }
    Ok(record)
}

/// Relation rows of a record live in the record's own language
fn ensure_scope(left: &records::Model, ctx: RelationContext) -> RelationResult<()> {
    if left.language_id != ctx.language_id {
        return Err(RelationError::InvalidOperation(format!(
            "record {} is in language {}, relations were addressed to language {}",
            left.id, left.language_id, ctx.language_id
        )));
    }
    Ok(())
}

/// Field changes for `edit_record`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordEdit {
    #[serde(default)]
    pub title: Option<String>,
    /// Full replacement of the record's related ids
    #[serde(default)]
    pub relations: Option<Vec<i32>>,
}

/// Turns record-level edits into relation writes.
///
/// Every public call runs in one transaction; a failing write leaves the
/// store exactly as it was.
#[derive(Clone)]
pub struct MutationPlanner {
    db: DatabaseConnection,
    config: RelationConfig,
}

impl MutationPlanner {
    pub fn new(db: DatabaseConnection, config: RelationConfig) -> Self {
        Self { db, config }
    }

    /// Create a record and relate it to `rights`, in order
    pub async fn insert_with_relations(
        &self,
        new: NewRecord,
        rights: &[i32],
        ctx: RelationContext,
    ) -> RelationResult<records::Model> {
        if !rights.is_empty() && new.language_id != ctx.language_id {
            return Err(RelationError::InvalidOperation(format!(
                "a record in language {} cannot take relations in language {}",
                new.language_id, ctx.language_id
            )));
        }

        let txn = self.db.begin().await?;
        for right in rights {
            ensure_live(&txn, *right).await?;
        }
        let record = entities::insert_record(&txn, new).await?;

        let plan = MutationPlan::replace(record.id, &[], rights, ctx);
        apply_plan(&txn, &plan, self.config.duplicate_policy).await?;
        txn.commit().await?;

        info!(
            "Inserted {} record {} with {} relations",
            record.kind,
            record.id,
            rights.len()
        );
        Ok(record)
    }

    pub async fn add_relation(
        &self,
        left: i32,
        right: i32,
        ctx: RelationContext,
        position: Position,
    ) -> RelationResult<()> {
        if left == right {
            return Err(RelationError::InvalidOperation(format!(
                "record {} cannot relate to itself",
                left
            )));
        }

        let txn = self.db.begin().await?;
        let left_record = ensure_live(&txn, left).await?;
        ensure_scope(&left_record, ctx)?;
        ensure_live(&txn, right).await?;

        let mut plan = MutationPlan::new(ctx);
        plan.writes.push(PlannedWrite::Add {
            left,
            right,
            position,
        });
        apply_plan(&txn, &plan, self.config.duplicate_policy).await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn remove_relation(
        &self,
        left: i32,
        right: i32,
        ctx: RelationContext,
    ) -> RelationResult<()> {
        let txn = self.db.begin().await?;
        ensure_scope(&entities::find_record(&txn, left).await?, ctx)?;
        store::remove_relation(&txn, left, right, ctx).await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn reorder_relations(
        &self,
        left: i32,
        ordered: &[i32],
        ctx: RelationContext,
    ) -> RelationResult<Vec<i32>> {
        let txn = self.db.begin().await?;
        ensure_scope(&entities::find_record(&txn, left).await?, ctx)?;
        let order = store::reorder_relations(&txn, left, ordered, ctx).await?;
        txn.commit().await?;
        Ok(order)
    }

    /// Replace the full relation list of `left`; returns the applied plan
    pub async fn replace_relations(
        &self,
        left: i32,
        requested: &[i32],
        ctx: RelationContext,
    ) -> RelationResult<MutationPlan> {
        let txn = self.db.begin().await?;
        let plan = self.replace_in(&txn, left, requested, ctx).await?;
        txn.commit().await?;
        Ok(plan)
    }

    async fn replace_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        left: i32,
        requested: &[i32],
        ctx: RelationContext,
    ) -> RelationResult<MutationPlan> {
        let left_record = ensure_live(conn, left).await?;
        ensure_scope(&left_record, ctx)?;
        let current: Vec<i32> = store::list_rows(conn, left, ctx)
            .await?
            .iter()
            .map(|r| r.right_id)
            .collect();
        let current_set: HashSet<i32> = current.iter().copied().collect();
        for right in requested.iter().filter(|id| !current_set.contains(id)) {
            if *right == left {
                return Err(RelationError::InvalidOperation(format!(
                    "record {} cannot relate to itself",
                    left
                )));
            }
            ensure_live(conn, *right).await?;
        }

        let plan = MutationPlan::replace(left, &current, requested, ctx);
        apply_plan(conn, &plan, self.config.duplicate_policy).await?;
        debug!("Replaced relations of {} with {} writes", left, plan.writes.len());
        Ok(plan)
    }

    /// Update a record's title and/or relations atomically
    pub async fn edit_record(
        &self,
        record_id: i32,
        edit: RecordEdit,
        ctx: RelationContext,
    ) -> RelationResult<records::Model> {
        let txn = self.db.begin().await?;
        let result = self.edit_in(&txn, record_id, edit, ctx).await;
        match result {
            Ok(record) => {
                txn.commit().await?;
                Ok(record)
            }
            Err(err) => {
                txn.rollback().await?;
                warn!("Edit of record {} rolled back: {}", record_id, err);
                Err(err)
            }
        }
    }

    async fn edit_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        record_id: i32,
        edit: RecordEdit,
        ctx: RelationContext,
    ) -> RelationResult<records::Model> {
        let mut record = ensure_live(conn, record_id).await?;
        if let Some(title) = edit.title.as_deref() {
            record = entities::set_title(conn, record, title).await?;
        }
        if let Some(relations) = edit.relations.as_deref() {
            self.replace_in(conn, record_id, relations, ctx).await?;
        }
        Ok(record)
    }

    /// Soft-delete a single record; its relation rows are kept
    pub async fn delete_record(&self, record_id: i32) -> RelationResult<records::Model> {
        let record = entities::find_record(&self.db, record_id).await?;
        if !record.is_live() {
            return Ok(record);
        }
        entities::set_status(&self.db, record, RecordStatus::Deleted).await
    }
}
