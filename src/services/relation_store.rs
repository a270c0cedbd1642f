use std::collections::{HashMap, HashSet};

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::entity_repository::live_ids;
use crate::database::entities::relations::{self, Entity as Relations};
use crate::errors::{RelationError, RelationResult};

/// Language and workspace a relation row belongs to.
///
/// Rows in different contexts never see each other: ordering, duplicate
/// detection and reads are all scoped to one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RelationContext {
    #[serde(default)]
    pub language_id: i32,
    #[serde(default)]
    pub workspace_id: i32,
}

impl RelationContext {
    /// Default language, live workspace
    pub const LIVE: RelationContext = RelationContext {
        language_id: 0,
        workspace_id: 0,
    };

    pub fn new(language_id: i32, workspace_id: i32) -> Self {
        Self {
            language_id,
            workspace_id,
        }
    }

    pub fn in_language(self, language_id: i32) -> Self {
        Self {
            language_id,
            ..self
        }
    }
}

/// Where `add` places the new right id in the left's ordered list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    #[default]
    Append,
    Prepend,
    /// Directly after the given right id, which must already be related
    After(i32),
}

fn left_scope(left: i32, ctx: RelationContext) -> Condition {
    Condition::all()
        .add(relations::Column::LeftId.eq(left))
        .add(relations::Column::LanguageId.eq(ctx.language_id))
        .add(relations::Column::WorkspaceId.eq(ctx.workspace_id))
}

fn right_scope(right: i32, ctx: RelationContext) -> Condition {
    Condition::all()
        .add(relations::Column::RightId.eq(right))
        .add(relations::Column::LanguageId.eq(ctx.language_id))
        .add(relations::Column::WorkspaceId.eq(ctx.workspace_id))
}

pub async fn find_relation<C: ConnectionTrait>(
    conn: &C,
    left: i32,
    right: i32,
    ctx: RelationContext,
) -> RelationResult<Option<relations::Model>> {
    Ok(Relations::find()
        .filter(left_scope(left, ctx))
        .filter(relations::Column::RightId.eq(right))
        .one(conn)
        .await?)
}

/// Raw rows of a left in one context, deleted rights included
pub async fn list_rows<C: ConnectionTrait>(
    conn: &C,
    left: i32,
    ctx: RelationContext,
) -> RelationResult<Vec<relations::Model>> {
    Ok(Relations::find()
        .filter(left_scope(left, ctx))
        .order_by_asc(relations::Column::Sorting)
        .order_by_asc(relations::Column::Id)
        .all(conn)
        .await?)
}

/// Rows pointing at `right` in one context, ordered by `sorting_foreign`
pub async fn rows_referencing<C: ConnectionTrait>(
    conn: &C,
    right: i32,
    ctx: RelationContext,
) -> RelationResult<Vec<relations::Model>> {
    Ok(Relations::find()
        .filter(right_scope(right, ctx))
        .order_by_asc(relations::Column::SortingForeign)
        .order_by_asc(relations::Column::Id)
        .all(conn)
        .await?)
}

/// Every row of a left or right in a workspace, across all languages
pub async fn rows_touching<C: ConnectionTrait>(
    conn: &C,
    record: i32,
    workspace_id: i32,
) -> RelationResult<(Vec<relations::Model>, Vec<relations::Model>)> {
    let as_left = Relations::find()
        .filter(relations::Column::LeftId.eq(record))
        .filter(relations::Column::WorkspaceId.eq(workspace_id))
        .order_by_asc(relations::Column::LanguageId)
        .order_by_asc(relations::Column::Sorting)
        .all(conn)
        .await?;
    let as_right = Relations::find()
        .filter(relations::Column::RightId.eq(record))
        .filter(relations::Column::WorkspaceId.eq(workspace_id))
        .order_by_asc(relations::Column::LanguageId)
        .order_by_asc(relations::Column::LeftId)
        .order_by_asc(relations::Column::Sorting)
        .all(conn)
        .await?;

    Ok((as_left, as_right))
}

async fn next_foreign_sorting<C: ConnectionTrait>(
    conn: &C,
    right: i32,
    ctx: RelationContext,
) -> RelationResult<i32> {
    let last = Relations::find()
        .filter(right_scope(right, ctx))
        .order_by_desc(relations::Column::SortingForeign)
        .one(conn)
        .await?;
    Ok(last.map(|r| r.sorting_foreign + 1).unwrap_or(1))
}

/// Shift `sorting` of every row at or after `from` by `delta`
async fn shift_sorting<C: ConnectionTrait>(
    conn: &C,
    left: i32,
    ctx: RelationContext,
    from: i32,
    delta: i32,
) -> RelationResult<()> {
    Relations::update_many()
        .col_expr(
            relations::Column::Sorting,
            Expr::col(relations::Column::Sorting).add(delta),
        )
        .filter(left_scope(left, ctx))
        .filter(relations::Column::Sorting.gte(from))
        .exec(conn)
        .await?;
    Ok(())
}

async fn shift_foreign_sorting<C: ConnectionTrait>(
    conn: &C,
    right: i32,
    ctx: RelationContext,
    from: i32,
    delta: i32,
) -> RelationResult<()> {
    Relations::update_many()
        .col_expr(
            relations::Column::SortingForeign,
            Expr::col(relations::Column::SortingForeign).add(delta),
        )
        .filter(right_scope(right, ctx))
        .filter(relations::Column::SortingForeign.gte(from))
        .exec(conn)
        .await?;
    Ok(())
}

/// Insert a row at an exact `sorting` without shifting its neighbours.
///
/// Used by cascades that replicate an already dense list into a new left.
pub async fn insert_row<C: ConnectionTrait>(
    conn: &C,
    left: i32,
    right: i32,
    ctx: RelationContext,
    sorting: i32,
) -> RelationResult<relations::Model> {
    let sorting_foreign = next_foreign_sorting(conn, right, ctx).await?;
    let row = relations::ActiveModel {
        id: ActiveValue::NotSet,
        left_id: Set(left),
        right_id: Set(right),
        sorting: Set(sorting),
        sorting_foreign: Set(sorting_foreign),
        language_id: Set(ctx.language_id),
        workspace_id: Set(ctx.workspace_id),
    };

    row.insert(conn)
        .await
        .map_err(|e| RelationError::from_insert(e, left, right, ctx.language_id, ctx.workspace_id))
}

pub async fn add_relation<C: ConnectionTrait>(
    conn: &C,
    left: i32,
    right: i32,
    ctx: RelationContext,
    position: Position,
) -> RelationResult<relations::Model> {
    if find_relation(conn, left, right, ctx).await?.is_some() {
        return Err(RelationError::DuplicateRelation {
            left,
            right,
            language: ctx.language_id,
            workspace: ctx.workspace_id,
        });
    }

    let sorting = match position {
        Position::Append => {
            let last = Relations::find()
                .filter(left_scope(left, ctx))
                .order_by_desc(relations::Column::Sorting)
                .one(conn)
                .await?;
            last.map(|r| r.sorting + 1).unwrap_or(1)
        }
        Position::Prepend => {
            shift_sorting(conn, left, ctx, 1, 1).await?;
            1
        }
        Position::After(anchor) => {
            let anchor_row = find_relation(conn, left, anchor, ctx).await?.ok_or(
                RelationError::NotFound {
                    left,
                    right: anchor,
                    language: ctx.language_id,
                    workspace: ctx.workspace_id,
                },
            )?;
            shift_sorting(conn, left, ctx, anchor_row.sorting + 1, 1).await?;
            anchor_row.sorting + 1
        }
    };

    let row = insert_row(conn, left, right, ctx, sorting).await?;
    debug!(
        "Related {} -> {} at {} (language {}, workspace {})",
        left, right, sorting, ctx.language_id, ctx.workspace_id
    );
    Ok(row)
}

pub async fn remove_relation<C: ConnectionTrait>(
    conn: &C,
    left: i32,
    right: i32,
    ctx: RelationContext,
) -> RelationResult<()> {
    let row = find_relation(conn, left, right, ctx)
        .await?
        .ok_or(RelationError::NotFound {
            left,
            right,
            language: ctx.language_id,
            workspace: ctx.workspace_id,
        })?;

    Relations::delete_by_id(row.id).exec(conn).await?;
    shift_sorting(conn, left, ctx, row.sorting + 1, -1).await?;
    shift_foreign_sorting(conn, right, ctx, row.sorting_foreign + 1, -1).await?;

    debug!(
        "Unrelated {} -> {} (language {}, workspace {})",
        left, right, ctx.language_id, ctx.workspace_id
    );
    Ok(())
}

/// Rewrite the order of a left's relations.
///
/// Repeated ids collapse to their first occurrence; related ids missing
/// from `ordered` follow in their previous relative order. Returns the
/// resulting order.
pub async fn reorder_relations<C: ConnectionTrait>(
    conn: &C,
    left: i32,
    ordered: &[i32],
    ctx: RelationContext,
) -> RelationResult<Vec<i32>> {
    let rows = list_rows(conn, left, ctx).await?;
    let by_right: HashMap<i32, &relations::Model> = rows.iter().map(|r| (r.right_id, r)).collect();

    let mut seen = HashSet::new();
    let mut order = Vec::with_capacity(rows.len());
    for right in ordered {
        if !by_right.contains_key(right) {
            return Err(RelationError::UnknownMember {
                left,
                right: *right,
            });
        }
        if seen.insert(*right) {
            order.push(*right);
        }
    }
    for row in &rows {
        if seen.insert(row.right_id) {
            order.push(row.right_id);
        }
    }

    for (index, right) in order.iter().enumerate() {
        let sorting = index as i32 + 1;
        if let Some(row) = by_right.get(right) {
            if row.sorting != sorting {
                let mut active: relations::ActiveModel = (*row).clone().into();
                active.sorting = Set(sorting);
                active.update(conn).await?;
            }
        }
    }

    debug!("Reordered relations of {} to {:?}", left, order);
    Ok(order)
}

/// Move a row onto another right id, appending it to that right's foreign order
pub async fn retarget_right<C: ConnectionTrait>(
    conn: &C,
    row: relations::Model,
    new_right: i32,
) -> RelationResult<relations::Model> {
    let ctx = RelationContext::new(row.language_id, row.workspace_id);
    let (left, old_right, old_foreign) = (row.left_id, row.right_id, row.sorting_foreign);
    let sorting_foreign = next_foreign_sorting(conn, new_right, ctx).await?;

    let mut active: relations::ActiveModel = row.into();
    active.right_id = Set(new_right);
    active.sorting_foreign = Set(sorting_foreign);
    let row = active
        .update(conn)
        .await
        .map_err(|e| RelationError::from_insert(e, left, new_right, ctx.language_id, ctx.workspace_id))?;

    shift_foreign_sorting(conn, old_right, ctx, old_foreign + 1, -1).await?;
    Ok(row)
}

/// Ordered right ids of a left, skipping soft-deleted records
pub async fn list_ordered<C: ConnectionTrait>(
    conn: &C,
    left: i32,
    ctx: RelationContext,
) -> RelationResult<Vec<i32>> {
    let rows = list_rows(conn, left, ctx).await?;
    let rights: Vec<i32> = rows.iter().map(|r| r.right_id).collect();
    let live = live_ids(conn, &rights).await?;
    Ok(rights.into_iter().filter(|id| live.contains(id)).collect())
}

/// Left ids referencing `right`, in foreign order, skipping soft-deleted records
pub async fn list_referencing<C: ConnectionTrait>(
    conn: &C,
    right: i32,
    ctx: RelationContext,
) -> RelationResult<Vec<i32>> {
    let rows = rows_referencing(conn, right, ctx).await?;
    let lefts: Vec<i32> = rows.iter().map(|r| r.left_id).collect();
    let live = live_ids(conn, &lefts).await?;
    Ok(lefts.into_iter().filter(|id| live.contains(id)).collect())
}

/// Ordered relation storage with one transaction per call.
///
/// Cascades compose the module-level functions inside their own
/// transaction instead of going through this service.
#[derive(Clone)]
pub struct RelationStore {
    db: DatabaseConnection,
}

impl RelationStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn add(
        &self,
        left: i32,
        right: i32,
        ctx: RelationContext,
        position: Position,
    ) -> RelationResult<relations::Model> {
        let txn = self.db.begin().await?;
        let row = add_relation(&txn, left, right, ctx, position).await?;
        txn.commit().await?;
        Ok(row)
    }

    pub async fn remove(&self, left: i32, right: i32, ctx: RelationContext) -> RelationResult<()> {
        let txn = self.db.begin().await?;
        remove_relation(&txn, left, right, ctx).await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn reorder(
        &self,
        left: i32,
        ordered: &[i32],
        ctx: RelationContext,
    ) -> RelationResult<Vec<i32>> {
        let txn = self.db.begin().await?;
        let order = reorder_relations(&txn, left, ordered, ctx).await?;
        txn.commit().await?;
        Ok(order)
    }

    pub async fn list_ordered(&self, left: i32, ctx: RelationContext) -> RelationResult<Vec<i32>> {
        list_ordered(&self.db, left, ctx).await
    }

    pub async fn list_rows(
        &self,
        left: i32,
        ctx: RelationContext,
    ) -> RelationResult<Vec<relations::Model>> {
        list_rows(&self.db, left, ctx).await
    }

    pub async fn list_referencing(
        &self,
        right: i32,
        ctx: RelationContext,
    ) -> RelationResult<Vec<i32>> {
        list_referencing(&self.db, right, ctx).await
    }
}
