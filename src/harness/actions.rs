use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::fixtures::*;
use crate::engine::RelationEngine;
use crate::errors::{RelationError, RelationResult};
use crate::services::{Position, RecordEdit, RelationContext};

/// The named many-to-many actions the fixture is exercised with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NamedAction {
    AddCategoryRelation,
    DeleteCategoryRelation,
    ChangeCategoryRelationSorting,
    ModifyCategoryOfRelation,
    ModifyContentOfRelation,
    ModifyBothsOfRelation,
    DeleteContentOfRelation,
    DeleteCategoryOfRelation,
    CopyContentOfRelation,
    CopyCategoryOfRelation,
    LocalizeContentOfRelation,
    LocalizeCategoryOfRelation,
    MoveContentOfRelationToDifferentPage,
    CopyPage,
}

impl NamedAction {
    pub const ALL: [NamedAction; 14] = [
        NamedAction::AddCategoryRelation,
        NamedAction::DeleteCategoryRelation,
        NamedAction::ChangeCategoryRelationSorting,
        NamedAction::ModifyCategoryOfRelation,
        NamedAction::ModifyContentOfRelation,
        NamedAction::ModifyBothsOfRelation,
        NamedAction::DeleteContentOfRelation,
        NamedAction::DeleteCategoryOfRelation,
        NamedAction::CopyContentOfRelation,
        NamedAction::CopyCategoryOfRelation,
        NamedAction::LocalizeContentOfRelation,
        NamedAction::LocalizeCategoryOfRelation,
        NamedAction::MoveContentOfRelationToDifferentPage,
        NamedAction::CopyPage,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NamedAction::AddCategoryRelation => "addCategoryRelation",
            NamedAction::DeleteCategoryRelation => "deleteCategoryRelation",
            NamedAction::ChangeCategoryRelationSorting => "changeCategoryRelationSorting",
            NamedAction::ModifyCategoryOfRelation => "modifyCategoryOfRelation",
            NamedAction::ModifyContentOfRelation => "modifyContentOfRelation",
            NamedAction::ModifyBothsOfRelation => "modifyBothsOfRelation",
            NamedAction::DeleteContentOfRelation => "deleteContentOfRelation",
            NamedAction::DeleteCategoryOfRelation => "deleteCategoryOfRelation",
            NamedAction::CopyContentOfRelation => "copyContentOfRelation",
            NamedAction::CopyCategoryOfRelation => "copyCategoryOfRelation",
            NamedAction::LocalizeContentOfRelation => "localizeContentOfRelation",
            NamedAction::LocalizeCategoryOfRelation => "localizeCategoryOfRelation",
            NamedAction::MoveContentOfRelationToDifferentPage => {
                "moveContentOfRelationToDifferentPage"
            }
            NamedAction::CopyPage => "copyPage",
        }
    }
}

impl fmt::Display for NamedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NamedAction {
    type Err = RelationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NamedAction::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| RelationError::InvalidOperation(format!("unknown action '{}'", s)))
    }
}

/// Ids created by an action, keyed by a stable name (`newContentId`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub record_ids: BTreeMap<String, i32>,
}

impl ActionOutcome {
    fn with(mut self, key: &str, id: i32) -> Self {
        self.record_ids.insert(key.to_string(), id);
        self
    }

    pub fn id(&self, key: &str) -> Option<i32> {
        self.record_ids.get(key).copied()
    }
}

const MODIFIED_TITLE: &str = "Testing #1";

fn rename(title: &str) -> RecordEdit {
    RecordEdit {
        title: Some(title.to_string()),
        relations: None,
    }
}

/// Run one named action against an engine holding the many-to-many fixture
pub async fn perform(engine: &RelationEngine, action: NamedAction) -> RelationResult<ActionOutcome> {
    let ctx = RelationContext::LIVE;
    let planner = engine.planner();
    let cascade = engine.cascade();
    let outcome = ActionOutcome::default();

    let outcome = match action {
        NamedAction::AddCategoryRelation => {
            planner
                .add_relation(CONTENT_ID_FIRST, CATEGORY_ID_FOURTH, ctx, Position::Append)
                .await?;
            outcome
        }
        NamedAction::DeleteCategoryRelation => {
            planner
                .replace_relations(CONTENT_ID_FIRST, &[CATEGORY_ID_FIRST], ctx)
                .await?;
            outcome
        }
        NamedAction::ChangeCategoryRelationSorting => {
            planner
                .replace_relations(
                    CONTENT_ID_FIRST,
                    &[CATEGORY_ID_SECOND, CATEGORY_ID_FIRST],
                    ctx,
                )
                .await?;
            outcome
        }
        NamedAction::ModifyCategoryOfRelation => {
            planner
                .edit_record(CATEGORY_ID_FIRST, rename(MODIFIED_TITLE), ctx)
                .await?;
            outcome
        }
        NamedAction::ModifyContentOfRelation => {
            planner
                .edit_record(CONTENT_ID_FIRST, rename(MODIFIED_TITLE), ctx)
                .await?;
            outcome
        }
        NamedAction::ModifyBothsOfRelation => {
            planner
                .edit_record(CONTENT_ID_FIRST, rename(MODIFIED_TITLE), ctx)
                .await?;
            planner
                .edit_record(CATEGORY_ID_FIRST, rename(MODIFIED_TITLE), ctx)
                .await?;
            outcome
        }
        NamedAction::DeleteContentOfRelation => {
            cascade.delete(CONTENT_ID_FIRST).await?;
            outcome
        }
        NamedAction::DeleteCategoryOfRelation => {
            cascade.delete(CATEGORY_ID_FIRST).await?;
            outcome
        }
        NamedAction::CopyContentOfRelation => {
            let copy = cascade.copy(CONTENT_ID_LAST, None, ctx.workspace_id).await?;
            outcome.with("newContentId", copy.root)
        }
        NamedAction::CopyCategoryOfRelation => {
            let copy = cascade.copy(CATEGORY_ID_FIRST, None, ctx.workspace_id).await?;
            outcome.with("newCategoryId", copy.root)
        }
        NamedAction::LocalizeContentOfRelation => {
            let localized = cascade
                .localize(CONTENT_ID_LAST, LANGUAGE_ID, ctx.workspace_id)
                .await?;
            outcome.with("localizedContentId", localized.id)
        }
        NamedAction::LocalizeCategoryOfRelation => {
            let localized = cascade
                .localize(CATEGORY_ID_FIRST, LANGUAGE_ID, ctx.workspace_id)
                .await?;
            outcome.with("localizedCategoryId", localized.id)
        }
        NamedAction::MoveContentOfRelationToDifferentPage => {
            cascade.move_to_page(CONTENT_ID_LAST, PAGE_ID_TARGET).await?;
            outcome
        }
        NamedAction::CopyPage => {
            let copy = cascade
                .copy_page(PAGE_ID, Some(PAGE_ID_TARGET), ctx.workspace_id)
                .await?;
            let mut outcome = outcome.with("newPageId", copy.root);
            if let Some(id) = copy.copy_of(CONTENT_ID_FIRST) {
                outcome = outcome.with("newContentIdFirst", id);
            }
            if let Some(id) = copy.copy_of(CONTENT_ID_LAST) {
                outcome = outcome.with("newContentIdLast", id);
            }
            outcome
        }
    };

    info!("Performed {} -> {:?}", action, outcome.record_ids);
    Ok(outcome)
}
