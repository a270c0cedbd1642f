use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{EngineConfig, LanguageConfig};
use crate::database::entities::RecordKind;
use crate::engine::RelationEngine;
use crate::errors::RelationResult;
use crate::services::entity_repository::{self as entities, NewRecord};
use crate::services::relation_store::{self as store, Position, RelationContext};

pub const ROOT_PAGE_ID: i32 = 88;
pub const PAGE_ID: i32 = 89;
pub const PAGE_ID_TARGET: i32 = 90;
pub const CONTENT_ID_FIRST: i32 = 297;
pub const CONTENT_ID_LAST: i32 = 298;
pub const CATEGORY_ID_FIRST: i32 = 28;
pub const CATEGORY_ID_SECOND: i32 = 29;
pub const CATEGORY_ID_THIRD: i32 = 30;
pub const CATEGORY_ID_FOURTH: i32 = 31;
pub const LANGUAGE_ID: i32 = 1;
pub const LANGUAGE_TITLE: &str = "Dansk";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureRelation {
    pub left: i32,
    pub right: i32,
    #[serde(default)]
    pub language: i32,
    #[serde(default)]
    pub workspace: i32,
}

/// Records and relation rows loaded with fixed ids before a scenario
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub records: Vec<NewRecord>,
    /// Appended in listed order per (left, language, workspace)
    #[serde(default)]
    pub relations: Vec<FixtureRelation>,
}

impl Fixture {
    /// Two content elements on page 89 sharing category B
    pub fn many_to_many() -> Self {
        let records = vec![
            NewRecord::new(RecordKind::Page, "Root").with_id(ROOT_PAGE_ID),
            NewRecord::new(RecordKind::Page, "Relations")
                .with_id(PAGE_ID)
                .on_page(ROOT_PAGE_ID),
            NewRecord::new(RecordKind::Page, "Target")
                .with_id(PAGE_ID_TARGET)
                .on_page(ROOT_PAGE_ID),
            NewRecord::new(RecordKind::Category, "Category A")
                .with_id(CATEGORY_ID_FIRST)
                .on_page(ROOT_PAGE_ID),
            NewRecord::new(RecordKind::Category, "Category B")
                .with_id(CATEGORY_ID_SECOND)
                .on_page(ROOT_PAGE_ID),
            NewRecord::new(RecordKind::Category, "Category C")
                .with_id(CATEGORY_ID_THIRD)
                .on_page(ROOT_PAGE_ID),
            NewRecord::new(RecordKind::Category, "Category A.A")
                .with_id(CATEGORY_ID_FOURTH)
                .on_page(ROOT_PAGE_ID),
            NewRecord::new(RecordKind::Content, "Regular Element #1")
                .with_id(CONTENT_ID_FIRST)
                .on_page(PAGE_ID),
            NewRecord::new(RecordKind::Content, "Regular Element #2")
                .with_id(CONTENT_ID_LAST)
                .on_page(PAGE_ID),
        ];

        let live = |left, right| FixtureRelation {
            left,
            right,
            language: 0,
            workspace: 0,
        };
        let relations = vec![
            live(CONTENT_ID_FIRST, CATEGORY_ID_FIRST),
            live(CONTENT_ID_FIRST, CATEGORY_ID_SECOND),
            live(CONTENT_ID_LAST, CATEGORY_ID_SECOND),
            live(CONTENT_ID_LAST, CATEGORY_ID_THIRD),
        ];

        Self { records, relations }
    }

    /// Configuration the fixture's named actions expect
    pub fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.database.path = Some(":memory:".to_string());
        config.localization.languages.push(LanguageConfig {
            id: LANGUAGE_ID,
            title: LANGUAGE_TITLE.to_string(),
            fallback: None,
        });
        config
    }

    /// Insert everything in one transaction
    pub async fn load(&self, engine: &RelationEngine) -> RelationResult<()> {
        let txn = engine.db().begin().await?;
        for record in &self.records {
            entities::insert_record(&txn, record.clone()).await?;
        }
        for relation in &self.relations {
            let ctx = RelationContext::new(relation.language, relation.workspace);
            store::add_relation(&txn, relation.left, relation.right, ctx, Position::Append).await?;
        }
        txn.commit().await?;

        info!(
            "Loaded fixture with {} records and {} relations",
            self.records.len(),
            self.relations.len()
        );
        Ok(())
    }
}
