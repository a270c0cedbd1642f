use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A CMS record: page, content element or category.
///
/// `title` is the display field (page title, content header, category title).
/// Soft deletion is expressed through `status`; rows are never physically
/// removed by the engine.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub kind: String,
    pub title: String,
    pub page_id: Option<i32>,
    pub language_id: i32,
    pub origin_id: Option<i32>,
    pub copied_from: Option<i32>,
    pub status: String,
    pub sorting: i32,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Page,
    Content,
    Category,
}

impl From<RecordKind> for String {
    fn from(kind: RecordKind) -> Self {
        kind.as_str().to_string()
    }
}

impl From<String> for RecordKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "page" => RecordKind::Page,
            "category" => RecordKind::Category,
            _ => RecordKind::Content,
        }
    }
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Page => "page",
            RecordKind::Content => "content",
            RecordKind::Category => "category",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Live,
    Deleted,
}

impl From<RecordStatus> for String {
    fn from(status: RecordStatus) -> Self {
        match status {
            RecordStatus::Live => "live".to_string(),
            RecordStatus::Deleted => "deleted".to_string(),
        }
    }
}

impl From<String> for RecordStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "deleted" => RecordStatus::Deleted,
            _ => RecordStatus::Live,
        }
    }
}

impl Model {
    pub fn get_kind(&self) -> RecordKind {
        RecordKind::from(self.kind.clone())
    }

    pub fn get_status(&self) -> RecordStatus {
        RecordStatus::from(self.status.clone())
    }

    pub fn is_live(&self) -> bool {
        self.get_status() == RecordStatus::Live
    }

    /// True for translations (records carrying a localization parent)
    pub fn is_localization(&self) -> bool {
        self.language_id != 0 && self.origin_id.is_some()
    }

    /// Id of the default-language record this one represents
    pub fn default_language_id(&self) -> i32 {
        self.origin_id.unwrap_or(self.id)
    }
}
