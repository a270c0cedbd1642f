use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One many-to-many association row (content -> category).
///
/// `sorting` orders rows sharing (left_id, language_id, workspace_id);
/// `sorting_foreign` orders rows sharing (right_id, language_id, workspace_id).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "relations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub left_id: i32,
    pub right_id: i32,
    pub sorting: i32,
    pub sorting_foreign: i32,
    pub language_id: i32,
    pub workspace_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::records::Entity",
        from = "Column::LeftId",
        to = "super::records::Column::Id"
    )]
    Left,
    #[sea_orm(
        belongs_to = "super::records::Entity",
        from = "Column::RightId",
        to = "super::records::Column::Id"
    )]
    Right,
}

impl ActiveModelBehavior for ActiveModel {}
