use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Relations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Relations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Relations::LeftId).integer().not_null())
                    .col(ColumnDef::new(Relations::RightId).integer().not_null())
                    .col(ColumnDef::new(Relations::Sorting).integer().not_null())
                    .col(ColumnDef::new(Relations::SortingForeign).integer().not_null().default(0))
                    .col(ColumnDef::new(Relations::LanguageId).integer().not_null().default(0))
                    .col(ColumnDef::new(Relations::WorkspaceId).integer().not_null().default(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_relations_left_id")
                            .from(Relations::Table, Relations::LeftId)
                            .to(Records::Table, Records::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_relations_right_id")
                            .from(Relations::Table, Relations::RightId)
                            .to(Records::Table, Records::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per (left, right, language, workspace)
        manager
            .create_index(
                Index::create()
                    .name("uq_relations_tuple")
                    .table(Relations::Table)
                    .col(Relations::LeftId)
                    .col(Relations::RightId)
                    .col(Relations::LanguageId)
                    .col(Relations::WorkspaceId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_relations_left_scope")
                    .table(Relations::Table)
                    .col(Relations::LeftId)
                    .col(Relations::LanguageId)
                    .col(Relations::WorkspaceId)
                    .col(Relations::Sorting)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_relations_right_scope")
                    .table(Relations::Table)
                    .col(Relations::RightId)
                    .col(Relations::LanguageId)
                    .col(Relations::WorkspaceId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Relations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Relations {
    Table,
    Id,
    LeftId,
    RightId,
    Sorting,
    SortingForeign,
    LanguageId,
    WorkspaceId,
}

#[derive(DeriveIden)]
enum Records {
    Table,
    Id,
}
