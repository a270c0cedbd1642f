use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Records::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Records::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Records::Kind).string().not_null())
                    .col(ColumnDef::new(Records::Title).string().not_null())
                    .col(ColumnDef::new(Records::PageId).integer())
                    .col(ColumnDef::new(Records::LanguageId).integer().not_null().default(0))
                    .col(ColumnDef::new(Records::OriginId).integer())
                    .col(ColumnDef::new(Records::CopiedFrom).integer())
                    .col(ColumnDef::new(Records::Status).string().not_null().default("live"))
                    .col(ColumnDef::new(Records::Sorting).integer().not_null().default(0))
                    .col(ColumnDef::new(Records::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Records::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // Page listing
        manager
            .create_index(
                Index::create()
                    .name("idx_records_page")
                    .table(Records::Table)
                    .col(Records::PageId)
                    .col(Records::Sorting)
                    .to_owned(),
            )
            .await?;

        // Localization overlay lookup
        manager
            .create_index(
                Index::create()
                    .name("idx_records_origin_language")
                    .table(Records::Table)
                    .col(Records::OriginId)
                    .col(Records::LanguageId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Records::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Records {
    Table,
    Id,
    Kind,
    Title,
    PageId,
    LanguageId,
    OriginId,
    CopiedFrom,
    Status,
    Sorting,
    CreatedAt,
    UpdatedAt,
}
