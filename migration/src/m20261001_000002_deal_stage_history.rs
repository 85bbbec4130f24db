use sea_orm_migration::prelude::*;

#[derive(DeriveIden, Copy, Clone)]
enum DealStageHistory {
    Table,
    Id,
    DealId,
    FromStage,
    ToStage,
    Note,
    ChangedAt,
}

#[derive(DeriveIden, Copy, Clone)]
enum Deal {
    Table,
    Id,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DealStageHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DealStageHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DealStageHistory::DealId).uuid().not_null())
                    .col(
                        ColumnDef::new(DealStageHistory::FromStage)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DealStageHistory::ToStage)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(DealStageHistory::Note).text())
                    .col(
                        ColumnDef::new(DealStageHistory::ChangedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deal_stage_history_deal")
                            .from(DealStageHistory::Table, DealStageHistory::DealId)
                            .to(Deal::Table, Deal::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deal_stage_history_deal")
                    .table(DealStageHistory::Table)
                    .col(DealStageHistory::DealId)
                    .col(DealStageHistory::ChangedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(DealStageHistory::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}
