use sea_orm_migration::prelude::*;

#[derive(DeriveIden, Copy, Clone)]
enum Contact {
    Table,
    Id,
    UserId,
    Name,
    Email,
    Status,
    LifetimeValueCents,
    DealsCount,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden, Copy, Clone)]
enum Deal {
    Table,
    Id,
    UserId,
    ContactId,
    Title,
    Stage,
    AmountCents,
    Currency,
    Probability,
    ExpectedCloseDate,
    ActualCloseDate,
    Priority,
    LossReason,
    Source,
    Version,
    DeletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Contact::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Contact::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Contact::UserId).uuid().not_null())
                    .col(ColumnDef::new(Contact::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Contact::Email).string_len(255))
                    .col(
                        ColumnDef::new(Contact::Status)
                            .string_len(16)
                            .not_null()
                            .default("lead"),
                    )
                    .col(
                        ColumnDef::new(Contact::LifetimeValueCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Contact::DealsCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Contact::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Contact::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_contact_user")
                    .table(Contact::Table)
                    .col(Contact::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Deal::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Deal::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Deal::UserId).uuid().not_null())
                    .col(ColumnDef::new(Deal::ContactId).uuid())
                    .col(ColumnDef::new(Deal::Title).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Deal::Stage)
                            .string_len(16)
                            .not_null()
                            .default("lead"),
                    )
                    .col(
                        ColumnDef::new(Deal::AmountCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Deal::Currency)
                            .string_len(3)
                            .not_null()
                            .default("USD"),
                    )
                    .col(
                        ColumnDef::new(Deal::Probability)
                            .small_integer()
                            .not_null()
                            .default(20),
                    )
                    .col(ColumnDef::new(Deal::ExpectedCloseDate).date())
                    .col(ColumnDef::new(Deal::ActualCloseDate).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Deal::Priority)
                            .string_len(16)
                            .not_null()
                            .default("medium"),
                    )
                    .col(ColumnDef::new(Deal::LossReason).text())
                    .col(ColumnDef::new(Deal::Source).string_len(64))
                    .col(
                        ColumnDef::new(Deal::Version)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Deal::DeletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Deal::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Deal::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deal_contact")
                            .from(Deal::Table, Deal::ContactId)
                            .to(Contact::Table, Contact::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .check(Expr::col(Deal::AmountCents).gte(0))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deal_user_stage")
                    .table(Deal::Table)
                    .col(Deal::UserId)
                    .col(Deal::Stage)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deal_user_expected_close")
                    .table(Deal::Table)
                    .col(Deal::UserId)
                    .col(Deal::ExpectedCloseDate)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deal_contact")
                    .table(Deal::Table)
                    .col(Deal::ContactId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Deal::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Contact::Table).if_exists().to_owned())
            .await
    }
}
