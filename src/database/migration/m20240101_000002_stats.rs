use sea_orm_migration::prelude::*;

use super::m20240101_000001_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Stats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Stats::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Stats::UserId).integer().not_null())
                    .col(ColumnDef::new(Stats::Mode).tiny_integer().not_null())
                    .col(ColumnDef::new(Stats::Submode).tiny_integer().not_null())
                    .col(ColumnDef::new(Stats::RankedScore).big_integer().not_null())
                    .col(ColumnDef::new(Stats::TotalScore).big_integer().not_null())
                    .col(ColumnDef::new(Stats::Pp).float().not_null())
                    .col(ColumnDef::new(Stats::Accuracy).float().not_null())
                    .col(ColumnDef::new(Stats::Plays).integer().not_null())
                    .col(ColumnDef::new(Stats::Playtime).integer().not_null())
                    .col(ColumnDef::new(Stats::MaxCombo).integer().not_null())
                    .col(ColumnDef::new(Stats::CountXh).integer().not_null())
                    .col(ColumnDef::new(Stats::CountX).integer().not_null())
                    .col(ColumnDef::new(Stats::CountSh).integer().not_null())
                    .col(ColumnDef::new(Stats::CountS).integer().not_null())
                    .col(ColumnDef::new(Stats::CountA).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Stats::Table, Stats::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("idx-stats-uid-mode-submode")
                    .table(Stats::Table)
                    .col(Stats::UserId)
                    .col(Stats::Mode)
                    .col(Stats::Submode)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-stats-mode-submode-pp")
                    .table(Stats::Table)
                    .col(Stats::Mode)
                    .col(Stats::Submode)
                    .col(Stats::Pp)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Stats::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Stats {
    Table,
    Id,
    UserId,
    Mode,
    Submode,
    RankedScore,
    TotalScore,
    Pp,
    Accuracy,
    Plays,
    Playtime,
    MaxCombo,
    CountXh,
    CountX,
    CountSh,
    CountS,
    CountA,
}
