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
                    .table(Friendships::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Friendships::UserId).integer().not_null())
                    .col(ColumnDef::new(Friendships::FriendId).integer().not_null())
                    .primary_key(
                        Index::create()
                            .col(Friendships::UserId)
                            .col(Friendships::FriendId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Friendships::Table, Friendships::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ClientHashes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ClientHashes::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ClientHashes::UserId).integer().not_null())
                    .col(ColumnDef::new(ClientHashes::OsuPathMd5).string().not_null())
                    .col(ColumnDef::new(ClientHashes::Adapters).string().not_null())
                    .col(ColumnDef::new(ClientHashes::AdaptersMd5).string().not_null())
                    .col(
                        ColumnDef::new(ClientHashes::UninstallMd5)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClientHashes::DiskSerialMd5)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClientHashes::Occurrences)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(ClientHashes::LatestTime).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(ClientHashes::Table, ClientHashes::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Mail::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Mail::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Mail::FromId).integer().not_null())
                    .col(ColumnDef::new(Mail::ToId).integer().not_null())
                    .col(ColumnDef::new(Mail::Msg).text().not_null())
                    .col(ColumnDef::new(Mail::Time).timestamp().not_null())
                    .col(
                        ColumnDef::new(Mail::Read)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Achievements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Achievements::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Achievements::Name).string().not_null())
                    .col(ColumnDef::new(Achievements::Description).string().not_null())
                    .col(ColumnDef::new(Achievements::Mode).tiny_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserAchievements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserAchievements::UserId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserAchievements::AchievementId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserAchievements::UnlockedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(UserAchievements::UserId)
                            .col(UserAchievements::AchievementId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(UserAchievements::Table, UserAchievements::AchievementId)
                            .to(Achievements::Table, Achievements::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserAchievements::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Achievements::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Mail::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ClientHashes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Friendships::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Friendships {
    Table,
    UserId,
    FriendId,
}

#[derive(Iden)]
enum ClientHashes {
    Table,
    Id,
    UserId,
    OsuPathMd5,
    Adapters,
    AdaptersMd5,
    UninstallMd5,
    DiskSerialMd5,
    Occurrences,
    LatestTime,
}

#[derive(Iden)]
enum Mail {
    Table,
    Id,
    FromId,
    ToId,
    Msg,
    Time,
    Read,
}

#[derive(Iden)]
enum Achievements {
    Table,
    Id,
    Name,
    Description,
    Mode,
}

#[derive(Iden)]
enum UserAchievements {
    Table,
    UserId,
    AchievementId,
    UnlockedAt,
}
