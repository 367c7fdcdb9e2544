use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Maps::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Maps::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Maps::SetId).integer().not_null())
                    .col(ColumnDef::new(Maps::Md5).string().not_null().unique_key())
                    .col(ColumnDef::new(Maps::Artist).string().not_null())
                    .col(ColumnDef::new(Maps::Title).string().not_null())
                    .col(ColumnDef::new(Maps::Version).string().not_null())
                    .col(ColumnDef::new(Maps::Creator).string().not_null())
                    .col(ColumnDef::new(Maps::Mode).tiny_integer().not_null())
                    .col(ColumnDef::new(Maps::Status).tiny_integer().not_null())
                    .col(ColumnDef::new(Maps::Plays).integer().not_null().default(0))
                    .col(ColumnDef::new(Maps::Passes).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Maps::Frozen)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Maps::LastUpdated).timestamp().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Maps::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Maps {
    Table,
    Id,
    SetId,
    Md5,
    Artist,
    Title,
    Version,
    Creator,
    Mode,
    Status,
    Plays,
    Passes,
    Frozen,
    LastUpdated,
}
