use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            ScoreTables::Vanilla,
            ScoreTables::Relax,
            ScoreTables::Autopilot,
        ] {
            create_score_table(manager, table.name()).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            ScoreTables::Vanilla,
            ScoreTables::Relax,
            ScoreTables::Autopilot,
        ] {
            manager
                .drop_table(Table::drop().table(Alias::new(table.name())).to_owned())
                .await?;
        }
        Ok(())
    }
}

enum ScoreTables {
    Vanilla,
    Relax,
    Autopilot,
}

impl ScoreTables {
    fn name(&self) -> &'static str {
        match self {
            Self::Vanilla => "scores_vanilla",
            Self::Relax => "scores_relax",
            Self::Autopilot => "scores_autopilot",
        }
    }
}

async fn create_score_table(manager: &SchemaManager<'_>, table_name: &str) -> Result<(), DbErr> {
    let table = Alias::new(table_name);
    manager
        .create_table(
            Table::create()
                .table(table.clone())
                .if_not_exists()
                .col(
                    ColumnDef::new(Alias::new("id"))
                        .integer()
                        .not_null()
                        .auto_increment()
                        .primary_key(),
                )
                .col(ColumnDef::new(Alias::new("user_id")).integer().not_null())
                .col(ColumnDef::new(Alias::new("map_md5")).string().not_null())
                .col(ColumnDef::new(Alias::new("mode")).tiny_integer().not_null())
                .col(ColumnDef::new(Alias::new("score")).big_integer().not_null())
                .col(ColumnDef::new(Alias::new("pp")).float().not_null())
                .col(ColumnDef::new(Alias::new("accuracy")).float().not_null())
                .col(ColumnDef::new(Alias::new("max_combo")).integer().not_null())
                .col(ColumnDef::new(Alias::new("mods")).integer().not_null())
                .col(ColumnDef::new(Alias::new("n300")).integer().not_null())
                .col(ColumnDef::new(Alias::new("n100")).integer().not_null())
                .col(ColumnDef::new(Alias::new("n50")).integer().not_null())
                .col(ColumnDef::new(Alias::new("ngeki")).integer().not_null())
                .col(ColumnDef::new(Alias::new("nkatu")).integer().not_null())
                .col(ColumnDef::new(Alias::new("nmiss")).integer().not_null())
                .col(ColumnDef::new(Alias::new("grade")).string().not_null())
                .col(ColumnDef::new(Alias::new("passed")).boolean().not_null())
                .col(ColumnDef::new(Alias::new("perfect")).boolean().not_null())
                .col(ColumnDef::new(Alias::new("status")).tiny_integer().not_null())
                .col(
                    ColumnDef::new(Alias::new("online_checksum"))
                        .string()
                        .not_null(),
                )
                .col(
                    ColumnDef::new(Alias::new("client_flags"))
                        .integer()
                        .not_null(),
                )
                .col(
                    ColumnDef::new(Alias::new("time_elapsed"))
                        .integer()
                        .not_null(),
                )
                .col(
                    ColumnDef::new(Alias::new("submitted_at"))
                        .timestamp()
                        .not_null(),
                )
                .to_owned(),
        )
        .await?;

    manager
        .create_index(
            Index::create()
                .name(format!("idx-{table_name}-checksum"))
                .table(table.clone())
                .col(Alias::new("online_checksum"))
                .to_owned(),
        )
        .await?;

    manager
        .create_index(
            Index::create()
                .name(format!("idx-{table_name}-user-mode"))
                .table(table.clone())
                .col(Alias::new("user_id"))
                .col(Alias::new("mode"))
                .col(Alias::new("pp"))
                .to_owned(),
        )
        .await?;

    manager
        .create_index(
            Index::create()
                .name(format!("idx-{table_name}-map-mode"))
                .table(table)
                .col(Alias::new("map_md5"))
                .col(Alias::new("mode"))
                .to_owned(),
        )
        .await
}
