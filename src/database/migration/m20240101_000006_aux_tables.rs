use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (table_name, columns) in aux_tables() {
            let mut create = Table::create();
            create.table(Alias::new(table_name)).if_not_exists().col(
                ColumnDef::new(Alias::new("id"))
                    .integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            );
            for (col_name, col_type) in columns {
                let mut def = ColumnDef::new(Alias::new(col_name));
                match col_type {
                    ColType::Int => def.integer(),
                    ColType::Text => def.string(),
                    ColType::Timestamp => def.timestamp(),
                };
                def.not_null();
                create.col(&mut def);
            }
            manager.create_table(create.to_owned()).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (table_name, _) in aux_tables() {
            manager
                .drop_table(Table::drop().table(Alias::new(table_name)).to_owned())
                .await?;
        }
        Ok(())
    }
}

enum ColType {
    Int,
    Text,
    Timestamp,
}

/// Schema for the aux tables named in the external interfaces but owned by
/// collaborators outside the relay core (map-info proxying, admin
/// commands, the registration form, the JSON read API).
fn aux_tables() -> Vec<(&'static str, Vec<(&'static str, ColType)>)> {
    vec![
        (
            "ratings",
            vec![
                ("user_id", ColType::Int),
                ("map_md5", ColType::Text),
                ("rating", ColType::Int),
            ],
        ),
        (
            "comments",
            vec![
                ("user_id", ColType::Int),
                ("target_id", ColType::Int),
                ("target_type", ColType::Text),
                ("comment", ColType::Text),
                ("posted_at", ColType::Timestamp),
            ],
        ),
        (
            "favourites",
            vec![("user_id", ColType::Int), ("set_id", ColType::Int)],
        ),
        (
            "logs",
            vec![
                ("user_id", ColType::Int),
                ("action", ColType::Text),
                ("detail", ColType::Text),
                ("logged_at", ColType::Timestamp),
            ],
        ),
        (
            "clans",
            vec![
                ("name", ColType::Text),
                ("tag", ColType::Text),
                ("owner_id", ColType::Int),
            ],
        ),
        (
            "tourney_pools",
            vec![("name", ColType::Text), ("created_by", ColType::Int)],
        ),
        (
            "tourney_pool_maps",
            vec![
                ("pool_id", ColType::Int),
                ("map_md5", ColType::Text),
                ("mods", ColType::Int),
                ("slot", ColType::Int),
            ],
        ),
        (
            "map_requests",
            vec![
                ("user_id", ColType::Int),
                ("map_md5", ColType::Text),
                ("requested_at", ColType::Timestamp),
            ],
        ),
        (
            "startups",
            vec![("started_at", ColType::Timestamp), ("version", ColType::Text)],
        ),
    ]
}
