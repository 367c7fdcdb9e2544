use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Hardware-id bundle recorded on every login, with an occurrence counter
/// for multi-accounting detection.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "client_hashes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub osu_path_md5: String,
    pub adapters: String,
    pub adapters_md5: String,
    pub uninstall_md5: String,
    pub disk_serial_md5: String,
    pub occurrences: i32,
    pub latest_time: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
