use sea_orm::entity::prelude::*;
use serde::Serialize;

/// One row per (user, mode, submode). `submode` distinguishes vanilla play
/// from relax/autopilot, which are scored separately from the same mode.
#[derive(Serialize, Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "stats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub mode: i8,
    pub submode: i8,
    pub ranked_score: i64,
    pub total_score: i64,
    pub pp: f32,
    pub accuracy: f32,
    pub plays: i32,
    pub playtime: i32,
    pub max_combo: i32,
    pub count_xh: i32,
    pub count_x: i32,
    pub count_sh: i32,
    pub count_s: i32,
    pub count_a: i32,
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
