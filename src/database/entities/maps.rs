use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Serialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "maps")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub set_id: i32,
    #[sea_orm(unique)]
    pub md5: String,
    pub artist: String,
    pub title: String,
    pub version: String,
    pub creator: String,
    pub mode: i8,
    pub status: i8,
    pub plays: i32,
    pub passes: i32,
    pub frozen: bool,
    pub last_updated: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Ranked status, matching the client's beatmap status enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum RankedStatus {
    Graveyard = -2,
    Wip = -1,
    Pending = 0,
    NeedsUpdate = 1,
    Ranked = 2,
    Approved = 3,
    Qualified = 4,
    Loved = 5,
}

impl RankedStatus {
    pub fn from_i8(value: i8) -> Self {
        match value {
            -2 => Self::Graveyard,
            -1 => Self::Wip,
            1 => Self::NeedsUpdate,
            2 => Self::Ranked,
            3 => Self::Approved,
            4 => Self::Qualified,
            5 => Self::Loved,
            _ => Self::Pending,
        }
    }

    /// Ranked and approved maps award ranked score and performance points;
    /// this is the `awards_pp` predicate referenced by the score pipeline.
    pub fn awards_pp(self) -> bool {
        matches!(self, Self::Ranked | Self::Approved)
    }
}
