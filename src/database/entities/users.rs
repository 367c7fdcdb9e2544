use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Serialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    #[sea_orm(unique)]
    pub normalized_name: String,
    pub email: String,
    #[serde(skip)]
    pub password: String,
    pub country: String,
    pub privileges: i32,
    /// Unix timestamp the silence expires at; `0` means not silenced.
    pub silence_end: i64,
    pub block_non_friend_dms: bool,
    pub creation_time: DateTimeUtc,
    pub latest_activity: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stats::Entity")]
    Stats,
    #[sea_orm(has_many = "super::client_hashes::Entity")]
    ClientHashes,
}

impl Related<super::stats::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stats.def()
    }
}

impl Related<super::client_hashes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClientHashes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Privileges granted to a freshly created account: unrestricted, not
    /// yet verified (matches the client-hash verification gate on first
    /// login).
    pub fn default_privileges() -> i32 {
        crate::codec::types::Privileges::UNRESTRICTED.bits() as i32
    }

    pub fn privileges(&self) -> crate::codec::types::Privileges {
        crate::codec::types::Privileges::from_bits_truncate(self.privileges as u32)
    }

    pub fn is_restricted(&self) -> bool {
        !self.privileges().contains(crate::codec::types::Privileges::UNRESTRICTED)
    }

    pub fn is_silenced(&self) -> bool {
        self.silence_end > chrono::Utc::now().timestamp()
    }
}
