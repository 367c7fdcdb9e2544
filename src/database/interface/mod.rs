pub mod achievements;
pub mod client_hashes;
pub mod friendships;
pub mod mail;
pub mod maps;
pub mod scores;
pub mod stats;
pub mod users;

pub type DbResult<T> = Result<T, sea_orm::DbErr>;
