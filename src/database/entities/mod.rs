pub mod achievements;
pub mod aux_tables;
pub mod client_hashes;
pub mod friendships;
pub mod mail;
pub mod maps;
pub mod scores;
pub mod stats;
pub mod user_achievements;
pub mod users;

pub use achievements::Entity as Achievements;
pub use client_hashes::Entity as ClientHashes;
pub use friendships::Entity as Friendships;
pub use mail::Entity as Mail;
pub use maps::Entity as Maps;
pub use stats::Entity as Stats;
pub use user_achievements::Entity as UserAchievements;
pub use users::Entity as Users;
