//! Tables that round out the persistent schema named in the external
//! interfaces but belong to collaborators outside THE CORE (map-info
//! proxying, admin commands, the registration form, the JSON read API).
//! Declared here for schema completeness; no query logic lives on them.

macro_rules! aux_table {
    ($module:ident, $table_name:literal, { $($field:ident : $ty:ty),* $(,)? }) => {
        pub mod $module {
            use sea_orm::entity::prelude::*;
            use serde::Serialize;

            #[derive(Serialize, Clone, Debug, PartialEq, DeriveEntityModel)]
            #[sea_orm(table_name = $table_name)]
            pub struct Model {
                #[sea_orm(primary_key)]
                pub id: i32,
                $(pub $field: $ty,)*
            }

            #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
            pub enum Relation {}

            impl ActiveModelBehavior for ActiveModel {}
        }
    };
}

aux_table!(ratings, "ratings", {
    user_id: i32,
    map_md5: String,
    rating: i8,
});

aux_table!(comments, "comments", {
    user_id: i32,
    target_id: i32,
    target_type: String,
    comment: String,
    posted_at: DateTimeUtc,
});

aux_table!(favourites, "favourites", {
    user_id: i32,
    set_id: i32,
});

aux_table!(logs, "logs", {
    user_id: i32,
    action: String,
    detail: String,
    logged_at: DateTimeUtc,
});

aux_table!(clans, "clans", {
    name: String,
    tag: String,
    owner_id: i32,
});

aux_table!(tourney_pools, "tourney_pools", {
    name: String,
    created_by: i32,
});

aux_table!(tourney_pool_maps, "tourney_pool_maps", {
    pool_id: i32,
    map_md5: String,
    mods: i32,
    slot: i32,
});

aux_table!(map_requests, "map_requests", {
    user_id: i32,
    map_md5: String,
    requested_at: DateTimeUtc,
});

aux_table!(startups, "startups", {
    started_at: DateTimeUtc,
    version: String,
});
