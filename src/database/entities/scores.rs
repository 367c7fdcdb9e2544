//! Three near-identical score tables, one per submode. A submitted play
//! lands in `scores_vanilla`, `scores_relax`, or `scores_autopilot`
//! depending on whether its mods include Relax/Autopilot — matching the
//! persistence layout named in the external interfaces.

macro_rules! score_table {
    ($module:ident, $table_name:literal) => {
        pub mod $module {
            use sea_orm::entity::prelude::*;
            use serde::Serialize;

            #[derive(Serialize, Clone, Debug, PartialEq, DeriveEntityModel)]
            #[sea_orm(table_name = $table_name)]
            pub struct Model {
                #[sea_orm(primary_key)]
                pub id: i32,
                pub user_id: i32,
                pub map_md5: String,
                pub mode: i8,
                pub score: i64,
                pub pp: f32,
                pub accuracy: f32,
                pub max_combo: i32,
                pub mods: i32,
                pub n300: i32,
                pub n100: i32,
                pub n50: i32,
                pub ngeki: i32,
                pub nkatu: i32,
                pub nmiss: i32,
                pub grade: String,
                pub passed: bool,
                pub perfect: bool,
                /// 0 = failed, 1 = submitted, 2 = best
                pub status: i8,
                pub online_checksum: String,
                pub client_flags: i32,
                pub time_elapsed: i32,
                pub submitted_at: DateTimeUtc,
            }

            #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
            pub enum Relation {}

            impl ActiveModelBehavior for ActiveModel {}
        }
    };
}

score_table!(scores_vanilla, "scores_vanilla");
score_table!(scores_relax, "scores_relax");
score_table!(scores_autopilot, "scores_autopilot");

/// Score row submission status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum ScoreStatus {
    Failed = 0,
    Submitted = 1,
    Best = 2,
}
