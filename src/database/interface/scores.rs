//! Query functions over the three submode score tables. Most operations
//! take a [`Submode`] and dispatch to the matching table; the duplication
//! across the three `match` arms mirrors the duplication of the tables
//! themselves.

use super::DbResult;
use crate::database::entities::scores::{scores_autopilot, scores_relax, scores_vanilla};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, Order,
    QueryFilter, QueryOrder, QuerySelect,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submode {
    Vanilla,
    Relax,
    Autopilot,
}

impl Submode {
    /// Derives the submode from the mods a play was set with.
    pub fn from_mods(mods: crate::codec::types::Mods) -> Self {
        if mods.contains(crate::codec::types::Mods::RELAX) {
            Self::Relax
        } else if mods.contains(crate::codec::types::Mods::AUTOPILOT) {
            Self::Autopilot
        } else {
            Self::Vanilla
        }
    }
}

/// A submitted score row, independent of which table it lives in.
#[derive(Debug, Clone)]
pub struct NewScore {
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
    pub status: i8,
    pub online_checksum: String,
    pub client_flags: i32,
    pub time_elapsed: i32,
}

/// A score row read back out, independent of which table it came from.
#[derive(Debug, Clone)]
pub struct ScoreRow {
    pub id: i32,
    pub user_id: i32,
    pub map_md5: String,
    pub pp: f32,
    pub accuracy: f32,
    pub score: i64,
    pub max_combo: i32,
    pub status: i8,
    pub online_checksum: String,
    pub grade: String,
}

macro_rules! submode_dispatch {
    ($submode:expr, $vanilla:expr, $relax:expr, $autopilot:expr) => {
        match $submode {
            Submode::Vanilla => $vanilla,
            Submode::Relax => $relax,
            Submode::Autopilot => $autopilot,
        }
    };
}

pub async fn insert(db: &DatabaseConnection, submode: Submode, new: NewScore) -> DbResult<i32> {
    let now = chrono::Utc::now();
    macro_rules! insert_into {
        ($module:ident) => {{
            use crate::database::entities::scores::$module::ActiveModel;
            let model = ActiveModel {
                user_id: Set(new.user_id),
                map_md5: Set(new.map_md5),
                mode: Set(new.mode),
                score: Set(new.score),
                pp: Set(new.pp),
                accuracy: Set(new.accuracy),
                max_combo: Set(new.max_combo),
                mods: Set(new.mods),
                n300: Set(new.n300),
                n100: Set(new.n100),
                n50: Set(new.n50),
                ngeki: Set(new.ngeki),
                nkatu: Set(new.nkatu),
                nmiss: Set(new.nmiss),
                grade: Set(new.grade),
                passed: Set(new.passed),
                perfect: Set(new.perfect),
                status: Set(new.status),
                online_checksum: Set(new.online_checksum),
                client_flags: Set(new.client_flags),
                time_elapsed: Set(new.time_elapsed),
                submitted_at: Set(now.into()),
                ..Default::default()
            }
            .insert(db)
            .await?;
            model.id
        }};
    }
    Ok(submode_dispatch!(
        submode,
        insert_into!(scores_vanilla),
        insert_into!(scores_relax),
        insert_into!(scores_autopilot)
    ))
}

/// Looks up the existing `best` row for (user, map, mode), if any.
pub async fn find_best(
    db: &DatabaseConnection,
    submode: Submode,
    user_id: i32,
    map_md5: &str,
    mode: i8,
) -> DbResult<Option<ScoreRow>> {
    macro_rules! find_in {
        ($module:ident) => {{
            use crate::database::entities::scores::$module::{Column, Entity};
            Entity::find()
                .filter(Column::UserId.eq(user_id))
                .filter(Column::MapMd5.eq(map_md5))
                .filter(Column::Mode.eq(mode))
                .filter(Column::Status.eq(2i8))
                .one(db)
                .await?
                .map(|m| ScoreRow {
                    id: m.id,
                    user_id: m.user_id,
                    map_md5: m.map_md5,
                    pp: m.pp,
                    accuracy: m.accuracy,
                    score: m.score,
                    max_combo: m.max_combo,
                    status: m.status,
                    online_checksum: m.online_checksum,
                    grade: m.grade,
                })
        }};
    }
    Ok(submode_dispatch!(
        submode,
        find_in!(scores_vanilla),
        find_in!(scores_relax),
        find_in!(scores_autopilot)
    ))
}

/// Whether a row with this exact online-checksum already exists for the
/// mode (the canonical duplicate-detection rule, §9 resolution #2).
pub async fn checksum_exists(
    db: &DatabaseConnection,
    submode: Submode,
    mode: i8,
    online_checksum: &str,
) -> DbResult<bool> {
    macro_rules! exists_in {
        ($module:ident) => {{
            use crate::database::entities::scores::$module::{Column, Entity};
            Entity::find()
                .filter(Column::Mode.eq(mode))
                .filter(Column::OnlineChecksum.eq(online_checksum))
                .one(db)
                .await?
                .is_some()
        }};
    }
    Ok(submode_dispatch!(
        submode,
        exists_in!(scores_vanilla),
        exists_in!(scores_relax),
        exists_in!(scores_autopilot)
    ))
}

pub async fn demote_to_submitted(db: &DatabaseConnection, submode: Submode, score_id: i32) -> DbResult<()> {
    macro_rules! demote_in {
        ($module:ident) => {{
            use crate::database::entities::scores::$module::{ActiveModel, Entity};
            if let Some(existing) = Entity::find_by_id(score_id).one(db).await? {
                let mut model: ActiveModel = existing.into();
                model.status = Set(1);
                model.update(db).await?;
            }
        }};
    }
    submode_dispatch!(
        submode,
        demote_in!(scores_vanilla),
        demote_in!(scores_relax),
        demote_in!(scores_autopilot)
    );
    Ok(())
}

/// The player's best rows for `mode`, ordered by pp descending, capped at
/// `limit` — the window the weighted aggregates are computed over.
pub async fn top_best_by_pp(
    db: &DatabaseConnection,
    submode: Submode,
    user_id: i32,
    mode: i8,
    limit: u64,
) -> DbResult<Vec<(f32, f32)>> {
    macro_rules! top_in {
        ($module:ident) => {{
            use crate::database::entities::scores::$module::{Column, Entity};
            Entity::find()
                .filter(Column::UserId.eq(user_id))
                .filter(Column::Mode.eq(mode))
                .filter(Column::Status.eq(2i8))
                .order_by(Column::Pp, Order::Desc)
                .limit(limit)
                .all(db)
                .await?
                .into_iter()
                .map(|m| (m.pp, m.accuracy))
                .collect::<Vec<_>>()
        }};
    }
    Ok(submode_dispatch!(
        submode,
        top_in!(scores_vanilla),
        top_in!(scores_relax),
        top_in!(scores_autopilot)
    ))
}

/// Total count of non-failed rows for (user, mode) — `N` in the pp-weight
/// bonus formula, per §9 resolution #1.
pub async fn count_ranked_countable(
    db: &DatabaseConnection,
    submode: Submode,
    user_id: i32,
    mode: i8,
) -> DbResult<u64> {
    macro_rules! count_in {
        ($module:ident) => {{
            use crate::database::entities::scores::$module::{Column, Entity};
            Entity::find()
                .filter(Column::UserId.eq(user_id))
                .filter(Column::Mode.eq(mode))
                .filter(Column::Status.ne(0i8))
                .count(db)
                .await?
        }};
    }
    Ok(submode_dispatch!(
        submode,
        count_in!(scores_vanilla),
        count_in!(scores_relax),
        count_in!(scores_autopilot)
    ))
}

/// The current global-rank-1 row on a map/mode, if any, for the
/// rank-1 announcement's "previous #1" lookup.
pub async fn find_map_rank_1(
    db: &DatabaseConnection,
    submode: Submode,
    map_md5: &str,
    mode: i8,
) -> DbResult<Option<ScoreRow>> {
    macro_rules! find_in {
        ($module:ident) => {{
            use crate::database::entities::scores::$module::{Column, Entity};
            Entity::find()
                .filter(Column::MapMd5.eq(map_md5))
                .filter(Column::Mode.eq(mode))
                .filter(Column::Status.eq(2i8))
                .order_by(Column::Score, Order::Desc)
                .one(db)
                .await?
                .map(|m| ScoreRow {
                    id: m.id,
                    user_id: m.user_id,
                    map_md5: m.map_md5,
                    pp: m.pp,
                    accuracy: m.accuracy,
                    score: m.score,
                    max_combo: m.max_combo,
                    status: m.status,
                    online_checksum: m.online_checksum,
                    grade: m.grade,
                })
        }};
    }
    Ok(submode_dispatch!(
        submode,
        find_in!(scores_vanilla),
        find_in!(scores_relax),
        find_in!(scores_autopilot)
    ))
}

/// Count of best rows on a map/mode outscoring `score` — the map-leaderboard
/// rank is this plus one.
pub async fn count_better_on_map(
    db: &DatabaseConnection,
    submode: Submode,
    map_md5: &str,
    mode: i8,
    score: i64,
) -> DbResult<i64> {
    macro_rules! count_in {
        ($module:ident) => {{
            use crate::database::entities::scores::$module::{Column, Entity};
            Entity::find()
                .filter(Column::MapMd5.eq(map_md5))
                .filter(Column::Mode.eq(mode))
                .filter(Column::Status.eq(2i8))
                .filter(Column::Score.gt(score))
                .count(db)
                .await?
        }};
    }
    Ok(submode_dispatch!(
        submode,
        count_in!(scores_vanilla),
        count_in!(scores_relax),
        count_in!(scores_autopilot)
    ) as i64)
}
