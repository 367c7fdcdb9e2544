use super::DbResult;
use crate::database::entities::stats::{ActiveModel, Column, Entity, Model};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter,
};

pub async fn find(
    db: &DatabaseConnection,
    user_id: i32,
    mode: i8,
    submode: i8,
) -> DbResult<Option<Model>> {
    Entity::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::Mode.eq(mode))
        .filter(Column::Submode.eq(submode))
        .one(db)
        .await
}

/// Fetches the row, creating a zeroed one on first encounter with a
/// (user, mode, submode) triple.
pub async fn find_or_create(
    db: &DatabaseConnection,
    user_id: i32,
    mode: i8,
    submode: i8,
) -> DbResult<Model> {
    if let Some(existing) = find(db, user_id, mode, submode).await? {
        return Ok(existing);
    }
    ActiveModel {
        user_id: Set(user_id),
        mode: Set(mode),
        submode: Set(submode),
        ranked_score: Set(0),
        total_score: Set(0),
        pp: Set(0.0),
        accuracy: Set(0.0),
        plays: Set(0),
        playtime: Set(0),
        max_combo: Set(0),
        count_xh: Set(0),
        count_x: Set(0),
        count_sh: Set(0),
        count_s: Set(0),
        count_a: Set(0),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Grade letters counted by the histogram columns. `SS`/`S` split into a
/// hidden-mod ("silver") variant the same way the client's grade enum does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Xh,
    X,
    Sh,
    S,
    A,
    Other,
}

/// Applies a newly-submitted play to the cumulative stats row: bumps the
/// grade histogram, play/playtime counters, max combo, and the running
/// ranked/total score, and overwrites `pp`/`accuracy` with freshly
/// recomputed weighted values.
#[allow(clippy::too_many_arguments)]
pub async fn apply_score(
    db: &DatabaseConnection,
    row: Model,
    grade: Grade,
    demoted_grade: Option<Grade>,
    score_delta: i64,
    ranked_score_delta: i64,
    max_combo: i32,
    time_elapsed_secs: i32,
    new_pp: f32,
    new_accuracy: f32,
) -> DbResult<Model> {
    let mut model = row.into_active_model();
    let current_plays: i32 = *model.plays.as_ref();
    model.plays = Set(current_plays + 1);
    model.playtime = Set(*model.playtime.as_ref() + time_elapsed_secs);
    model.total_score = Set(*model.total_score.as_ref() + score_delta);
    model.ranked_score = Set(*model.ranked_score.as_ref() + ranked_score_delta);
    if max_combo > *model.max_combo.as_ref() {
        model.max_combo = Set(max_combo);
    }
    model.pp = Set(new_pp);
    model.accuracy = Set(new_accuracy);

    let mut bump = |g: Grade, delta: i32| match g {
        Grade::Xh => model.count_xh = Set(*model.count_xh.as_ref() + delta),
        Grade::X => model.count_x = Set(*model.count_x.as_ref() + delta),
        Grade::Sh => model.count_sh = Set(*model.count_sh.as_ref() + delta),
        Grade::S => model.count_s = Set(*model.count_s.as_ref() + delta),
        Grade::A => model.count_a = Set(*model.count_a.as_ref() + delta),
        Grade::Other => {}
    };
    bump(grade, 1);
    // A previous best superseded by this play stops counting toward its
    // own grade bucket, as long as the grade actually changed.
    if let Some(demoted) = demoted_grade {
        if demoted != grade {
            bump(demoted, -1);
        }
    }
    model.update(db).await
}
