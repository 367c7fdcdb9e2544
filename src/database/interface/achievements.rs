use super::DbResult;
use crate::database::entities::achievements::{Column, Entity, Model};
use crate::database::entities::user_achievements::{
    ActiveModel as UserAchievementActiveModel, Column as UaColumn, Entity as UserAchievementEntity,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};

/// Achievements defined for `mode` (or mode-agnostic) that `user_id`
/// hasn't unlocked yet — the candidate set the score pipeline checks
/// after every submission.
pub async fn not_yet_unlocked(
    db: &DatabaseConnection,
    user_id: i32,
    mode: i8,
) -> DbResult<Vec<Model>> {
    let unlocked: Vec<i32> = UserAchievementEntity::find()
        .filter(UaColumn::UserId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|r| r.achievement_id)
        .collect();

    let all = Entity::find()
        .filter(Column::Mode.eq(mode).or(Column::Mode.eq(-1i8)))
        .all(db)
        .await?;

    Ok(all
        .into_iter()
        .filter(|a| !unlocked.contains(&a.id))
        .collect())
}

pub async fn unlock(db: &DatabaseConnection, user_id: i32, achievement_id: i32) -> DbResult<()> {
    UserAchievementActiveModel {
        user_id: Set(user_id),
        achievement_id: Set(achievement_id),
        unlocked_at: Set(chrono::Utc::now().into()),
    }
    .insert(db)
    .await?;
    Ok(())
}
