use super::DbResult;
use crate::database::entities::friendships::{ActiveModel, Column, Entity};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};

pub async fn add(db: &DatabaseConnection, user_id: i32, friend_id: i32) -> DbResult<()> {
    let existing = Entity::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::FriendId.eq(friend_id))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }
    ActiveModel {
        user_id: Set(user_id),
        friend_id: Set(friend_id),
    }
    .insert(db)
    .await?;
    Ok(())
}

pub async fn remove(db: &DatabaseConnection, user_id: i32, friend_id: i32) -> DbResult<()> {
    Entity::delete_many()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::FriendId.eq(friend_id))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn list(db: &DatabaseConnection, user_id: i32) -> DbResult<Vec<i32>> {
    let rows = Entity::find()
        .filter(Column::UserId.eq(user_id))
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|r| r.friend_id).collect())
}
