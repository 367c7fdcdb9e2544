use super::DbResult;
use crate::database::entities::mail::{ActiveModel, Column, Entity, Model};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder,
};

pub async fn queue(db: &DatabaseConnection, from_id: i32, to_id: i32, msg: String) -> DbResult<Model> {
    ActiveModel {
        from_id: Set(from_id),
        to_id: Set(to_id),
        msg: Set(msg),
        time: Set(chrono::Utc::now().into()),
        read: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Unread mail for `to_id`, oldest first — delivery order on login.
pub async fn unread_for(db: &DatabaseConnection, to_id: i32) -> DbResult<Vec<Model>> {
    Entity::find()
        .filter(Column::ToId.eq(to_id))
        .filter(Column::Read.eq(false))
        .order_by_asc(Column::Time)
        .all(db)
        .await
}

pub async fn mark_all_read(db: &DatabaseConnection, to_id: i32) -> DbResult<()> {
    for row in unread_for(db, to_id).await? {
        let mut model = row.into_active_model();
        model.read = Set(true);
        model.update(db).await?;
    }
    Ok(())
}
