use super::DbResult;
use crate::database::entities::maps::{ActiveModel, Column, Entity, Model};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter,
};

pub async fn find_by_md5(db: &DatabaseConnection, md5: &str) -> DbResult<Option<Model>> {
    Entity::find().filter(Column::Md5.eq(md5)).one(db).await
}

pub async fn increment_plays(db: &DatabaseConnection, map: Model, passed: bool) -> DbResult<Model> {
    let mut model = map.into_active_model();
    let plays: i32 = *model.plays.as_ref();
    model.plays = Set(plays + 1);
    if passed {
        let passes: i32 = *model.passes.as_ref();
        model.passes = Set(passes + 1);
    }
    model.update(db).await
}

pub async fn upsert(
    db: &DatabaseConnection,
    md5: String,
    set_id: i32,
    artist: String,
    title: String,
    version: String,
    creator: String,
    mode: i8,
    status: i8,
) -> DbResult<Model> {
    if let Some(existing) = find_by_md5(db, &md5).await? {
        if existing.frozen {
            return Ok(existing);
        }
        let mut model = existing.into_active_model();
        model.set_id = Set(set_id);
        model.artist = Set(artist);
        model.title = Set(title);
        model.version = Set(version);
        model.creator = Set(creator);
        model.mode = Set(mode);
        model.status = Set(status);
        model.last_updated = Set(chrono::Utc::now().into());
        return model.update(db).await;
    }
    ActiveModel {
        set_id: Set(set_id),
        md5: Set(md5),
        artist: Set(artist),
        title: Set(title),
        version: Set(version),
        creator: Set(creator),
        mode: Set(mode),
        status: Set(status),
        plays: Set(0),
        passes: Set(0),
        frozen: Set(false),
        last_updated: Set(chrono::Utc::now().into()),
        ..Default::default()
    }
    .insert(db)
    .await
}
