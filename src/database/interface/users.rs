use super::DbResult;
use crate::database::entities::users::{self, ActiveModel, Column, Entity, Model};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter,
};

pub fn normalize(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

pub async fn find_by_id(db: &DatabaseConnection, id: i32) -> DbResult<Option<Model>> {
    Entity::find_by_id(id).one(db).await
}

pub async fn find_by_name(db: &DatabaseConnection, name: &str) -> DbResult<Option<Model>> {
    Entity::find()
        .filter(Column::NormalizedName.eq(normalize(name)))
        .one(db)
        .await
}

pub async fn create(
    db: &DatabaseConnection,
    name: String,
    email: String,
    bcrypt_password: String,
    country: String,
) -> DbResult<Model> {
    let now = chrono::Utc::now();
    let normalized_name = normalize(&name);
    ActiveModel {
        name: Set(name),
        normalized_name: Set(normalized_name),
        email: Set(email),
        password: Set(bcrypt_password),
        country: Set(country),
        privileges: Set(users::Model::default_privileges()),
        silence_end: Set(0),
        block_non_friend_dms: Set(false),
        creation_time: Set(now.into()),
        latest_activity: Set(now.into()),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn touch_activity(db: &DatabaseConnection, user: Model) -> DbResult<Model> {
    let mut model = user.into_active_model();
    model.latest_activity = Set(chrono::Utc::now().into());
    model.update(db).await
}

pub async fn set_silence_end(db: &DatabaseConnection, user: Model, silence_end: i64) -> DbResult<Model> {
    let mut model = user.into_active_model();
    model.silence_end = Set(silence_end);
    model.update(db).await
}

pub async fn set_block_non_friend_dms(
    db: &DatabaseConnection,
    user: Model,
    value: bool,
) -> DbResult<Model> {
    let mut model = user.into_active_model();
    model.block_non_friend_dms = Set(value);
    model.update(db).await
}

pub async fn set_privileges(db: &DatabaseConnection, user: Model, privileges: i32) -> DbResult<Model> {
    let mut model = user.into_active_model();
    model.privileges = Set(privileges);
    model.update(db).await
}

/// Counts unrestricted users in `mode`/`submode` with strictly greater pp
/// than `pp`, used to compute a player's global rank (`+1`).
///
/// The unrestricted check is a bitwise `&` against `privileges`, which the
/// query builder doesn't express directly, so this runs as raw SQL.
pub async fn count_unrestricted_with_greater_pp(
    db: &DatabaseConnection,
    mode: i8,
    submode: i8,
    pp: f32,
) -> DbResult<i64> {
    use sea_orm::{ConnectionTrait, FromQueryResult, Statement};

    #[derive(FromQueryResult)]
    struct Count {
        count: i64,
    }

    let stmt = Statement::from_sql_and_values(
        db.get_database_backend(),
        "SELECT COUNT(*) AS count FROM stats \
         INNER JOIN users ON users.id = stats.user_id \
         WHERE stats.mode = ? AND stats.submode = ? AND stats.pp > ? \
         AND (users.privileges & 1) != 0",
        [mode.into(), submode.into(), pp.into()],
    );

    let row = Count::find_by_statement(stmt).one(db).await?;
    Ok(row.map(|r| r.count).unwrap_or(0))
}
