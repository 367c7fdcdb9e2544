use super::DbResult;
use crate::database::entities::client_hashes::{ActiveModel, Column, Entity, Model};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter,
};

/// Records (or bumps the occurrence counter of) a login's hardware-id
/// bundle for `user_id`.
pub async fn record(
    db: &DatabaseConnection,
    user_id: i32,
    osu_path_md5: &str,
    adapters: &str,
    adapters_md5: &str,
    uninstall_md5: &str,
    disk_serial_md5: &str,
) -> DbResult<Model> {
    let existing = Entity::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::AdaptersMd5.eq(adapters_md5))
        .filter(Column::UninstallMd5.eq(uninstall_md5))
        .filter(Column::DiskSerialMd5.eq(disk_serial_md5))
        .one(db)
        .await?;

    if let Some(existing) = existing {
        let mut model = existing.into_active_model();
        let occurrences: i32 = *model.occurrences.as_ref();
        model.occurrences = Set(occurrences + 1);
        model.latest_time = Set(chrono::Utc::now().into());
        return model.update(db).await;
    }

    ActiveModel {
        user_id: Set(user_id),
        osu_path_md5: Set(osu_path_md5.to_string()),
        adapters: Set(adapters.to_string()),
        adapters_md5: Set(adapters_md5.to_string()),
        uninstall_md5: Set(uninstall_md5.to_string()),
        disk_serial_md5: Set(disk_serial_md5.to_string()),
        occurrences: Set(1),
        latest_time: Set(chrono::Utc::now().into()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Other account ids sharing any of this hardware-id bundle's hashes —
/// the multi-accounting detection signal consulted at login.
pub async fn find_other_accounts(
    db: &DatabaseConnection,
    user_id: i32,
    adapters_md5: &str,
    uninstall_md5: &str,
    disk_serial_md5: &str,
) -> DbResult<Vec<i32>> {
    let rows = Entity::find()
        .filter(Column::UserId.ne(user_id))
        .filter(
            Column::AdaptersMd5
                .eq(adapters_md5)
                .or(Column::UninstallMd5.eq(uninstall_md5))
                .or(Column::DiskSerialMd5.eq(disk_serial_md5)),
        )
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|r| r.user_id).collect())
}
