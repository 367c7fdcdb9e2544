pub use sea_orm_migration::prelude::*;

mod m20240101_000001_users;
mod m20240101_000002_stats;
mod m20240101_000003_maps;
mod m20240101_000004_scores;
mod m20240101_000005_social;
mod m20240101_000006_aux_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_users::Migration),
            Box::new(m20240101_000002_stats::Migration),
            Box::new(m20240101_000003_maps::Migration),
            Box::new(m20240101_000004_scores::Migration),
            Box::new(m20240101_000005_social::Migration),
            Box::new(m20240101_000006_aux_tables::Migration),
        ]
    }
}
