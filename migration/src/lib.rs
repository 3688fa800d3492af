pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20260114_000001_urls_table;
mod m20260114_000002_analytics_tables;
mod m20260120_000001_analytics_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260114_000001_urls_table::Migration),
            Box::new(m20260114_000002_analytics_tables::Migration),
            Box::new(m20260120_000001_analytics_indexes::Migration),
        ]
    }
}
