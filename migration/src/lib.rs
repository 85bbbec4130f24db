pub use sea_orm_migration::prelude::*;

mod m20261001_000001_contact_and_deal;
mod m20261001_000002_deal_stage_history;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_contact_and_deal::Migration),
            Box::new(m20261001_000002_deal_stage_history::Migration),
        ]
    }
}
