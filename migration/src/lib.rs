pub use sea_orm_migration::prelude::*;

mod m20241005_000001_create_riders;
mod m20241005_000002_create_carpools;
mod m20241005_000003_create_bookings;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20241005_000001_create_riders::Migration),
            Box::new(m20241005_000002_create_carpools::Migration),
            Box::new(m20241005_000003_create_bookings::Migration),
        ]
    }
}
