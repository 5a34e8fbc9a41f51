//! SeaORM database migrations.

pub use sea_orm_migration::prelude::*;

mod m20261015_000001_create_users;
mod m20261015_000002_create_organizations;
mod m20261015_000003_create_organization_members;
mod m20261015_000004_create_oauth2_clients;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261015_000001_create_users::Migration),
            Box::new(m20261015_000002_create_organizations::Migration),
            Box::new(m20261015_000003_create_organization_members::Migration),
            Box::new(m20261015_000004_create_oauth2_clients::Migration),
        ]
    }
}
