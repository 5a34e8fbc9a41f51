//! SeaORM entity definitions for PostgreSQL database.

pub mod oauth2_client;
pub mod oauth2_client_audit;
pub mod organization;
pub mod organization_member;
pub mod user;
