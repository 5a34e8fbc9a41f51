//! Orgdesk server library.
//!
//! User and organization management on top of an external identity
//! provider, with machine-to-machine OAuth2 clients delegated to an external
//! OAuth2 provider. Exposes the HTTP API, session authentication, database
//! access and provider adapters.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;
