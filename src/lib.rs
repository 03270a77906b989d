//! emix-db
//!
//! Named database connections loaded from YAML, a registry of opened sqlx
//! pools keyed by name, and a count-then-window pager for raw SQL.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::{Config, DbConfig, ReloadPlan};
pub use db::{ConnectionRegistry, DbPool, Pager};
pub use error::{DbError, DbResult};
