//! Data models for emix-db.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{ConnectionOptions, DEFAULT_DIALECT, Dialect};
pub use query::QueryParam;
