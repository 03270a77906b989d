//! Database layer.
//!
//! This module provides:
//! - Opening pools from connection options
//! - The named connection registry
//! - Raw SQL pagination
//! - Parameter binding and backend dispatch helpers

#[macro_use]
pub mod macros;
pub mod pager;
pub(crate) mod params;
pub mod pool;
pub mod registry;

pub use pager::{
    DEFAULT_PAGE_SIZE, FromDbRow, PageInfo, PageWindow, Pager, default_page_size,
    set_default_page_size,
};
pub use pool::{DbPool, open};
pub use registry::ConnectionRegistry;
