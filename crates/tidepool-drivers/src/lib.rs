//! Tidepool drivers - database driver implementations
//!
//! This crate provides concrete implementations of the driver traits defined
//! in `tidepool-core`, the [`DriverRegistry`] the pool resolves driver names
//! through, and the [`extension_for`] factory that builds per-driver SQL
//! extensions.

#[cfg(feature = "sqlite")]
pub mod sqlite;

mod extension;
mod registry;

pub use extension::{MysqlExtension, PostgresExtension, SqliteExtension, extension_for};
pub use registry::DriverRegistry;

/// Re-export commonly used types from tidepool-core
pub use tidepool_core::{
    Connection, ConnectionConfig, DatabaseDriver, Result, SqlExtension, TidepoolError,
};
