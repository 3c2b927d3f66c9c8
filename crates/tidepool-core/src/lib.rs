//! Tidepool core - shared traits and types
//!
//! This crate defines the contracts between the connection pool and the
//! database drivers it manages: the [`Connection`] handle trait, the
//! [`DatabaseDriver`] trait, per-slot [`ConnectionConfig`], and the
//! [`SqlExtension`] driver-extension point.

mod connection;
mod driver;
mod error;
mod extension;

pub use connection::Connection;
pub use driver::{ConnectionConfig, DatabaseDriver};
pub use error::{Result, TidepoolError};
pub use extension::{GenericExtension, SqlExtension};
