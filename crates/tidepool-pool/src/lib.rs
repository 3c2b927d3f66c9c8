//! Tidepool - multi-tenant SQL connection pool
//!
//! Tidepool hands open database connections to application-server workers
//! and reclaims them for reuse. Each configured database gets a fixed set of
//! named slots; a slot is always in exactly one of three places: the
//! *available* stack (closed), the *cached* stack (open, idle), or borrowed
//! by a worker. A background reaper closes cached connections that sit idle
//! past a grace period.
//!
//! ```rust,ignore
//! use tidepool_drivers::DriverRegistry;
//! use tidepool_pool::{DatabaseSettings, HostSettings, PoolConfig};
//!
//! let settings = HostSettings::default()
//!     .with_max_workers(8)
//!     .with_database(DatabaseSettings {
//!         driver_type: "sqlite".into(),
//!         database_name: "data/app.db".into(),
//!         post_open_statements: "PRAGMA busy_timeout=5000".into(),
//!         ..Default::default()
//!     });
//!
//! let pool = tidepool_pool::init(&settings, &DriverRegistry::with_defaults(), PoolConfig::default());
//!
//! let handle = pool.acquire(0).await?;
//! handle.execute("INSERT INTO events (kind) VALUES ('boot')").await?;
//! pool.release(handle, false).await;
//! ```

mod bootstrap;
mod config;
mod pool;
mod reaper;
mod registry;
mod settings;
mod setup;
mod slot;
mod stack;
mod stats;

#[cfg(test)]
mod tests;

pub use bootstrap::{init, instance, try_instance};
pub use config::PoolConfig;
pub use pool::{Pool, PooledHandle};
pub use registry::SlotRegistry;
pub use settings::{DatabaseSettings, HostSettings};
pub use slot::Slot;
pub use stack::NameStack;
pub use stats::PoolStats;

/// Re-export commonly used types from tidepool-core
pub use tidepool_core::{Connection, DatabaseDriver, Result, SqlExtension, TidepoolError};
