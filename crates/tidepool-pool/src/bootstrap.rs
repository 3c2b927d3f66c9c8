//! Process-wide pool bootstrap

use std::sync::OnceLock;

use tidepool_drivers::DriverRegistry;

use crate::config::PoolConfig;
use crate::pool::Pool;
use crate::settings::HostSettings;

static POOL: OnceLock<Pool> = OnceLock::new();

/// Build and install the process-wide pool.
///
/// The first call constructs the pool, registering every slot for every
/// enabled database and starting the reaper when at least one database is
/// enabled. Later calls return the existing instance unchanged.
///
/// Must run inside a Tokio runtime so the reaper task can be spawned.
pub fn init(settings: &HostSettings, drivers: &DriverRegistry, config: PoolConfig) -> &'static Pool {
    POOL.get_or_init(|| {
        let pool = Pool::new(settings, drivers, config);
        if pool.has_enabled_database() {
            pool.start_reaper();
        }
        pool
    })
}

/// The installed pool.
///
/// # Panics
///
/// Panics if [`init`] has not been called.
pub fn instance() -> &'static Pool {
    POOL.get()
        .expect("tidepool not initialized: call tidepool_pool::init first")
}

/// The installed pool, or `None` before [`init`]
pub fn try_instance() -> Option<&'static Pool> {
    POOL.get()
}
