//! Borrow/return engine and per-database slot stores

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::sync::Notify;

use tidepool_core::{Connection, Result, SqlExtension, TidepoolError};
use tidepool_drivers::DriverRegistry;

use crate::config::PoolConfig;
use crate::reaper::Reaper;
use crate::registry::SlotRegistry;
use crate::settings::HostSettings;
use crate::setup::apply_database_settings;
use crate::slot::{Slot, database_id_of, slot_name};
use crate::stack::NameStack;
use crate::stats::PoolStats;

/// Current wall clock as unix seconds
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Slot stores for one configured database.
///
/// Every registered slot name for the database is in exactly one place:
/// `available` (closed), `cached` (open, idle), or held by a borrowing
/// worker.
pub(crate) struct DatabaseSlots {
    /// Names of currently closed slots, eligible for the slow path
    pub(crate) available: NameStack,
    /// Names of open idle slots, eligible for fast reuse
    pub(crate) cached: NameStack,
    /// Unix seconds of the most recent push into `cached`
    pub(crate) last_cached_at: AtomicU64,
    /// Wakes acquirers blocked on both stacks being empty
    pub(crate) notify: Notify,
    /// Slots registered for this database at init
    pub(crate) registered: usize,
}

impl DatabaseSlots {
    fn new() -> Self {
        Self {
            available: NameStack::new(),
            cached: NameStack::new(),
            last_cached_at: AtomicU64::new(0),
            notify: Notify::new(),
            registered: 0,
        }
    }
}

pub(crate) struct PoolInner {
    registry: SlotRegistry,
    databases: Vec<DatabaseSlots>,
    max_workers: usize,
    environment: String,
    any_enabled: bool,
    config: PoolConfig,
    closed: AtomicBool,
    reaper: Mutex<Option<Reaper>>,
}

impl PoolInner {
    /// Return a name to the cache and stamp the return time.
    fn cache(&self, name: &str) {
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!(slot = %name, "pool is shut down; dropping returned connection");
            return;
        }
        let Some(database_id) = database_id_of(name).filter(|id| *id < self.databases.len())
        else {
            tracing::error!(slot = %name, "released a connection with an invalid name");
            return;
        };
        let slots = &self.databases[database_id];
        slots.cached.push(name.to_string());
        slots.last_cached_at.store(unix_now(), Ordering::Release);
        slots.notify.notify_one();
        tracing::debug!(slot = %name, "connection returned to cache");
    }

    /// Close a returned connection and make its slot available again.
    async fn force_close(&self, name: &str) {
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!(slot = %name, "pool is shut down; dropping returned connection");
            return;
        }
        let Some(database_id) = database_id_of(name).filter(|id| *id < self.databases.len())
        else {
            tracing::error!(slot = %name, "released a connection with an invalid name");
            return;
        };
        tracing::warn!(slot = %name, "force closing connection");
        if let Some(slot) = self.registry.lookup(name) {
            slot.close().await;
        }
        let slots = &self.databases[database_id];
        slots.available.push(name.to_string());
        slots.notify.notify_one();
    }
}

/// A multi-tenant SQL connection pool.
///
/// Each configured database gets `max_workers_per_server` named slots,
/// registered once at construction. Workers borrow an open handle with
/// [`acquire`](Pool::acquire) and return it with [`release`](Pool::release)
/// (or by dropping it); a background reaper closes cached connections that
/// sit idle past the configured grace period.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Build a pool from host settings, registering every slot for every
    /// enabled database.
    ///
    /// Databases with an empty `DriverType`, or one that is not present in
    /// `drivers`, are disabled and get no slots. Slots whose database name is
    /// empty are skipped with an error log.
    pub fn new(settings: &HostSettings, drivers: &DriverRegistry, config: PoolConfig) -> Self {
        let registry = SlotRegistry::new();
        let mut any_enabled = false;
        let mut databases = Vec::new();

        if settings.sql_database_available {
            tracing::debug!("SQL database available");
            databases = (0..settings.database_count())
                .map(|_| DatabaseSlots::new())
                .collect::<Vec<_>>();

            for (database_id, database) in settings.databases.iter().enumerate() {
                let driver_type = database.driver_type.trim();
                if driver_type.is_empty() {
                    tracing::warn!(database_id, "empty parameter: DriverType");
                    continue;
                }
                let Some(driver) = drivers.resolve(driver_type) else {
                    tracing::warn!(database_id, driver = driver_type, "parameter 'DriverType' is invalid");
                    continue;
                };
                any_enabled = true;

                for index in 0..settings.max_workers_per_server {
                    let name = slot_name(database_id, index);
                    match apply_database_settings(
                        name.clone(),
                        database_id,
                        Arc::clone(&driver),
                        database,
                        settings,
                    ) {
                        Ok(slot) => {
                            registry.add(Arc::new(slot));
                            databases[database_id].available.push(name.clone());
                            databases[database_id].registered += 1;
                            tracing::debug!(slot = %name, "database slot registered");
                        }
                        Err(e) => {
                            tracing::error!(slot = %name, error = %e, "skipping slot");
                        }
                    }
                }
            }
        } else {
            tracing::warn!("SQL database not available");
        }

        Self {
            inner: Arc::new(PoolInner {
                registry,
                databases,
                max_workers: settings.max_workers_per_server,
                environment: settings.database_environment.clone(),
                any_enabled,
                config,
                closed: AtomicBool::new(false),
                reaper: Mutex::new(None),
            }),
        }
    }

    /// Whether at least one database was enabled at construction
    pub fn has_enabled_database(&self) -> bool {
        self.inner.any_enabled
    }

    /// Slots registered per database
    pub fn max_workers(&self) -> usize {
        self.inner.max_workers
    }

    /// Number of configured databases
    pub fn database_count(&self) -> usize {
        self.inner.databases.len()
    }

    pub(crate) fn slots(&self, database_id: usize) -> Option<&DatabaseSlots> {
        self.inner.databases.get(database_id)
    }

    /// Start the background reaper on the current Tokio runtime.
    pub fn start_reaper(&self) {
        let reaper = Reaper::spawn(self.clone(), self.inner.config.reap_interval());
        *self.inner.reaper.lock() = Some(reaper);
    }

    /// Borrow an open connection for database `database_id`.
    ///
    /// The fast path reuses a cached open connection. The slow path opens a
    /// closed slot and replays its post-open statements (individual statement
    /// failures are logged and ignored). When every slot is borrowed, waits
    /// until a worker returns one; the wait is unbounded by design, so a
    /// caller needing a timeout must wrap this externally.
    ///
    /// # Errors
    ///
    /// [`TidepoolError::NoPooledConnection`] when `database_id` is out of
    /// range, the database is disabled, or the pool is shut down;
    /// [`TidepoolError::OpenFailed`] when the driver refuses to open (the
    /// slot returns to the pool and the call may be retried later).
    pub async fn acquire(&self, database_id: usize) -> Result<PooledHandle> {
        let Some(slots) = self.inner.databases.get(database_id) else {
            return Err(TidepoolError::NoPooledConnection);
        };
        if slots.registered == 0 {
            return Err(TidepoolError::NoPooledConnection);
        }

        loop {
            if self.inner.closed.load(Ordering::Acquire) {
                return Err(TidepoolError::NoPooledConnection);
            }

            // Fast path: reuse an open cached connection.
            while let Some(name) = slots.cached.pop() {
                let Some(slot) = self.inner.registry.lookup(&name) else {
                    tracing::error!(slot = %name, "cached name has no registered slot");
                    slots.available.push(name);
                    slots.notify.notify_one();
                    continue;
                };
                match slot.connection() {
                    Some(conn) if !conn.is_closed() => {
                        tracing::debug!(slot = %name, "got cached connection");
                        return Ok(PooledHandle::new(slot, conn, Arc::clone(&self.inner)));
                    }
                    _ => {
                        tracing::error!(slot = %name, "pooled connection is not open");
                        slots.available.push(name);
                        slots.notify.notify_one();
                    }
                }
            }

            // Slow path: open a closed slot.
            while let Some(name) = slots.available.pop() {
                let Some(slot) = self.inner.registry.lookup(&name) else {
                    tracing::error!(slot = %name, "available name has no registered slot");
                    slots.available.push(name);
                    slots.notify.notify_one();
                    return Err(TidepoolError::OpenFailed("slot not registered".into()));
                };

                if let Some(conn) = slot.connection().filter(|c| !c.is_closed()) {
                    tracing::warn!(slot = %name, "available slot already holds an open connection");
                    return Ok(PooledHandle::new(slot, conn, Arc::clone(&self.inner)));
                }

                let conn = match slot.open().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!(slot = %name, error = %e, "database open error");
                        slots.available.push(name);
                        slots.notify.notify_one();
                        return Err(TidepoolError::OpenFailed(e.to_string()));
                    }
                };
                tracing::debug!(
                    slot = %name,
                    environment = %self.inner.environment,
                    "database opened",
                );

                for statement in slot.post_open_statements() {
                    if let Err(e) = conn.execute(statement).await {
                        tracing::warn!(slot = %name, statement = %statement, error = %e, "post-open statement failed");
                    }
                }
                return Ok(PooledHandle::new(slot, conn, Arc::clone(&self.inner)));
            }

            // Every slot is borrowed. Register for a wakeup, then re-check
            // the stacks so a release between the pops above and this point
            // is never missed.
            let notified = slots.notify.notified();
            if !slots.cached.is_empty() || !slots.available.is_empty() {
                continue;
            }
            notified.await;
        }
    }

    /// Return a borrowed handle to the pool.
    ///
    /// With `force_close` the connection is closed and the slot re-enters
    /// the slow path; otherwise the connection is cached for fast reuse.
    /// Dropping a handle is equivalent to releasing it without force.
    pub async fn release(&self, mut handle: PooledHandle, force_close: bool) {
        let Some(slot) = handle.take_slot() else {
            return;
        };
        // Route through the handle's own pool so a handle is always returned
        // to the stores it was borrowed from.
        let pool = Arc::clone(&handle.pool);
        if force_close {
            pool.force_close(slot.name()).await;
        } else {
            pool.cache(slot.name());
        }
    }

    /// Current counts for database `database_id`
    pub fn stats(&self, database_id: usize) -> Option<PoolStats> {
        let slots = self.inner.databases.get(database_id)?;
        let available = slots.available.len();
        let cached = slots.cached.len();
        let in_use = slots.registered.saturating_sub(available + cached);
        Some(PoolStats::new(available, cached, in_use))
    }

    /// Close cached connections whose database has been idle past the grace
    /// period, as of `now` (unix seconds). Their slots become available for
    /// the slow path again.
    ///
    /// The idle check uses one timestamp per database, stamped on the most
    /// recent return: a quiet database drains completely, a steady drip of
    /// returns keeps its whole cache warm.
    pub async fn sweep_at(&self, now: u64) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        let grace = self.inner.config.idle_grace().as_secs();
        for (database_id, slots) in self.inner.databases.iter().enumerate() {
            if slots.cached.is_empty() {
                continue;
            }
            while slots.last_cached_at.load(Ordering::Acquire) < now.saturating_sub(grace) {
                let Some(name) = slots.cached.pop() else {
                    break;
                };
                tracing::debug!(slot = %name, database_id, "closing idle connection");
                if let Some(slot) = self.inner.registry.lookup(&name) {
                    slot.close().await;
                }
                slots.available.push(name);
                slots.notify.notify_one();
            }
        }
    }

    /// Sweep against the current wall clock
    pub async fn sweep(&self) {
        self.sweep_at(unix_now()).await;
    }

    /// Tear down the pool: stop the reaper, close every cached connection,
    /// unregister every slot, and fail all pending and future acquires.
    ///
    /// Errors during close are ignored.
    pub async fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(reaper) = self.inner.reaper.lock().take() {
            reaper.stop();
        }
        for slots in &self.inner.databases {
            while let Some(name) = slots.cached.pop() {
                if let Some(slot) = self.inner.registry.remove(&name) {
                    slot.close().await;
                }
            }
            while let Some(name) = slots.available.pop() {
                self.inner.registry.remove(&name);
            }
            // Wake blocked acquirers so they observe the closed flag
            slots.notify.notify_waiters();
        }
        self.inner.registry.clear();
        tracing::info!("connection pool shut down");
    }
}

/// A connection borrowed from the pool.
///
/// Dereferences to the underlying [`Connection`]. Dropping the handle
/// returns the slot to the cache; use [`Pool::release`] with `force_close`
/// to close the connection instead.
pub struct PooledHandle {
    slot: Option<Arc<Slot>>,
    connection: Arc<dyn Connection>,
    pool: Arc<PoolInner>,
}

impl std::fmt::Debug for PooledHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledHandle")
            .field("driver_name", &self.connection.driver_name())
            .finish()
    }
}

impl PooledHandle {
    fn new(slot: Arc<Slot>, connection: Arc<dyn Connection>, pool: Arc<PoolInner>) -> Self {
        Self {
            slot: Some(slot),
            connection,
            pool,
        }
    }

    fn slot(&self) -> &Arc<Slot> {
        self.slot.as_ref().expect("slot taken")
    }

    pub(crate) fn take_slot(&mut self) -> Option<Arc<Slot>> {
        self.slot.take()
    }

    /// The slot name backing this handle
    pub fn name(&self) -> &str {
        self.slot().name()
    }

    /// The database index this handle belongs to
    pub fn database_id(&self) -> usize {
        self.slot().database_id()
    }

    /// Whether upsert generation was enabled for this database
    pub fn upsert_enabled(&self) -> bool {
        self.slot().upsert_enabled()
    }

    /// The driver extension attached to the slot at registration
    pub fn extension(&self) -> Arc<dyn SqlExtension> {
        Arc::clone(self.slot().extension())
    }

    /// The underlying connection
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }
}

impl Deref for PooledHandle {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref()
    }
}

impl Drop for PooledHandle {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.pool.cache(slot.name());
        }
    }
}
