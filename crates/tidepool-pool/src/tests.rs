//! Pool scenario and invariant tests

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tidepool_core::{Connection, ConnectionConfig, DatabaseDriver, Result, TidepoolError};
use tidepool_drivers::DriverRegistry;

use crate::config::PoolConfig;
use crate::pool::{Pool, unix_now};
use crate::settings::{DatabaseSettings, HostSettings};
use crate::setup::apply_database_settings;
use crate::slot::database_id_of;

/// Mock connection recording executed statements into a shared log
struct MockConnection {
    closed: AtomicBool,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        if self.is_closed() {
            return Err(TidepoolError::Connection("connection is closed".into()));
        }
        self.log.lock().push(sql.to_string());
        Ok(0)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Mock driver counting opens, optionally refusing them
struct MockDriver {
    file_based: bool,
    fail_opens: AtomicBool,
    opens: AtomicUsize,
    log: Arc<Mutex<Vec<String>>>,
    connections: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockDriver {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            file_based: false,
            fail_opens: AtomicBool::new(false),
            opens: AtomicUsize::new(0),
            log: Arc::new(Mutex::new(Vec::new())),
            connections: Mutex::new(Vec::new()),
        })
    }

    fn file_based() -> Arc<Self> {
        Arc::new(Self {
            file_based: true,
            fail_opens: AtomicBool::new(false),
            opens: AtomicUsize::new(0),
            log: Arc::new(Mutex::new(Vec::new())),
            connections: Mutex::new(Vec::new()),
        })
    }

    fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseDriver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_file_based(&self) -> bool {
        self.file_based
    }

    async fn connect(&self, _config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        if self.fail_opens.load(Ordering::SeqCst) {
            return Err(TidepoolError::Connection("mock open refused".into()));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        let conn = Arc::new(MockConnection {
            closed: AtomicBool::new(false),
            log: Arc::clone(&self.log),
        });
        self.connections.lock().push(Arc::clone(&conn));
        Ok(conn)
    }
}

fn registry_with(driver: Arc<MockDriver>) -> DriverRegistry {
    let mut drivers = DriverRegistry::new();
    drivers.register(driver);
    drivers
}

fn mock_database() -> DatabaseSettings {
    DatabaseSettings {
        driver_type: "mock".into(),
        database_name: "test.db".into(),
        ..Default::default()
    }
}

fn single_db_pool(max_workers: usize, driver: &Arc<MockDriver>) -> Pool {
    let settings = HostSettings::default()
        .with_max_workers(max_workers)
        .with_database(mock_database());
    Pool::new(
        &settings,
        &registry_with(Arc::clone(driver)),
        PoolConfig::default(),
    )
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn cold_start_registers_all_slots() {
    let driver = MockDriver::new();
    let pool = single_db_pool(4, &driver);

    let slots = pool.slots(0).expect("database 0");
    let available: HashSet<String> = slots.available.snapshot().into_iter().collect();
    let expected: HashSet<String> = ["rdb00_0", "rdb00_1", "rdb00_2", "rdb00_3"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(available, expected);
    assert!(slots.cached.is_empty());

    let stats = pool.stats(0).expect("stats");
    assert_eq!(stats.available(), 4);
    assert_eq!(stats.cached(), 0);
    assert_eq!(stats.in_use(), 0);
    assert_eq!(driver.open_count(), 0);
}

#[tokio::test]
async fn disabled_database_gets_no_slots() {
    let driver = MockDriver::new();
    let settings = HostSettings::default()
        .with_max_workers(2)
        .with_database(mock_database())
        .with_database(DatabaseSettings {
            driver_type: String::new(),
            database_name: "ignored.db".into(),
            ..Default::default()
        });
    let pool = Pool::new(
        &settings,
        &registry_with(Arc::clone(&driver)),
        PoolConfig::default(),
    );

    assert_eq!(pool.stats(1).expect("stats").total(), 0);
    let err = pool.acquire(1).await.expect_err("disabled database");
    assert!(matches!(err, TidepoolError::NoPooledConnection));

    // The enabled database is unaffected
    assert_eq!(pool.stats(0).expect("stats").available(), 2);
}

#[tokio::test]
async fn empty_database_name_skips_slots() {
    let driver = MockDriver::new();
    let settings = HostSettings::default()
        .with_max_workers(3)
        .with_database(DatabaseSettings {
            driver_type: "mock".into(),
            database_name: "  ".into(),
            ..Default::default()
        });
    let pool = Pool::new(
        &settings,
        &registry_with(Arc::clone(&driver)),
        PoolConfig::default(),
    );

    assert_eq!(pool.stats(0).expect("stats").total(), 0);
    assert!(pool.acquire(0).await.is_err());
}

#[tokio::test]
async fn unavailable_subsystem_registers_nothing() {
    let driver = MockDriver::new();
    let settings = HostSettings {
        sql_database_available: false,
        ..HostSettings::default().with_database(mock_database())
    };
    let pool = Pool::new(
        &settings,
        &registry_with(Arc::clone(&driver)),
        PoolConfig::default(),
    );

    assert!(!pool.has_enabled_database());
    assert!(matches!(
        pool.acquire(0).await,
        Err(TidepoolError::NoPooledConnection)
    ));
}

#[test]
fn registered_names_round_trip_database_id() {
    let driver = MockDriver::new();
    let settings = HostSettings::default()
        .with_max_workers(3)
        .with_database(mock_database())
        .with_database(mock_database())
        .with_database(mock_database());
    let pool = Pool::new(
        &settings,
        &registry_with(Arc::clone(&driver)),
        PoolConfig::default(),
    );

    for database_id in 0..3 {
        let slots = pool.slots(database_id).expect("database slots");
        for name in slots.available.snapshot() {
            assert_eq!(database_id_of(&name), Some(database_id));
        }
    }
}

// =============================================================================
// Borrow / return
// =============================================================================

#[tokio::test]
async fn fast_path_reuses_same_connection() {
    let driver = MockDriver::new();
    let pool = single_db_pool(4, &driver);

    let first = pool.acquire(0).await.expect("first acquire");
    let name = first.name().to_string();
    pool.release(first, false).await;

    let second = pool.acquire(0).await.expect("second acquire");
    assert_eq!(second.name(), name);
    assert_eq!(driver.open_count(), 1);
}

#[tokio::test]
async fn exhaustion_blocks_until_release() {
    let driver = MockDriver::new();
    let pool = single_db_pool(2, &driver);

    let first = pool.acquire(0).await.expect("first");
    let second = pool.acquire(0).await.expect("second");
    assert_eq!(pool.stats(0).expect("stats").in_use(), 2);

    let waiter_pool = pool.clone();
    let waiter = tokio::spawn(async move { waiter_pool.acquire(0).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    let released = first.name().to_string();
    pool.release(first, false).await;

    let third = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter completed")
        .expect("waiter task")
        .expect("third acquire");
    assert_eq!(third.name(), released);

    pool.release(second, false).await;
    pool.release(third, false).await;
}

#[tokio::test]
async fn force_close_recycles_to_available() {
    let driver = MockDriver::new();
    let settings = HostSettings::default()
        .with_max_workers(2)
        .with_database(DatabaseSettings {
            driver_type: "mock".into(),
            database_name: "test.db".into(),
            post_open_statements: "PRAGMA one; PRAGMA two".into(),
            ..Default::default()
        });
    let pool = Pool::new(
        &settings,
        &registry_with(Arc::clone(&driver)),
        PoolConfig::default(),
    );

    let handle = pool.acquire(0).await.expect("acquire");
    let name = handle.name().to_string();
    assert_eq!(driver.log.lock().len(), 2);

    pool.release(handle, true).await;

    let slots = pool.slots(0).expect("database 0");
    assert!(slots.available.snapshot().contains(&name));
    assert!(!slots.cached.snapshot().contains(&name));
    assert!(driver.connections.lock()[0].is_closed());

    // The next borrow takes the slow path and replays the setup SQL
    let again = pool.acquire(0).await.expect("re-acquire");
    assert_eq!(driver.open_count(), 2);
    assert_eq!(driver.log.lock().len(), 4);
    pool.release(again, false).await;
}

#[tokio::test]
async fn drop_releases_to_cache() {
    let driver = MockDriver::new();
    let pool = single_db_pool(2, &driver);

    {
        let _handle = pool.acquire(0).await.expect("acquire");
        assert_eq!(pool.stats(0).expect("stats").in_use(), 1);
    }

    let stats = pool.stats(0).expect("stats");
    assert_eq!(stats.in_use(), 0);
    assert_eq!(stats.cached(), 1);
}

#[tokio::test]
async fn cached_but_closed_recycles_and_reopens() {
    let driver = MockDriver::new();
    let pool = single_db_pool(2, &driver);

    let handle = pool.acquire(0).await.expect("acquire");
    // Kill the connection out from under the pool, then return it normally
    handle.close().await.expect("close");
    pool.release(handle, false).await;
    assert_eq!(pool.stats(0).expect("stats").cached(), 1);

    let fresh = pool.acquire(0).await.expect("acquire after dead cache");
    assert!(!fresh.is_closed());
    assert_eq!(driver.open_count(), 2);
    pool.release(fresh, false).await;
}

#[tokio::test]
async fn open_failure_returns_slot_to_available() {
    let driver = MockDriver::new();
    let pool = single_db_pool(2, &driver);

    driver.fail_opens.store(true, Ordering::SeqCst);
    let err = pool.acquire(0).await.expect_err("open refused");
    assert!(matches!(err, TidepoolError::OpenFailed(_)));
    assert_eq!(pool.stats(0).expect("stats").available(), 2);

    driver.fail_opens.store(false, Ordering::SeqCst);
    let handle = pool.acquire(0).await.expect("retry succeeds");
    pool.release(handle, false).await;
}

#[tokio::test]
async fn out_of_range_acquire_fails() {
    let driver = MockDriver::new();
    let pool = single_db_pool(2, &driver);

    assert!(matches!(
        pool.acquire(7).await,
        Err(TidepoolError::NoPooledConnection)
    ));
}

#[tokio::test]
async fn handle_exposes_slot_metadata() {
    let driver = MockDriver::new();
    let settings = HostSettings::default()
        .with_max_workers(1)
        .with_database(DatabaseSettings {
            driver_type: "mock".into(),
            database_name: "test.db".into(),
            enable_upsert: true,
            ..Default::default()
        });
    let pool = Pool::new(
        &settings,
        &registry_with(Arc::clone(&driver)),
        PoolConfig::default(),
    );

    let handle = pool.acquire(0).await.expect("acquire");
    assert_eq!(handle.database_id(), 0);
    assert!(handle.upsert_enabled());
    // Unknown driver names fall back to the generic extension
    assert!(!handle.extension().supports_upsert());
    pool.release(handle, false).await;
}

// =============================================================================
// Reaper
// =============================================================================

#[tokio::test]
async fn reaper_sweep_drains_idle_cache() {
    let driver = MockDriver::new();
    let pool = single_db_pool(4, &driver);

    let a = pool.acquire(0).await.expect("a");
    let b = pool.acquire(0).await.expect("b");
    let c = pool.acquire(0).await.expect("c");
    pool.release(a, false).await;
    pool.release(b, false).await;
    pool.release(c, false).await;
    assert_eq!(pool.stats(0).expect("stats").cached(), 3);

    pool.sweep_at(unix_now() + 31).await;

    let stats = pool.stats(0).expect("stats");
    assert_eq!(stats.cached(), 0);
    assert_eq!(stats.available(), 4);
    for conn in driver.connections.lock().iter() {
        assert!(conn.is_closed());
    }
}

#[tokio::test]
async fn sweep_within_grace_keeps_cache_warm() {
    let driver = MockDriver::new();
    let pool = single_db_pool(2, &driver);

    let handle = pool.acquire(0).await.expect("acquire");
    pool.release(handle, false).await;

    pool.sweep_at(unix_now() + 10).await;
    assert_eq!(pool.stats(0).expect("stats").cached(), 1);
}

// =============================================================================
// Concurrency invariants
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn name_conservation_under_concurrent_load() {
    let driver = MockDriver::new();
    let pool = single_db_pool(4, &driver);

    let mut workers = Vec::new();
    for worker in 0..8 {
        let pool = pool.clone();
        workers.push(tokio::spawn(async move {
            for round in 0..25 {
                let handle = pool.acquire(0).await.expect("acquire");
                handle.execute("SELECT 1").await.expect("execute");
                let force = (worker + round) % 5 == 0;
                pool.release(handle, force).await;
            }
        }));
    }
    for worker in workers {
        worker.await.expect("worker panicked");
    }

    let stats = pool.stats(0).expect("stats");
    assert_eq!(stats.in_use(), 0);
    assert_eq!(stats.available() + stats.cached(), 4);

    let slots = pool.slots(0).expect("database 0");
    let mut names = slots.available.snapshot();
    names.extend(slots.cached.snapshot());
    let unique: HashSet<&String> = names.iter().collect();
    assert_eq!(names.len(), 4);
    assert_eq!(unique.len(), 4);
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test]
async fn shutdown_drains_and_fails_acquires() {
    let driver = MockDriver::new();
    let pool = single_db_pool(2, &driver);

    let handle = pool.acquire(0).await.expect("acquire");
    pool.release(handle, false).await;

    pool.shutdown().await;

    assert!(driver.connections.lock()[0].is_closed());
    assert!(matches!(
        pool.acquire(0).await,
        Err(TidepoolError::NoPooledConnection)
    ));
}

#[tokio::test]
async fn release_after_shutdown_leaves_no_dangling_names() {
    let driver = MockDriver::new();
    let pool = single_db_pool(2, &driver);

    let held = pool.acquire(0).await.expect("acquire");
    let forced = pool.acquire(0).await.expect("acquire");
    pool.shutdown().await;

    // The registry is gone; late returns must not repopulate the stacks
    pool.release(held, false).await;
    pool.release(forced, true).await;
    let stats = pool.stats(0).expect("stats");
    assert_eq!(stats.available(), 0);
    assert_eq!(stats.cached(), 0);

    // A late sweep is a no-op as well
    pool.sweep_at(unix_now() + 100).await;
    assert_eq!(pool.stats(0).expect("stats").cached(), 0);
}

#[tokio::test]
async fn shutdown_wakes_blocked_acquirers() {
    let driver = MockDriver::new();
    let pool = single_db_pool(1, &driver);

    let held = pool.acquire(0).await.expect("acquire");

    let waiter_pool = pool.clone();
    let waiter = tokio::spawn(async move { waiter_pool.acquire(0).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    pool.shutdown().await;

    let result = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter completed")
        .expect("waiter task");
    assert!(matches!(result, Err(TidepoolError::NoPooledConnection)));

    drop(held);
}

// =============================================================================
// Setup applier
// =============================================================================

fn apply(settings: &DatabaseSettings, host: &HostSettings, driver: Arc<MockDriver>) -> crate::slot::Slot {
    apply_database_settings("rdb00_0".into(), 0, driver, settings, host).expect("applier")
}

#[test]
fn applier_resolves_relative_file_paths() {
    let host = HostSettings {
        web_root_path: "/srv/app".into(),
        ..Default::default()
    };
    let settings = DatabaseSettings {
        driver_type: "mock".into(),
        database_name: "data/test.db".into(),
        ..Default::default()
    };

    let slot = apply(&settings, &host, MockDriver::file_based());
    assert_eq!(slot.config().database, "/srv/app/data/test.db");

    // Absolute paths and special names pass through untouched
    let absolute = DatabaseSettings {
        database_name: "/var/db/test.db".into(),
        ..settings.clone()
    };
    let slot = apply(&absolute, &host, MockDriver::file_based());
    assert_eq!(slot.config().database, "/var/db/test.db");

    let memory = DatabaseSettings {
        database_name: ":memory:".into(),
        ..settings.clone()
    };
    let slot = apply(&memory, &host, MockDriver::file_based());
    assert_eq!(slot.config().database, ":memory:");

    // Server drivers never get path fix-ups
    let slot = apply(&settings, &host, MockDriver::new());
    assert_eq!(slot.config().database, "data/test.db");
}

#[test]
fn applier_parses_post_open_statements() {
    let settings = DatabaseSettings {
        driver_type: "mock".into(),
        database_name: "test.db".into(),
        post_open_statements: "  PRAGMA one ; ;PRAGMA two;  ".into(),
        ..Default::default()
    };
    let slot = apply(&settings, &HostSettings::default(), MockDriver::new());
    let statements: Vec<&str> = slot
        .post_open_statements()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(statements, ["PRAGMA one", "PRAGMA two"]);
}

#[test]
fn applier_skips_blank_fields() {
    let settings = DatabaseSettings {
        driver_type: "mock".into(),
        database_name: "test.db".into(),
        host_name: "  ".into(),
        port: 0,
        ..Default::default()
    };
    let slot = apply(&settings, &HostSettings::default(), MockDriver::new());
    assert!(slot.config().host.is_none());
    assert!(slot.config().port.is_none());
    assert!(slot.config().username.is_none());
    assert!(slot.post_open_statements().is_empty());
    assert!(!slot.upsert_enabled());
}

#[test]
fn applier_applies_populated_fields() {
    let settings = DatabaseSettings {
        driver_type: "mock".into(),
        database_name: "appdb".into(),
        host_name: "db.internal".into(),
        port: 5432,
        user_name: "app".into(),
        password: "secret".into(),
        connect_options: "SSLMODE=require; TIMEOUT=5; compress".into(),
        enable_upsert: true,
        ..Default::default()
    };
    let slot = apply(&settings, &HostSettings::default(), MockDriver::new());

    let config = slot.config();
    assert_eq!(config.host.as_deref(), Some("db.internal"));
    assert_eq!(config.port, Some(5432));
    assert_eq!(config.username.as_deref(), Some("app"));
    assert_eq!(config.password.as_deref(), Some("secret"));
    assert_eq!(config.option("SSLMODE"), Some("require"));
    assert_eq!(config.option("TIMEOUT"), Some("5"));
    assert_eq!(config.option("compress"), Some(""));
    assert!(slot.upsert_enabled());
}

#[test]
fn applier_rejects_empty_database_name() {
    let settings = DatabaseSettings {
        driver_type: "mock".into(),
        database_name: String::new(),
        ..Default::default()
    };
    let result = apply_database_settings(
        "rdb00_0".into(),
        0,
        MockDriver::new(),
        &settings,
        &HostSettings::default(),
    );
    assert!(matches!(result, Err(TidepoolError::Configuration(_))));
}

// =============================================================================
// Bootstrap
// =============================================================================

#[tokio::test]
async fn bootstrap_installs_exactly_once() {
    let driver = MockDriver::new();
    let settings = HostSettings::default()
        .with_max_workers(2)
        .with_database(mock_database());
    let drivers = registry_with(Arc::clone(&driver));

    let pool = crate::init(&settings, &drivers, PoolConfig::default());
    assert!(std::ptr::eq(pool, crate::instance()));

    // A second init does not rebuild the pool
    let again = crate::init(&settings, &drivers, PoolConfig::default());
    assert!(std::ptr::eq(pool, again));
    assert_eq!(crate::try_instance().map(|p| p.max_workers()), Some(2));
}
