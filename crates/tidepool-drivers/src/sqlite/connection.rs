//! SQLite connection implementation

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tidepool_core::{Connection, Result, TidepoolError};

/// How long a statement waits on a locked database file before failing.
/// Several pool workers may share one file, so an immediate SQLITE_BUSY
/// would surface as spurious query errors under load.
const BUSY_WAIT: Duration = Duration::from_secs(5);

/// A single SQLite database handle.
///
/// rusqlite connections are not `Sync`, so the handle lives behind a mutex;
/// a pool slot hands its connection to one worker at a time, which keeps
/// that lock uncontended in practice. Closing sets a flag rather than
/// dropping the handle, because the pool asks slots whether they are open
/// long after a close.
pub struct SqliteConnection {
    inner: Arc<Mutex<rusqlite::Connection>>,
    closed: AtomicBool,
}

impl SqliteConnection {
    /// Open the database at `path`, creating the file if needed.
    ///
    /// `:memory:` opens a private in-memory database. Only referential
    /// integrity and lock waiting are configured here; session tuning
    /// belongs in the pool's post-open statements, which replay on every
    /// reopen of a slot.
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path, "opening SQLite database");

        let conn = if path == ":memory:" {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(path)
        }
        .map_err(|e| TidepoolError::Connection(format!("sqlite open '{path}': {e}")))?;

        conn.busy_timeout(BUSY_WAIT)
            .map_err(|e| TidepoolError::Connection(format!("sqlite busy timeout: {e}")))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| TidepoolError::Connection(format!("sqlite foreign_keys pragma: {e}")))?;

        Ok(Self {
            inner: Arc::new(Mutex::new(conn)),
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str) -> Result<u64> {
        if self.is_closed() {
            return Err(TidepoolError::Connection("connection is closed".into()));
        }
        let conn = self.inner.lock();
        // sqlite3_exec via execute_batch: unlike prepared execution it
        // tolerates statements that return rows, which setup SQL (PRAGMA
        // and friends) routinely does.
        conn.execute_batch(sql)
            .map_err(|e| TidepoolError::Query(format!("sqlite execute: {e}")))?;
        let affected = conn.changes();
        tracing::debug!(affected_rows = affected, "statement executed");
        Ok(affected)
    }

    async fn close(&self) -> Result<()> {
        tracing::debug!("closing SQLite connection");
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
