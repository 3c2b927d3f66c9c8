//! Pool slots: named containers for at most one driver connection

use parking_lot::Mutex;
use std::sync::Arc;
use tidepool_core::{Connection, ConnectionConfig, DatabaseDriver, Result, SqlExtension};

/// Format the deterministic slot name for `database_id`, slot `index`.
pub(crate) fn slot_name(database_id: usize, index: usize) -> String {
    format!("rdb{:02}_{}", database_id, index)
}

/// Parse the database index out of a slot name.
///
/// The index lives at byte offsets 3..5 of the `rdb{dd}_{i}` grammar, so
/// returning a handle never needs a lookup table.
pub(crate) fn database_id_of(name: &str) -> Option<usize> {
    name.get(3..5)?.parse().ok()
}

/// A preregistered, named container for at most one driver connection.
///
/// Slots are created at pool init and destroyed only at teardown. The slot
/// registry owns them; the per-database stacks pass around only their names.
pub struct Slot {
    name: String,
    database_id: usize,
    driver: Arc<dyn DatabaseDriver>,
    config: ConnectionConfig,
    post_open_statements: Vec<String>,
    upsert_enabled: bool,
    extension: Arc<dyn SqlExtension>,
    handle: Mutex<Option<Arc<dyn Connection>>>,
}

impl Slot {
    pub(crate) fn new(
        name: String,
        database_id: usize,
        driver: Arc<dyn DatabaseDriver>,
        config: ConnectionConfig,
        post_open_statements: Vec<String>,
        upsert_enabled: bool,
        extension: Arc<dyn SqlExtension>,
    ) -> Self {
        Self {
            name,
            database_id,
            driver,
            config,
            post_open_statements,
            upsert_enabled,
            extension,
            handle: Mutex::new(None),
        }
    }

    /// The slot's connection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The database index this slot belongs to
    pub fn database_id(&self) -> usize {
        self.database_id
    }

    /// Connection parameters applied at registration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// SQL replayed after every open, in order
    pub fn post_open_statements(&self) -> &[String] {
        &self.post_open_statements
    }

    /// Whether upsert generation was enabled for this database
    pub fn upsert_enabled(&self) -> bool {
        self.upsert_enabled
    }

    /// The driver extension attached at registration
    pub fn extension(&self) -> &Arc<dyn SqlExtension> {
        &self.extension
    }

    /// Whether the slot currently holds an open handle
    pub fn is_open(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|conn| !conn.is_closed())
            .unwrap_or(false)
    }

    /// The slot's handle, if one exists (open or not)
    pub fn connection(&self) -> Option<Arc<dyn Connection>> {
        self.handle.lock().clone()
    }

    /// Open a new driver connection and install it as this slot's handle.
    pub(crate) async fn open(&self) -> Result<Arc<dyn Connection>> {
        let conn = self.driver.connect(&self.config).await?;
        *self.handle.lock() = Some(Arc::clone(&conn));
        Ok(conn)
    }

    /// Close and drop the slot's handle. Best effort; errors are logged only.
    pub(crate) async fn close(&self) {
        let conn = self.handle.lock().take();
        if let Some(conn) = conn {
            if let Err(e) = conn.close().await {
                tracing::debug!(slot = %self.name, error = %e, "error closing connection");
            }
        }
    }
}
