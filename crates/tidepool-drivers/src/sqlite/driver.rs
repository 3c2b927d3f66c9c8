//! SQLite driver implementation

use async_trait::async_trait;
use std::sync::Arc;
use tidepool_core::{Connection, ConnectionConfig, DatabaseDriver, Result, TidepoolError};

use super::SqliteConnection;

/// SQLite database driver
pub struct SqliteDriver;

impl SqliteDriver {
    /// Create a new SQLite driver instance
    pub fn new() -> Self {
        Self
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn display_name(&self) -> &'static str {
        "SQLite"
    }

    fn is_file_based(&self) -> bool {
        true
    }

    #[tracing::instrument(skip(self, config), fields(database = %config.database))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        if config.database.is_empty() {
            return Err(TidepoolError::Configuration(
                "SQLite requires a database path".into(),
            ));
        }

        let conn = SqliteConnection::open(&config.database).map_err(|e| {
            tracing::error!(error = %e, "sqlite open refused");
            e
        })?;

        tracing::debug!(path = %config.database, "sqlite handle ready");
        Ok(Arc::new(conn))
    }

    #[tracing::instrument(skip(self, config))]
    async fn test_connection(&self, config: &ConnectionConfig) -> Result<()> {
        let conn = self.connect(config).await?;
        conn.execute("SELECT 1").await?;
        conn.close().await
    }
}
