//! Database driver trait definition

use crate::{Connection, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Core driver trait that all database drivers must implement
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Unique identifier for this driver (e.g., "sqlite", "postgres", "mysql")
    fn name(&self) -> &'static str;

    /// Human-readable name for diagnostics
    fn display_name(&self) -> &'static str {
        self.name()
    }

    /// Default connection port (None for file-based databases like SQLite)
    fn default_port(&self) -> Option<u16> {
        None
    }

    /// Whether the driver stores its database in a local file.
    ///
    /// File-based drivers get relative database paths resolved against the
    /// host's web root when a slot is registered.
    fn is_file_based(&self) -> bool {
        false
    }

    /// Open a new connection
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>>;

    /// Open and immediately close a connection to verify the configuration
    async fn test_connection(&self, config: &ConnectionConfig) -> Result<()> {
        let conn = self.connect(config).await?;
        conn.close().await
    }
}

/// Connection parameters applied to a pool slot at registration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Driver ID (e.g., "sqlite", "postgres")
    pub driver: String,
    /// Database name or file path
    pub database: String,
    /// Host address (unset for file-based databases)
    pub host: Option<String>,
    /// Port number
    pub port: Option<u16>,
    /// Username
    pub username: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Additional driver-specific connect options
    pub options: HashMap<String, String>,
}

impl ConnectionConfig {
    /// Create a new configuration for the given driver and database
    pub fn new(driver: &str, database: &str) -> Self {
        Self {
            driver: driver.to_string(),
            database: database.to_string(),
            ..Self::default()
        }
    }

    /// Set a driver-specific connect option
    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }

    /// Get a connect option by key
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}
