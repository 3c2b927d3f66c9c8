//! Host and per-database configuration consumed at pool initialization

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for one configured database, read once when its slots are
/// registered.
///
/// Field names follow the host's configuration keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct DatabaseSettings {
    /// Driver name. An empty value disables the database entirely.
    pub driver_type: String,
    /// Database name, or file path for file-based engines
    pub database_name: String,
    pub host_name: String,
    pub port: u16,
    pub user_name: String,
    pub password: String,
    /// Driver-specific connect options, `;`-separated `KEY=VALUE` pairs
    pub connect_options: String,
    /// SQL run after every open, `;`-separated
    pub post_open_statements: String,
    pub enable_upsert: bool,
}

impl DatabaseSettings {
    /// Whether this database has a driver configured at all
    pub fn is_enabled(&self) -> bool {
        !self.driver_type.trim().is_empty()
    }
}

/// Host application settings the pool consumes at bootstrap
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostSettings {
    /// Whether the SQL subsystem is available at all
    pub sql_database_available: bool,
    /// Per-database settings, indexed by database id
    pub databases: Vec<DatabaseSettings>,
    /// Worker threads per application server; sizes every slot array
    pub max_workers_per_server: usize,
    /// Environment label, diagnostics only
    pub database_environment: String,
    /// Web root, prepended to relative file-database paths at registration
    pub web_root_path: PathBuf,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            sql_database_available: true,
            databases: Vec::new(),
            max_workers_per_server: 1,
            database_environment: String::new(),
            web_root_path: PathBuf::new(),
        }
    }
}

impl HostSettings {
    /// Number of configured databases
    pub fn database_count(&self) -> usize {
        self.databases.len()
    }

    /// Append a database configuration
    pub fn with_database(mut self, database: DatabaseSettings) -> Self {
        self.databases.push(database);
        self
    }

    /// Set the worker count
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers_per_server = max_workers;
        self
    }
}
