//! Resolution of configured driver types to driver implementations

use std::collections::BTreeMap;
use std::sync::Arc;
use tidepool_core::DatabaseDriver;

/// Maps the `DriverType` strings found in database configuration to the
/// implementations that can open connections for them.
///
/// Matching is case-insensitive, so a configuration may spell a driver
/// "SQLite" or "sqlite" interchangeably. Registering a second driver under
/// the same name replaces the first.
#[derive(Default)]
pub struct DriverRegistry {
    by_type: BTreeMap<String, Arc<dyn DatabaseDriver>>,
}

impl DriverRegistry {
    /// An empty registry. Drivers must be added with [`register`](Self::register).
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with every driver compiled into this crate.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "sqlite")]
        registry.register(Arc::new(crate::sqlite::SqliteDriver::new()));

        registry
    }

    /// Make `driver` resolvable under its own name.
    pub fn register(&mut self, driver: Arc<dyn DatabaseDriver>) {
        tracing::debug!(driver_type = driver.name(), "driver available for configuration");
        self.by_type.insert(driver.name().to_lowercase(), driver);
    }

    /// Resolve a configured `DriverType` value to its implementation.
    pub fn resolve(&self, driver_type: &str) -> Option<Arc<dyn DatabaseDriver>> {
        match self.by_type.get(&driver_type.to_lowercase()) {
            Some(driver) => Some(Arc::clone(driver)),
            None => {
                tracing::warn!(driver_type, "no driver registered for configured type");
                None
            }
        }
    }

    /// Whether a `DriverType` value would resolve
    pub fn supports(&self, driver_type: &str) -> bool {
        self.by_type.contains_key(&driver_type.to_lowercase())
    }

    /// Canonical names of every registered driver, sorted
    pub fn driver_types(&self) -> Vec<&str> {
        self.by_type.keys().map(String::as_str).collect()
    }
}
