//! Connection trait

use crate::Result;
use async_trait::async_trait;

/// An open database connection held by a pool slot.
///
/// This is the contract the pool needs from a driver handle: run setup SQL,
/// close, and report whether the handle is still usable. The full query and
/// result API lives with the driver, above this trait.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite", "postgres")
    fn driver_name(&self) -> &str;

    /// Execute a statement, returning the number of affected rows.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}
