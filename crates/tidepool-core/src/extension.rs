//! Driver extension trait
//!
//! A driver extension is a small per-driver helper attached to each pool slot
//! at registration, carrying SQL the core cannot express portably. Today that
//! is upsert statement generation.

/// Driver-specific SQL helper attached to a pool slot.
pub trait SqlExtension: Send + Sync {
    /// The driver this extension belongs to
    fn driver_name(&self) -> &'static str;

    /// Whether the driver can express an atomic insert-or-update
    fn supports_upsert(&self) -> bool {
        false
    }

    /// Build an upsert statement.
    ///
    /// `insert_columns` are the columns of the inserted row, `conflict_columns`
    /// the key that triggers the update path, and `update_columns` the columns
    /// rewritten on conflict. Values are expected as positional placeholders.
    ///
    /// Returns `None` when the driver has no upsert form.
    fn upsert_statement(
        &self,
        _table: &str,
        _insert_columns: &[&str],
        _conflict_columns: &[&str],
        _update_columns: &[&str],
    ) -> Option<String> {
        None
    }
}

/// Fallback extension for drivers without specialized SQL support
pub struct GenericExtension;

impl SqlExtension for GenericExtension {
    fn driver_name(&self) -> &'static str {
        "generic"
    }
}
