//! Driver extension factory and built-in extensions
//!
//! Extensions are keyed on driver name. Drivers without a specialized
//! implementation get [`GenericExtension`], which supports nothing.

use std::sync::Arc;
use tidepool_core::{GenericExtension, SqlExtension};

/// Create the extension object for a driver name.
pub fn extension_for(driver_name: &str) -> Arc<dyn SqlExtension> {
    match driver_name.to_lowercase().as_str() {
        "sqlite" => Arc::new(SqliteExtension),
        "postgres" | "postgresql" => Arc::new(PostgresExtension),
        "mysql" | "mariadb" => Arc::new(MysqlExtension),
        _ => Arc::new(GenericExtension),
    }
}

fn column_list(columns: &[&str]) -> String {
    columns.join(", ")
}

fn placeholders(count: usize) -> String {
    std::iter::repeat("?")
        .take(count)
        .collect::<Vec<_>>()
        .join(", ")
}

/// SQLite extension, ON CONFLICT upsert form
pub struct SqliteExtension;

impl SqlExtension for SqliteExtension {
    fn driver_name(&self) -> &'static str {
        "sqlite"
    }

    fn supports_upsert(&self) -> bool {
        true
    }

    fn upsert_statement(
        &self,
        table: &str,
        insert_columns: &[&str],
        conflict_columns: &[&str],
        update_columns: &[&str],
    ) -> Option<String> {
        if insert_columns.is_empty() || conflict_columns.is_empty() {
            return None;
        }
        let assignments = update_columns
            .iter()
            .map(|col| format!("{col} = excluded.{col}"))
            .collect::<Vec<_>>()
            .join(", ");
        let action = if assignments.is_empty() {
            "NOTHING".to_string()
        } else {
            format!("UPDATE SET {assignments}")
        };
        Some(format!(
            "INSERT INTO {table} ({}) VALUES ({}) ON CONFLICT ({}) DO {action}",
            column_list(insert_columns),
            placeholders(insert_columns.len()),
            column_list(conflict_columns),
        ))
    }
}

/// PostgreSQL extension, ON CONFLICT upsert form
pub struct PostgresExtension;

impl SqlExtension for PostgresExtension {
    fn driver_name(&self) -> &'static str {
        "postgres"
    }

    fn supports_upsert(&self) -> bool {
        true
    }

    fn upsert_statement(
        &self,
        table: &str,
        insert_columns: &[&str],
        conflict_columns: &[&str],
        update_columns: &[&str],
    ) -> Option<String> {
        if insert_columns.is_empty() || conflict_columns.is_empty() {
            return None;
        }
        let values = (1..=insert_columns.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let assignments = update_columns
            .iter()
            .map(|col| format!("{col} = excluded.{col}"))
            .collect::<Vec<_>>()
            .join(", ");
        let action = if assignments.is_empty() {
            "NOTHING".to_string()
        } else {
            format!("UPDATE SET {assignments}")
        };
        Some(format!(
            "INSERT INTO {table} ({}) VALUES ({values}) ON CONFLICT ({}) DO {action}",
            column_list(insert_columns),
            column_list(conflict_columns),
        ))
    }
}

/// MySQL extension, ON DUPLICATE KEY upsert form
pub struct MysqlExtension;

impl SqlExtension for MysqlExtension {
    fn driver_name(&self) -> &'static str {
        "mysql"
    }

    fn supports_upsert(&self) -> bool {
        true
    }

    fn upsert_statement(
        &self,
        table: &str,
        insert_columns: &[&str],
        _conflict_columns: &[&str],
        update_columns: &[&str],
    ) -> Option<String> {
        if insert_columns.is_empty() || update_columns.is_empty() {
            return None;
        }
        let assignments = update_columns
            .iter()
            .map(|col| format!("{col} = VALUES({col})"))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!(
            "INSERT INTO {table} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {assignments}",
            column_list(insert_columns),
            placeholders(insert_columns.len()),
        ))
    }
}
