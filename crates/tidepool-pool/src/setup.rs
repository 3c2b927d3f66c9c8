//! Per-slot setup applied once at registration

use std::path::Path;
use std::sync::Arc;

use tidepool_core::{ConnectionConfig, DatabaseDriver, Result, TidepoolError};
use tidepool_drivers::extension_for;

use crate::settings::{DatabaseSettings, HostSettings};
use crate::slot::Slot;

/// Build a slot from the configuration of database `database_id`.
///
/// Empty or blank fields are left unset; `Port` is applied only when
/// positive. File-based drivers with a relative, `:`-free database name get
/// the host's web root prepended here, once, rather than at open time.
///
/// Fails only when the database name is empty; the caller skips the slot.
pub(crate) fn apply_database_settings(
    name: String,
    database_id: usize,
    driver: Arc<dyn DatabaseDriver>,
    settings: &DatabaseSettings,
    host: &HostSettings,
) -> Result<Slot> {
    let mut database_name = settings.database_name.trim().to_string();
    if database_name.is_empty() {
        tracing::error!(database_id, "database name is an empty string");
        return Err(TidepoolError::Configuration(
            "Database name empty string".into(),
        ));
    }

    if driver.is_file_based() && !database_name.contains(':') {
        let path = Path::new(&database_name);
        if path.is_relative() {
            database_name = host
                .web_root_path
                .join(path)
                .to_string_lossy()
                .into_owned();
        }
    }
    tracing::debug!(driver = driver.name(), database = %database_name, "applying database settings");

    let mut config = ConnectionConfig::new(driver.name(), &database_name);

    let host_name = settings.host_name.trim();
    if !host_name.is_empty() {
        config.host = Some(host_name.to_string());
    }

    if settings.port > 0 {
        config.port = Some(settings.port);
    }

    let user_name = settings.user_name.trim();
    if !user_name.is_empty() {
        config.username = Some(user_name.to_string());
    }

    let password = settings.password.trim();
    if !password.is_empty() {
        config.password = Some(password.to_string());
    }

    for fragment in settings.connect_options.split(';') {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            continue;
        }
        match fragment.split_once('=') {
            Some((key, value)) => config
                .options
                .insert(key.trim().to_string(), value.trim().to_string()),
            None => config.options.insert(fragment.to_string(), String::new()),
        };
    }

    let post_open_statements: Vec<String> = settings
        .post_open_statements
        .split(';')
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_string)
        .collect();

    let extension = extension_for(driver.name());

    Ok(Slot::new(
        name,
        database_id,
        driver,
        config,
        post_open_statements,
        settings.enable_upsert,
        extension,
    ))
}
