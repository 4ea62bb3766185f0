//! Migration utilities for converting between storage backends
//!
//! Copies a whole store between YAML and SQLite, and to or from JSON for
//! backup and restore.

use anyhow::{Context, Result};
use std::path::Path;

use super::traits::DatabaseBackend;
use super::{SqliteBackend, YamlBackend};
use crate::models::{VisitStore, SCHEMA_VERSION};

/// Number of records of every kind held by `store`
pub fn record_count(store: &VisitStore) -> usize {
    store.companies.len()
        + store.customers.len()
        + store.visits.len()
        + store.requirements.len()
        + store.equipment_types.len()
}

/// Copies everything from `source` into `target`, replacing its contents.
///
/// Returns the number of records copied.
pub fn copy_store(source: &dyn DatabaseBackend, target: &dyn DatabaseBackend) -> Result<usize> {
    let store = source
        .load()
        .with_context(|| format!("Failed to load {} database", source.backend_type()))?;

    target
        .save(&store)
        .with_context(|| format!("Failed to save to {} database", target.backend_type()))?;

    let count = record_count(&store);
    log::info!(
        "Copied {} records from {} to {}",
        count,
        source.path().display(),
        target.path().display()
    );
    Ok(count)
}

/// Migrates data from a YAML file to a SQLite database
pub fn migrate_yaml_to_sqlite<P1: AsRef<Path>, P2: AsRef<Path>>(
    yaml_path: P1,
    sqlite_path: P2,
) -> Result<usize> {
    let yaml_backend = YamlBackend::new(yaml_path);
    let sqlite_backend = SqliteBackend::new(sqlite_path)?;
    copy_store(&yaml_backend, &sqlite_backend)
}

/// Migrates data from a SQLite database to a YAML file
pub fn migrate_sqlite_to_yaml<P1: AsRef<Path>, P2: AsRef<Path>>(
    sqlite_path: P1,
    yaml_path: P2,
) -> Result<usize> {
    let sqlite_backend = SqliteBackend::new(sqlite_path)?;
    let yaml_backend = YamlBackend::new(yaml_path);
    copy_store(&sqlite_backend, &yaml_backend)
}

/// Exports a store to a pretty-printed JSON file
pub fn export_to_json<P: AsRef<Path>>(store: &VisitStore, json_path: P) -> Result<()> {
    let json = serde_json::to_string_pretty(store).context("Failed to serialize to JSON")?;

    std::fs::write(json_path.as_ref(), json)
        .with_context(|| format!("Failed to write JSON file {:?}", json_path.as_ref()))?;

    Ok(())
}

/// Imports a store from a JSON file
pub fn import_from_json<P: AsRef<Path>>(json_path: P) -> Result<VisitStore> {
    let json = std::fs::read_to_string(json_path.as_ref())
        .with_context(|| format!("Failed to read JSON file {:?}", json_path.as_ref()))?;

    let store: VisitStore = serde_json::from_str(&json).context("Failed to parse JSON")?;

    if store.schema_version > SCHEMA_VERSION {
        anyhow::bail!(
            "JSON backup uses schema {}, this build supports up to {}",
            store.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(store)
}

/// Exports data from any backend to a JSON file
pub fn export_backend_to_json<P: AsRef<Path>>(
    backend: &dyn DatabaseBackend,
    json_path: P,
) -> Result<()> {
    let store = backend.load()?;
    export_to_json(&store, json_path)
}

/// Replaces a backend's contents with a JSON backup
pub fn import_json_to_backend<P: AsRef<Path>>(
    json_path: P,
    backend: &dyn DatabaseBackend,
) -> Result<usize> {
    let store = import_from_json(json_path)?;
    backend.save(&store)?;
    Ok(record_count(&store))
}
