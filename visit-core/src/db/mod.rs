//! Database abstraction layer for visit tracking
//!
//! This module provides a trait-based abstraction for storage backends,
//! allowing the system to use a YAML file or a SQLite database behind the
//! same owner-scoped CRUD interface.

mod migration;
mod sqlite_backend;
mod traits;
mod yaml_backend;

pub use migration::{
    copy_store, export_backend_to_json, export_to_json, import_from_json, import_json_to_backend,
    migrate_sqlite_to_yaml, migrate_yaml_to_sqlite, record_count,
};
pub use sqlite_backend::SqliteBackend;
pub use traits::{
    BackendType, DatabaseBackend, DatabaseStats, EntityStore, StoreError, StoreUpdate,
};
pub use yaml_backend::YamlBackend;

use anyhow::Result;
use std::path::Path;

/// Creates a database backend based on the file extension or explicit type
pub fn create_backend(
    path: &Path,
    backend_type: Option<BackendType>,
) -> Result<Box<dyn DatabaseBackend>> {
    let bt = backend_type.unwrap_or_else(|| BackendType::from_path(path));

    match bt {
        BackendType::Yaml => Ok(Box::new(YamlBackend::new(path))),
        BackendType::Sqlite => Ok(Box::new(SqliteBackend::new(path)?)),
    }
}

/// Opens an existing database or creates an empty one
pub fn open_or_create(
    path: &Path,
    backend_type: Option<BackendType>,
) -> Result<Box<dyn DatabaseBackend>> {
    let backend = create_backend(path, backend_type)?;
    backend.create_if_not_exists()?;
    log::debug!("Using {} database at {}", backend.backend_type(), path.display());
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Company, CompanyType};
    use tempfile::tempdir;

    #[test]
    fn test_backend_inferred_from_extension() {
        let dir = tempdir().unwrap();
        let yaml = open_or_create(&dir.path().join("v.yaml"), None).unwrap();
        let sqlite = open_or_create(&dir.path().join("v.db"), None).unwrap();
        assert_eq!(yaml.backend_type(), BackendType::Yaml);
        assert_eq!(sqlite.backend_type(), BackendType::Sqlite);
        assert!(dir.path().join("v.yaml").exists());
    }

    #[test]
    fn test_explicit_type_wins() {
        let dir = tempdir().unwrap();
        let backend = create_backend(&dir.path().join("store.data"), Some(BackendType::Sqlite)).unwrap();
        assert_eq!(backend.backend_type(), BackendType::Sqlite);
    }

    #[test]
    fn test_boxed_backend_supports_entity_store() {
        let dir = tempdir().unwrap();
        let backend = open_or_create(&dir.path().join("v.yaml"), None).unwrap();
        backend
            .create(Company::new("u1", "Acme".into(), CompanyType::Research))
            .unwrap();
        assert_eq!(backend.list::<Company>("u1").unwrap().len(), 1);
    }
}
