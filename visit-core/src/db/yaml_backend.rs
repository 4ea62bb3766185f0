//! YAML file storage backend
//!
//! Stores every collection in a single YAML file, using [`Storage`] for
//! file locking.

use anyhow::Result;
use std::path::{Path, PathBuf};

use super::traits::{BackendType, DatabaseBackend, StoreUpdate};
use crate::models::VisitStore;
use crate::storage::Storage;

/// YAML file backend implementation
pub struct YamlBackend {
    storage: Storage,
    path: PathBuf,
}

impl YamlBackend {
    /// Creates a new YAML backend for the given file path
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            storage: Storage::new(&path),
            path,
        }
    }

    /// Gets a reference to the underlying Storage
    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

impl DatabaseBackend for YamlBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Yaml
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<VisitStore> {
        self.storage.load()
    }

    fn save(&self, store: &VisitStore) -> Result<()> {
        self.storage.save(store)
    }

    fn update_atomically(&self, update_fn: &mut StoreUpdate<'_>) -> Result<VisitStore> {
        self.storage.update_atomically(update_fn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::EntityStore;
    use crate::models::{ActionType, Company, CompanyType, Customer, Visit};
    use chrono::NaiveDate;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_yaml_backend_create_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.yaml");
        let backend = YamlBackend::new(&file_path);

        backend.create_if_not_exists().unwrap();

        let store = backend.load().unwrap();
        assert!(store.companies.is_empty());
        assert!(store.visits.is_empty());
    }

    #[test]
    fn test_yaml_backend_save_and_load() {
        let temp_file = NamedTempFile::new().unwrap();
        let backend = YamlBackend::new(temp_file.path());

        let mut store = VisitStore::new();
        let acme = Company::new("u1", "Acme".into(), CompanyType::Other("Tech".into()));
        let jane = Customer::new("u1", "Jane".into(), acme.id);
        let mut visit = Visit::new(
            "u1",
            acme.id,
            jane.id,
            ActionType::ProductDemo,
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
        );
        visit.notes = Some("Demo went well".into());
        store.companies.push(acme);
        store.customers.push(jane);
        store.visits.push(visit);

        backend.save(&store).unwrap();
        assert_eq!(backend.load().unwrap(), store);
    }

    #[test]
    fn test_entity_store_persists_between_instances() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("visits.yaml");

        let created = YamlBackend::new(&path)
            .create(Company::new("u1", "Acme".into(), CompanyType::Food))
            .unwrap();

        let reopened = YamlBackend::new(&path);
        let listed: Vec<Company> = reopened.list("u1").unwrap();
        assert_eq!(listed, vec![created]);
    }
}
