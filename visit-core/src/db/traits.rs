//! Database abstraction traits
//!
//! `DatabaseBackend` is the object-safe core every storage backend
//! implements. `EntityStore` layers owner-scoped CRUD for each entity kind
//! on top of it and is implemented for every backend, boxed or not.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Entity, VisitStore};

/// Types of database backends available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// YAML file storage (single file)
    #[default]
    Yaml,
    /// SQLite database storage
    Sqlite,
}

impl BackendType {
    /// Infers the backend from a file extension, defaulting to YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("db") | Some("sqlite") | Some("sqlite3") => BackendType::Sqlite,
            _ => BackendType::Yaml,
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Yaml => write!(f, "YAML"),
            BackendType::Sqlite => write!(f, "SQLite"),
        }
    }
}

impl FromStr for BackendType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "yaml" | "yml" => Ok(BackendType::Yaml),
            "sqlite" | "sqlite3" | "db" => Ok(BackendType::Sqlite),
            other => anyhow::bail!("Unknown backend type '{}' (expected yaml or sqlite)", other),
        }
    }
}

/// Typed failures raised by the CRUD layer
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },
    #[error("{0}")]
    Conflict(String),
}

/// Mutation applied to the whole store under the backend's write lock
pub type StoreUpdate<'a> = dyn FnMut(&mut VisitStore) -> Result<()> + 'a;

/// Core trait for database backends
///
/// `load()` and `save()` work with the full `VisitStore`. Mutations go
/// through `update_atomically()` so a backend can hold its write lock (or
/// transaction) across the read-modify-write cycle.
pub trait DatabaseBackend: Send + Sync {
    /// Returns the backend type
    fn backend_type(&self) -> BackendType;

    /// Returns the path to the database file
    fn path(&self) -> &Path;

    /// Loads the entire store from the database
    fn load(&self) -> Result<VisitStore>;

    /// Saves the entire store to the database
    fn save(&self, store: &VisitStore) -> Result<()>;

    /// Applies `update_fn` to the latest stored state and saves the result.
    /// Nothing is written when `update_fn` fails.
    fn update_atomically(&self, update_fn: &mut StoreUpdate<'_>) -> Result<VisitStore> {
        let mut store = self.load()?;
        update_fn(&mut store)?;
        self.save(&store)?;
        Ok(store)
    }

    /// Returns true if the database file exists
    fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Creates the database with empty data if it doesn't exist
    fn create_if_not_exists(&self) -> Result<()> {
        if !self.exists() {
            self.save(&VisitStore::new())?;
        }
        Ok(())
    }

    /// Returns statistics about the database
    fn stats(&self) -> Result<DatabaseStats> {
        Ok(DatabaseStats::of(&self.load()?, self.backend_type()))
    }
}

/// Statistics about a database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    pub company_count: usize,
    pub customer_count: usize,
    pub visit_count: usize,
    pub requirement_count: usize,
    pub equipment_type_count: usize,
    pub backend_type: BackendType,
}

impl DatabaseStats {
    /// Counts the records in `store`
    pub fn of(store: &VisitStore, backend_type: BackendType) -> Self {
        Self {
            company_count: store.companies.len(),
            customer_count: store.customers.len(),
            visit_count: store.visits.len(),
            requirement_count: store.requirements.len(),
            equipment_type_count: store.equipment_types.len(),
            backend_type,
        }
    }

    pub fn total(&self) -> usize {
        self.company_count
            + self.customer_count
            + self.visit_count
            + self.requirement_count
            + self.equipment_type_count
    }
}

/// Owner-scoped CRUD for every [`Entity`] kind
///
/// A record owned by someone else is reported exactly like a missing one.
pub trait EntityStore {
    /// All records of kind `E` owned by `owner`, in stored order
    fn list<E: Entity>(&self, owner: &str) -> Result<Vec<E>>;

    fn get<E: Entity>(&self, owner: &str, id: &Uuid) -> Result<Option<E>>;

    /// Inserts a new record and returns it as stored
    fn create<E: Entity>(&self, record: E) -> Result<E>;

    /// Applies `patch` to the record and returns the updated record
    fn update<E: Entity>(&self, owner: &str, id: &Uuid, patch: &E::Patch) -> Result<E>;

    fn delete<E: Entity>(&self, owner: &str, id: &Uuid) -> Result<()>;
}

fn position_of<E: Entity>(records: &[E], owner: &str, id: &Uuid) -> Result<usize> {
    records
        .iter()
        .position(|r| r.id() == *id && r.owner_id() == owner)
        .ok_or_else(|| StoreError::NotFound { kind: E::KIND, id: *id }.into())
}

impl<B: DatabaseBackend + ?Sized> EntityStore for B {
    fn list<E: Entity>(&self, owner: &str) -> Result<Vec<E>> {
        let store = self.load()?;
        Ok(E::collection(&store)
            .iter()
            .filter(|r| r.owner_id() == owner)
            .cloned()
            .collect())
    }

    fn get<E: Entity>(&self, owner: &str, id: &Uuid) -> Result<Option<E>> {
        let store = self.load()?;
        Ok(E::collection(&store)
            .iter()
            .find(|r| r.id() == *id && r.owner_id() == owner)
            .cloned())
    }

    fn create<E: Entity>(&self, record: E) -> Result<E> {
        self.update_atomically(&mut |store| {
            let records = E::collection_mut(store);
            if records.iter().any(|r| r.id() == record.id()) {
                return Err(StoreError::Conflict(format!(
                    "{} already exists: {}",
                    E::KIND,
                    record.id()
                ))
                .into());
            }
            record.check_insert(records).map_err(StoreError::Conflict)?;
            records.push(record.clone());
            Ok(())
        })?;
        log::debug!("Created {} {}", E::KIND, record.id());
        Ok(record)
    }

    fn update<E: Entity>(&self, owner: &str, id: &Uuid, patch: &E::Patch) -> Result<E> {
        let mut updated = None;
        self.update_atomically(&mut |store| {
            let records = E::collection_mut(store);
            let pos = position_of(records, owner, id)?;
            records[pos].apply_patch(patch);
            updated = Some(records[pos].clone());
            Ok(())
        })?;
        updated.ok_or_else(|| StoreError::NotFound { kind: E::KIND, id: *id }.into())
    }

    fn delete<E: Entity>(&self, owner: &str, id: &Uuid) -> Result<()> {
        self.update_atomically(&mut |store| {
            let records = E::collection_mut(store);
            let pos = position_of(records, owner, id)?;
            records.remove(pos);
            Ok(())
        })?;
        log::debug!("Deleted {} {}", E::KIND, id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Company, CompanyPatch, CompanyType, EquipmentType};
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// In-memory backend exercising the default trait methods
    struct MemoryBackend {
        path: PathBuf,
        store: Mutex<VisitStore>,
    }

    impl MemoryBackend {
        fn new() -> Self {
            Self {
                path: PathBuf::from("memory.yaml"),
                store: Mutex::new(VisitStore::new()),
            }
        }
    }

    impl DatabaseBackend for MemoryBackend {
        fn backend_type(&self) -> BackendType {
            BackendType::Yaml
        }

        fn path(&self) -> &Path {
            &self.path
        }

        fn load(&self) -> Result<VisitStore> {
            Ok(self.store.lock().unwrap().clone())
        }

        fn save(&self, store: &VisitStore) -> Result<()> {
            *self.store.lock().unwrap() = store.clone();
            Ok(())
        }
    }

    #[test]
    fn test_backend_type_from_path() {
        assert_eq!(BackendType::from_path(Path::new("a.db")), BackendType::Sqlite);
        assert_eq!(BackendType::from_path(Path::new("a.sqlite3")), BackendType::Sqlite);
        assert_eq!(BackendType::from_path(Path::new("a.yml")), BackendType::Yaml);
        assert_eq!(BackendType::from_path(Path::new("a")), BackendType::Yaml);
        assert_eq!("SQLite".parse::<BackendType>().unwrap(), BackendType::Sqlite);
        assert!("mongo".parse::<BackendType>().is_err());
    }

    #[test]
    fn test_crud_round() {
        let backend = MemoryBackend::new();
        let company = backend
            .create(Company::new("u1", "Acme".into(), CompanyType::Food))
            .unwrap();

        let listed: Vec<Company> = backend.list("u1").unwrap();
        assert_eq!(listed, vec![company.clone()]);

        let patch = CompanyPatch {
            name: Some("Acme Foods".into()),
            ..Default::default()
        };
        let updated: Company = backend.update("u1", &company.id, &patch).unwrap();
        assert_eq!(updated.name, "Acme Foods");
        assert_eq!(backend.load().unwrap().companies[0].name, "Acme Foods");

        backend.delete::<Company>("u1", &company.id).unwrap();
        assert!(backend.list::<Company>("u1").unwrap().is_empty());
    }

    #[test]
    fn test_other_owner_is_not_found() {
        let backend = MemoryBackend::new();
        let company = backend
            .create(Company::new("u1", "Acme".into(), CompanyType::Food))
            .unwrap();

        assert!(backend.list::<Company>("u2").unwrap().is_empty());
        assert!(backend.get::<Company>("u2", &company.id).unwrap().is_none());

        let err = backend.delete::<Company>("u2", &company.id).unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::NotFound { kind: "Company", id: company.id })
        );

        let patch = CompanyPatch {
            name: Some("Hijacked".into()),
            ..Default::default()
        };
        assert!(backend.update::<Company>("u2", &company.id, &patch).is_err());
        assert_eq!(backend.load().unwrap().companies[0].name, "Acme");
    }

    #[test]
    fn test_failed_update_writes_nothing() {
        let backend = MemoryBackend::new();
        backend
            .create(EquipmentType::new("u1", "Mixer".into()))
            .unwrap();

        let err = backend
            .create(EquipmentType::new("u1", "MIXER".into()))
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<StoreError>(), Some(StoreError::Conflict(_))));
        assert_eq!(backend.load().unwrap().equipment_types.len(), 1);
    }

    #[test]
    fn test_stats() {
        let backend = MemoryBackend::new();
        backend
            .create(Company::new("u1", "Acme".into(), CompanyType::Food))
            .unwrap();
        let stats = backend.stats().unwrap();
        assert_eq!(stats.company_count, 1);
        assert_eq!(stats.total(), 1);
    }
}
