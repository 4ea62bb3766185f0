use anyhow::{Context, Result};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::models::{VisitStore, SCHEMA_VERSION};

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_RETRY: Duration = Duration::from_millis(100);

/// Handles saving and loading the store from a YAML file, guarded by an
/// advisory lock file so two processes never interleave writes
pub struct Storage {
    file_path: PathBuf,
    lock_file_path: PathBuf,
}

impl Storage {
    /// Creates a new Storage instance
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        let mut lock_name = OsString::from(file_path.as_os_str());
        lock_name.push(".lock");
        Self {
            file_path,
            lock_file_path: PathBuf::from(lock_name),
        }
    }

    /// Returns the path to the storage file
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Retries `try_lock` until it succeeds or the timeout passes
    fn wait_for_lock(&self, lock_file: &File, try_lock: fn(&File) -> std::io::Result<()>) -> Result<()> {
        let start = Instant::now();
        loop {
            match try_lock(lock_file) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() > LOCK_TIMEOUT {
                        anyhow::bail!(
                            "Timeout waiting for file lock - another process may be writing: {:?}",
                            self.file_path
                        );
                    }
                    std::thread::sleep(LOCK_RETRY);
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to acquire lock on {:?}", self.lock_file_path)
                    })
                }
            }
        }
    }

    /// Acquire an exclusive lock for writing.
    /// The returned handle must be held for the duration of the write.
    fn acquire_write_lock(&self) -> Result<File> {
        if let Some(parent) = self.lock_file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.lock_file_path)
            .with_context(|| format!("Failed to create lock file: {:?}", self.lock_file_path))?;

        self.wait_for_lock(&lock_file, <File as FileExt>::try_lock_exclusive)?;

        let _ = writeln!(
            lock_file,
            "Locked by PID {} at {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );
        Ok(lock_file)
    }

    /// Acquire a shared lock for reading; `None` when no writer ever ran
    fn acquire_read_lock(&self) -> Result<Option<File>> {
        if !self.lock_file_path.exists() {
            return Ok(None);
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .open(&self.lock_file_path)
            .with_context(|| format!("Failed to open lock file: {:?}", self.lock_file_path))?;

        self.wait_for_lock(&lock_file, <File as FileExt>::try_lock_shared)?;
        Ok(Some(lock_file))
    }

    fn read_store(&self) -> Result<VisitStore> {
        let file = File::open(&self.file_path)
            .with_context(|| format!("Failed to open file: {:?}", self.file_path))?;
        if file.metadata()?.len() == 0 {
            return Ok(VisitStore::new());
        }
        let reader = BufReader::new(file);

        let store: VisitStore = serde_yaml::from_reader(reader)
            .with_context(|| format!("Failed to parse YAML from {:?}", self.file_path))?;

        if store.schema_version > SCHEMA_VERSION {
            anyhow::bail!(
                "{:?} was written by a newer version (schema {}, supported {})",
                self.file_path,
                store.schema_version,
                SCHEMA_VERSION
            );
        }
        Ok(store)
    }

    fn write_store(&self, store: &VisitStore) -> Result<()> {
        let yaml = serde_yaml::to_string(store)?;
        fs::write(&self.file_path, yaml)
            .with_context(|| format!("Failed to write {:?}", self.file_path))?;
        Ok(())
    }

    /// Loads the store, creating an empty file on first use
    pub fn load(&self) -> Result<VisitStore> {
        if !self.file_path.exists() {
            let store = VisitStore::new();
            self.save(&store)?;
            return Ok(store);
        }

        let _lock = self.acquire_read_lock()?;
        let store = self.read_store()?;
        log::debug!(
            "Loaded {} companies, {} visits from {}",
            store.companies.len(),
            store.visits.len(),
            self.file_path.display()
        );
        Ok(store)
    }

    /// Saves the store with an exclusive lock held
    pub fn save(&self, store: &VisitStore) -> Result<()> {
        let _lock = self.acquire_write_lock()?;
        self.write_store(store)?;
        log::debug!("Saved store to {}", self.file_path.display());
        Ok(())
    }

    /// Reloads the file, applies changes and saves, all under one
    /// exclusive lock. The file is left untouched when `update_fn` fails.
    pub fn update_atomically(
        &self,
        update_fn: &mut dyn FnMut(&mut VisitStore) -> Result<()>,
    ) -> Result<VisitStore> {
        let _lock = self.acquire_write_lock()?;

        let mut store = if self.file_path.exists() {
            self.read_store()?
        } else {
            VisitStore::new()
        };

        update_fn(&mut store)?;
        self.write_store(&store)?;
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Company, CompanyType};
    use tempfile::tempdir;

    #[test]
    fn test_load_creates_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("visits.yaml");
        let storage = Storage::new(&path);

        let store = storage.load().unwrap();
        assert!(store.companies.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn test_lock_file_sits_next_to_data() {
        let storage = Storage::new("/tmp/data/visits.yaml");
        assert_eq!(storage.lock_file_path, PathBuf::from("/tmp/data/visits.yaml.lock"));
    }

    #[test]
    fn test_update_atomically_failure_keeps_file() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("visits.yaml"));
        let mut store = VisitStore::new();
        store
            .companies
            .push(Company::new("u1", "Acme".into(), CompanyType::Food));
        storage.save(&store).unwrap();

        let result = storage.update_atomically(&mut |s| {
            s.companies.clear();
            anyhow::bail!("rejected")
        });
        assert!(result.is_err());
        assert_eq!(storage.load().unwrap().companies.len(), 1);
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("visits.yaml");
        fs::write(&path, format!("schema_version: {}\n", SCHEMA_VERSION + 1)).unwrap();

        let err = Storage::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("newer version"));
    }

    #[test]
    fn test_missing_collections_default_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("visits.yaml");
        fs::write(&path, "companies: []\n").unwrap();

        let store = Storage::new(&path).load().unwrap();
        assert_eq!(store.schema_version, SCHEMA_VERSION);
        assert!(store.visits.is_empty());
    }
}
