//! File Store Adapters
//!
//! Implements `FileStore` on a local directory and in memory.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::domain::StorageLocation;
use crate::ports::outbound::{FileStore, ReadSeek, StoreError};

/// One file per location inside a host-owned directory.
pub struct DiskFileStore {
    dir: PathBuf,
}

impl DiskFileStore {
    /// Use `dir`, creating it if missing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::Io {
            location: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, location: &StorageLocation) -> PathBuf {
        self.dir.join(location.as_str())
    }
}

impl FileStore for DiskFileStore {
    fn create(&self, location: &StorageLocation) -> Result<Box<dyn Write + Send>, StoreError> {
        let file = File::create(self.path(location)).map_err(|e| StoreError::io(location, e))?;
        Ok(Box::new(file))
    }

    fn open(&self, location: &StorageLocation) -> Result<Box<dyn ReadSeek>, StoreError> {
        let file = File::open(self.path(location)).map_err(|e| StoreError::io(location, e))?;
        Ok(Box::new(file))
    }

    fn remove(&self, location: &StorageLocation) -> Result<(), StoreError> {
        debug!("[host] removing stored file {}", location);
        fs::remove_file(self.path(location)).map_err(|e| StoreError::io(location, e))
    }
}

/// In-memory adapter for testing and development.
#[derive(Default, Clone)]
pub struct InMemoryFileStore {
    files: Arc<RwLock<HashMap<StorageLocation, Vec<u8>>>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents stored at `location`.
    pub fn contents(&self, location: &StorageLocation) -> Option<Vec<u8>> {
        self.files.read().get(location).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

struct MemoryWriter {
    location: StorageLocation,
    files: Arc<RwLock<HashMap<StorageLocation, Vec<u8>>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.files
            .write()
            .entry(self.location.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl FileStore for InMemoryFileStore {
    fn create(&self, location: &StorageLocation) -> Result<Box<dyn Write + Send>, StoreError> {
        self.files.write().insert(location.clone(), Vec::new());
        Ok(Box::new(MemoryWriter {
            location: location.clone(),
            files: Arc::clone(&self.files),
        }))
    }

    fn open(&self, location: &StorageLocation) -> Result<Box<dyn ReadSeek>, StoreError> {
        let data = self.contents(location).ok_or_else(|| StoreError::NotFound {
            location: location.to_string(),
        })?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn remove(&self, location: &StorageLocation) -> Result<(), StoreError> {
        self.files
            .write()
            .remove(location)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                location: location.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};

    fn exercise(store: &dyn FileStore) {
        let location = StorageLocation::from_index(3);
        let mut writer = store.create(&location).unwrap();
        writer.write_all(b"hello ").unwrap();
        writer.write_all(b"world").unwrap();
        writer.flush().unwrap();
        drop(writer);

        let mut reader = store.open(&location).unwrap();
        reader.seek(SeekFrom::Start(6)).unwrap();
        let mut tail = String::new();
        reader.read_to_string(&mut tail).unwrap();
        assert_eq!(tail, "world");
        drop(reader);

        store.remove(&location).unwrap();
        assert!(matches!(
            store.open(&location),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.remove(&location),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_disk_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFileStore::open(dir.path().join("files")).unwrap();
        exercise(&store);
    }

    #[test]
    fn test_memory_store() {
        let store = InMemoryFileStore::new();
        exercise(&store);
        assert!(store.is_empty());
    }
}
