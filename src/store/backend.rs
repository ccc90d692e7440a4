//! Byte storage backends for the content store
//!
//! Backends only move bytes. Deduplication, reference counts and integrity
//! checks live in [`ContentStore`](super::ContentStore).

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::types::StorageKey;

/// Key-addressed byte storage
pub trait BlobBackend: Send + Sync {
    /// Persist `data` under `key`, replacing anything already there
    fn write(&self, key: &StorageKey, data: &[u8]) -> io::Result<()>;

    /// Read the payload, `None` when absent
    fn read(&self, key: &StorageKey) -> io::Result<Option<Vec<u8>>>;

    /// Stored length without reading the payload, `None` when absent
    fn size(&self, key: &StorageKey) -> io::Result<Option<u64>>;

    /// Delete the payload; deleting an absent key is not an error
    fn remove(&self, key: &StorageKey) -> io::Result<()>;

    fn name(&self) -> &'static str;
}

// =============================================================================
// In-memory backend
// =============================================================================

/// Volatile backend for tests and ephemeral deployments
#[derive(Default)]
pub struct MemoryBackend {
    blobs: RwLock<HashMap<StorageKey, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Overwrite stored bytes without going through the content store
    #[cfg(test)]
    pub(crate) fn tamper(&self, key: &StorageKey, data: Vec<u8>) {
        self.blobs.write().insert(key.clone(), data);
    }
}

impl BlobBackend for MemoryBackend {
    fn write(&self, key: &StorageKey, data: &[u8]) -> io::Result<()> {
        self.blobs.write().insert(key.clone(), data.to_vec());
        Ok(())
    }

    fn read(&self, key: &StorageKey) -> io::Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(key).cloned())
    }

    fn size(&self, key: &StorageKey) -> io::Result<Option<u64>> {
        Ok(self.blobs.read().get(key).map(|data| data.len() as u64))
    }

    fn remove(&self, key: &StorageKey) -> io::Result<()> {
        self.blobs.write().remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// Filesystem backend
// =============================================================================

/// Directory backend laid out as `<root>/ab/cd/<sha256>`
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never observes a partially written payload.
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "Filesystem blob backend ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final on-disk path for a key
    pub fn path_for(&self, key: &StorageKey) -> PathBuf {
        let (first, second) = key.shards();
        self.root.join(first).join(second).join(key.as_str())
    }
}

impl BlobBackend for FsBackend {
    fn write(&self, key: &StorageKey, data: &[u8]) -> io::Result<()> {
        let path = self.path_for(key);
        let parent = path
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "blob path has no parent"))?;
        fs::create_dir_all(parent)?;

        let tmp = parent.join(format!("{}.tmp-{}", key.as_str(), uuid::Uuid::new_v4()));
        let result = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(data)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        trace!(path = %path.display(), bytes = data.len(), "Blob written");
        result
    }

    fn read(&self, key: &StorageKey) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn size(&self, key: &StorageKey) -> io::Result<Option<u64>> {
        match fs::metadata(self.path_for(key)) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn remove(&self, key: &StorageKey) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_backend() {
        let backend = MemoryBackend::new();
        let key = StorageKey::for_bytes(b"abc");
        assert!(backend.read(&key).unwrap().is_none());
        assert_eq!(backend.size(&key).unwrap(), None);

        backend.write(&key, b"abc").unwrap();
        assert_eq!(backend.size(&key).unwrap(), Some(3));
        assert_eq!(backend.read(&key).unwrap().as_deref(), Some(&b"abc"[..]));
        assert_eq!(backend.len(), 1);

        backend.remove(&key).unwrap();
        backend.remove(&key).unwrap();
        assert!(backend.is_empty());
    }

    #[test]
    fn test_fs_backend_layout() {
        let dir = TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path().join("blobs")).unwrap();
        let key = StorageKey::for_bytes(b"evidence");

        backend.write(&key, b"evidence").unwrap();
        let path = backend.path_for(&key);
        assert!(path.exists());
        assert!(path.starts_with(backend.root()));
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), key.as_str());
        assert_eq!(backend.read(&key).unwrap().unwrap(), b"evidence");
        assert_eq!(backend.size(&key).unwrap(), Some(8));

        // no temp files left behind
        let siblings = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(siblings, 1);
    }

    #[test]
    fn test_fs_backend_missing_and_remove() {
        let dir = TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path()).unwrap();
        let key = StorageKey::for_bytes(b"gone");

        assert!(backend.read(&key).unwrap().is_none());
        assert_eq!(backend.size(&key).unwrap(), None);
        backend.remove(&key).unwrap();

        backend.write(&key, b"gone").unwrap();
        backend.remove(&key).unwrap();
        assert!(backend.read(&key).unwrap().is_none());
    }
}
