//! Content-addressable evidence store
//!
//! Payloads are filed under their SHA-256. Identical uploads share one blob
//! and bump its reference count; releasing the last reference only makes the
//! blob eligible for [`ContentStore::collect_garbage`], which an external
//! retention scheduler runs.
//!
//! Each key has its own slot mutex, so the "does this blob exist" check and
//! the reference count change happen atomically per key while other keys
//! proceed in parallel.

pub mod backend;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, instrument, trace};

use crate::common::audit;
use crate::common::hash::{compute_hash, HashAlgorithm};
use crate::error::{CustodyError, CustodyResult};

pub use backend::{BlobBackend, FsBackend, MemoryBackend};
pub use types::{ContentBlob, StorageKey};

#[derive(Debug, Default)]
struct BlobSlot {
    /// Bytes are present in the backend
    stored: bool,
    byte_length: u64,
    ref_count: u64,
    /// Removed from the index by a sweep; holders must look the key up again
    retired: bool,
}

/// Deduplicating, reference-counted byte store
pub struct ContentStore {
    backend: Arc<dyn BlobBackend>,
    slots: RwLock<HashMap<StorageKey, Arc<Mutex<BlobSlot>>>>,
}

impl ContentStore {
    pub fn new(backend: Arc<dyn BlobBackend>) -> Self {
        Self {
            backend,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Store backed by process memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn slot_for(&self, key: &StorageKey) -> Arc<Mutex<BlobSlot>> {
        if let Some(slot) = self.slots.read().get(key) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write();
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    fn existing_slot(&self, key: &StorageKey) -> CustodyResult<Arc<Mutex<BlobSlot>>> {
        self.slots
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| CustodyError::NotFound(key.to_string()))
    }

    /// Store a payload, hashing it first
    pub fn put(&self, data: &[u8]) -> CustodyResult<StorageKey> {
        self.insert(data, StorageKey::for_bytes(data), true)
    }

    /// Store a payload whose SHA-256 is already known
    ///
    /// When the key is new the bytes are hashed once more before they are
    /// written, and a digest that does not match is rejected. Deduplicated
    /// puts trust the stored blob and skip the hash.
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub fn put_with_digest(&self, data: &[u8], sha256: &str) -> CustodyResult<StorageKey> {
        let key = StorageKey::from_sha256(sha256)?;
        self.insert(data, key, false)
    }

    fn insert(&self, data: &[u8], key: StorageKey, verified: bool) -> CustodyResult<StorageKey> {
        loop {
            let slot = self.slot_for(&key);
            let mut state = slot.lock();
            if state.retired {
                continue;
            }

            if state.stored {
                trace!(key = %key, "Deduplicated payload");
            } else {
                if !verified {
                    let actual = compute_hash(data, HashAlgorithm::Sha256);
                    if actual != key.as_str() {
                        audit::log_rejected("store_put", "digest does not match payload", key.as_str());
                        return Err(CustodyError::InvalidInput(format!(
                            "Payload hashes to {} but was filed as {}",
                            actual, key
                        )));
                    }
                }
                self.backend.write(&key, data)?;
                state.stored = true;
                state.byte_length = data.len() as u64;
                debug!(key = %key, backend = self.backend.name(), "New blob written");
            }

            state.ref_count += 1;
            return Ok(key);
        }
    }

    /// Re-index a blob the backend already holds, e.g. after a restart
    ///
    /// The reference count normally comes from the evidence repository. A
    /// zero-reference blob whose bytes were already collected is skipped.
    pub fn restore(&self, blob: &ContentBlob) -> CustodyResult<()> {
        let key = &blob.storage_key;
        let slot = self.slot_for(key);
        let mut state = slot.lock();
        if state.stored {
            return Err(CustodyError::InvalidInput(format!("{} is already indexed", key)));
        }

        match self.backend.size(key)? {
            Some(size) if size == blob.byte_length => {}
            Some(size) => {
                audit::log_integrity_failure(key.as_str(), &blob.byte_length.to_string(), &size.to_string());
                return Err(CustodyError::CorruptionDetected {
                    storage_key: key.to_string(),
                    expected: format!("{} bytes", blob.byte_length),
                    actual: format!("{} bytes", size),
                });
            }
            None if blob.ref_count == 0 => {
                debug!(key = %key, "Unreferenced blob already collected");
                return Ok(());
            }
            None => return Err(CustodyError::NotFound(key.to_string())),
        }

        state.stored = true;
        state.byte_length = blob.byte_length;
        state.ref_count = blob.ref_count;
        debug!(key = %key, refs = blob.ref_count, "Blob restored");
        Ok(())
    }

    /// Read a payload and verify it still hashes to its key
    #[instrument(skip(self), fields(key = %key))]
    pub fn get(&self, key: &StorageKey) -> CustodyResult<Vec<u8>> {
        let slot = self.existing_slot(key)?;
        if !slot.lock().stored {
            return Err(CustodyError::NotFound(key.to_string()));
        }

        let data = self
            .backend
            .read(key)?
            .ok_or_else(|| CustodyError::NotFound(key.to_string()))?;

        let actual = compute_hash(&data, HashAlgorithm::Sha256);
        if actual != key.as_str() {
            audit::log_integrity_failure(key.as_str(), key.as_str(), &actual);
            return Err(CustodyError::CorruptionDetected {
                storage_key: key.to_string(),
                expected: key.to_string(),
                actual,
            });
        }

        Ok(data)
    }

    /// Drop one reference, returning how many remain
    pub fn release(&self, key: &StorageKey) -> CustodyResult<u64> {
        let slot = self.existing_slot(key)?;
        let mut state = slot.lock();
        if !state.stored || state.ref_count == 0 {
            return Err(CustodyError::NotFound(format!("{} has no live references", key)));
        }

        state.ref_count -= 1;
        audit::log_blob_released(key.as_str(), state.ref_count);
        Ok(state.ref_count)
    }

    /// Physically delete every blob with no remaining references
    ///
    /// Returns the keys whose bytes were removed.
    pub fn collect_garbage(&self) -> CustodyResult<Vec<StorageKey>> {
        let mut slots = self.slots.write();
        let candidates: Vec<StorageKey> = slots.keys().cloned().collect();
        let mut collected = Vec::new();

        for key in candidates {
            let Some(slot) = slots.get(&key).cloned() else {
                continue;
            };
            let mut state = slot.lock();
            if state.ref_count > 0 {
                continue;
            }

            if state.stored {
                self.backend.remove(&key)?;
                audit::log_blob_collected(key.as_str(), state.byte_length);
                collected.push(key.clone());
            }
            state.stored = false;
            state.retired = true;
            drop(state);
            slots.remove(&key);
        }

        debug!(collected = collected.len(), remaining = slots.len(), "Garbage collection sweep");
        Ok(collected)
    }

    /// Current metadata for a stored blob
    pub fn blob(&self, key: &StorageKey) -> Option<ContentBlob> {
        let slot = self.slots.read().get(key).cloned()?;
        let state = slot.lock();
        state.stored.then(|| ContentBlob {
            storage_key: key.clone(),
            byte_length: state.byte_length,
            ref_count: state.ref_count,
        })
    }

    /// Number of physically stored blobs
    pub fn blob_count(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.lock().stored)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Counts physical writes
    #[derive(Default)]
    struct CountingBackend {
        inner: MemoryBackend,
        writes: AtomicUsize,
    }

    impl BlobBackend for CountingBackend {
        fn write(&self, key: &StorageKey, data: &[u8]) -> io::Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.write(key, data)
        }
        fn read(&self, key: &StorageKey) -> io::Result<Option<Vec<u8>>> {
            self.inner.read(key)
        }
        fn size(&self, key: &StorageKey) -> io::Result<Option<u64>> {
            self.inner.size(key)
        }
        fn remove(&self, key: &StorageKey) -> io::Result<()> {
            self.inner.remove(key)
        }
        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[test]
    fn test_put_twice_dedups() {
        let backend = Arc::new(CountingBackend::default());
        let store = ContentStore::new(backend.clone());

        let first = store.put(b"same bytes").unwrap();
        let second = store.put(b"same bytes").unwrap();

        assert_eq!(first, second);
        assert_eq!(store.blob(&first).unwrap().ref_count, 2);
        assert_eq!(store.blob_count(), 1);
        assert_eq!(backend.writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_round_trip_and_miss() {
        let store = ContentStore::in_memory();
        let key = store.put(b"payload").unwrap();
        assert_eq!(store.get(&key).unwrap(), b"payload");
        assert_eq!(store.blob(&key).unwrap().byte_length, 7);

        let missing = StorageKey::for_bytes(b"never stored");
        assert!(matches!(store.get(&missing), Err(CustodyError::NotFound(_))));
    }

    #[test]
    fn test_corruption_is_surfaced() {
        let backend = Arc::new(MemoryBackend::new());
        let store = ContentStore::new(backend.clone());
        let key = store.put(b"original evidence").unwrap();

        backend.tamper(&key, b"altered evidence".to_vec());

        match store.get(&key) {
            Err(CustodyError::CorruptionDetected { storage_key, actual, .. }) => {
                assert_eq!(storage_key, key.to_string());
                assert_eq!(actual, StorageKey::for_bytes(b"altered evidence").to_string());
            }
            other => panic!("expected corruption, got {:?}", other),
        }
        // never repaired
        assert!(store.get(&key).is_err());
    }

    #[test]
    fn test_release_and_collect() {
        let store = ContentStore::in_memory();
        let key = store.put(b"shared").unwrap();
        store.put(b"shared").unwrap();

        assert_eq!(store.release(&key).unwrap(), 1);
        assert!(store.collect_garbage().unwrap().is_empty());
        assert_eq!(store.get(&key).unwrap(), b"shared");

        assert_eq!(store.release(&key).unwrap(), 0);
        // eligible but still present until a sweep
        assert_eq!(store.blob(&key).unwrap().ref_count, 0);
        assert!(matches!(store.release(&key), Err(CustodyError::NotFound(_))));

        assert_eq!(store.collect_garbage().unwrap(), vec![key.clone()]);
        assert!(store.blob(&key).is_none());
        assert!(matches!(store.get(&key), Err(CustodyError::NotFound(_))));
    }

    #[test]
    fn test_put_after_release_reuses_bytes() {
        let backend = Arc::new(CountingBackend::default());
        let store = ContentStore::new(backend.clone());
        let key = store.put(b"again").unwrap();
        store.release(&key).unwrap();

        store.put(b"again").unwrap();
        assert_eq!(store.blob(&key).unwrap().ref_count, 1);
        assert_eq!(backend.writes.load(Ordering::SeqCst), 1);

        store.release(&key).unwrap();
        store.collect_garbage().unwrap();
        store.put(b"again").unwrap();
        assert_eq!(backend.writes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_release_unknown_key() {
        let store = ContentStore::in_memory();
        let key = StorageKey::for_bytes(b"nothing");
        assert!(matches!(store.release(&key), Err(CustodyError::NotFound(_))));
    }

    #[test]
    fn test_put_with_invalid_digest() {
        let store = ContentStore::in_memory();
        assert!(matches!(
            store.put_with_digest(b"x", "not-a-digest"),
            Err(CustodyError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_put_with_wrong_digest_is_rejected() {
        let backend = Arc::new(CountingBackend::default());
        let store = ContentStore::new(backend.clone());
        let other = StorageKey::for_bytes(b"BBBB");

        // same length, different content
        assert!(matches!(
            store.put_with_digest(b"AAAA", other.as_str()),
            Err(CustodyError::InvalidInput(_))
        ));
        assert!(store.blob(&other).is_none());
        assert_eq!(backend.writes.load(Ordering::SeqCst), 0);

        // the honest upload still lands on the right bytes
        let key = store.put(b"BBBB").unwrap();
        assert_eq!(key, other);
        assert_eq!(store.get(&key).unwrap(), b"BBBB");
        assert_eq!(store.blob(&key).unwrap().ref_count, 1);
    }

    #[test]
    fn test_reopened_filesystem_store_restores_index() {
        let dir = TempDir::new().unwrap();
        let key = {
            let store = ContentStore::new(Arc::new(FsBackend::new(dir.path()).unwrap()));
            let key = store.put(b"seized laptop image").unwrap();
            store.put(b"seized laptop image").unwrap();
            key
        };

        let reopened = ContentStore::new(Arc::new(FsBackend::new(dir.path()).unwrap()));
        assert!(matches!(reopened.get(&key), Err(CustodyError::NotFound(_))));

        let blob = ContentBlob {
            storage_key: key.clone(),
            byte_length: 19,
            ref_count: 2,
        };
        reopened.restore(&blob).unwrap();
        assert_eq!(reopened.get(&key).unwrap(), b"seized laptop image");
        assert_eq!(reopened.blob(&key).unwrap(), blob);
        assert!(matches!(reopened.restore(&blob), Err(CustodyError::InvalidInput(_))));

        assert_eq!(reopened.release(&key).unwrap(), 1);
        assert_eq!(reopened.release(&key).unwrap(), 0);
        assert_eq!(reopened.collect_garbage().unwrap(), vec![key.clone()]);
    }

    #[test]
    fn test_restore_checks_backend() {
        let store = ContentStore::in_memory();
        let missing = ContentBlob {
            storage_key: StorageKey::for_bytes(b"never written"),
            byte_length: 13,
            ref_count: 1,
        };
        assert!(matches!(store.restore(&missing), Err(CustodyError::NotFound(_))));

        let collected = ContentBlob { ref_count: 0, ..missing };
        store.restore(&collected).unwrap();
        assert!(store.blob(&collected.storage_key).is_none());

        let key = store.put(b"twelve bytes").unwrap();
        let reopened = ContentStore::new(Arc::clone(&store.backend));
        let wrong_length = ContentBlob {
            storage_key: key,
            byte_length: 99,
            ref_count: 1,
        };
        assert!(matches!(
            reopened.restore(&wrong_length),
            Err(CustodyError::CorruptionDetected { .. })
        ));
    }

    #[test]
    fn test_concurrent_identical_puts() {
        let backend = Arc::new(CountingBackend::default());
        let store = ContentStore::new(backend.clone());
        let data = vec![0x5Au8; 64 * 1024];

        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| store.put(&data).unwrap());
            }
        });

        let key = StorageKey::for_bytes(&data);
        assert_eq!(store.blob(&key).unwrap().ref_count, 16);
        assert_eq!(backend.writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_put_and_sweep() {
        let store = ContentStore::in_memory();
        let key = store.put(b"contended").unwrap();
        store.release(&key).unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..50 {
                    store.collect_garbage().unwrap();
                }
            });
            scope.spawn(|| {
                for _ in 0..50 {
                    store.put(b"contended").unwrap();
                }
            });
        });

        // every put must be accounted for even when a sweep interleaved
        let blob = store.blob(&key).unwrap();
        assert_eq!(blob.ref_count, 50);
        assert_eq!(store.get(&key).unwrap(), b"contended");
    }

    #[test]
    fn test_filesystem_store() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(Arc::new(FsBackend::new(dir.path()).unwrap()));
        assert_eq!(store.backend_name(), "filesystem");

        let key = store.put(b"disk evidence").unwrap();
        assert_eq!(store.get(&key).unwrap(), b"disk evidence");

        store.release(&key).unwrap();
        assert_eq!(store.collect_garbage().unwrap().len(), 1);
        assert!(store.get(&key).is_err());
    }
}
