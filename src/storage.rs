//! Persisted key-value storage behind the wallet and the round journal

use crate::config::{StorageBackend, StorageConfig};
use crate::errors::{PlazaResult, StorageError};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Minimal byte-oriented store. Every call reads or writes the backing
/// store directly, so two handles over the same store always agree.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> PlazaResult<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> PlazaResult<()>;

    fn delete(&self, key: &[u8]) -> PlazaResult<()>;

    /// Write all items or none
    fn batch_write(&self, items: &[(Vec<u8>, Vec<u8>)]) -> PlazaResult<()>;

    /// Keys starting with `prefix` in ascending order, strictly after `after`
    /// when given, at most `limit` rows.
    fn scan_prefix(
        &self,
        prefix: &[u8],
        after: Option<&[u8]>,
        limit: usize,
    ) -> PlazaResult<Vec<(Vec<u8>, Vec<u8>)>>;
}

/// Open the store selected by the configuration
pub fn open_store(config: &StorageConfig) -> PlazaResult<Arc<dyn KvStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Rocksdb => Ok(Arc::new(RocksStore::open(&config.data_directory)?)),
    }
}

/// Process-local store backed by an ordered map
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PlazaResult<std::sync::MutexGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| StorageError::ReadFailed("memory store lock poisoned".to_string()).into())
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> PlazaResult<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> PlazaResult<()> {
        self.lock()?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> PlazaResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn batch_write(&self, items: &[(Vec<u8>, Vec<u8>)]) -> PlazaResult<()> {
        let mut entries = self.lock()?;
        for (key, value) in items {
            entries.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn scan_prefix(
        &self,
        prefix: &[u8],
        after: Option<&[u8]>,
        limit: usize,
    ) -> PlazaResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let entries = self.lock()?;
        Ok(entries
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| after.map_or(true, |cursor| key.as_slice() > cursor))
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// RocksDB-backed store for balances that survive restarts
#[derive(Clone)]
pub struct RocksStore {
    db: Arc<DB>,
}

impl RocksStore {
    pub fn open<P: AsRef<Path>>(path: P) -> PlazaResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path.as_ref())
            .map_err(|e| StorageError::DatabaseOpenFailed(format!("{}: {}", path.as_ref().display(), e)))?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl KvStore for RocksStore {
    fn get(&self, key: &[u8]) -> PlazaResult<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| StorageError::ReadFailed(e.to_string()).into())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> PlazaResult<()> {
        Ok(self.db.put(key, value)?)
    }

    fn delete(&self, key: &[u8]) -> PlazaResult<()> {
        Ok(self.db.delete(key)?)
    }

    fn batch_write(&self, items: &[(Vec<u8>, Vec<u8>)]) -> PlazaResult<()> {
        let mut batch = WriteBatch::default();
        for (key, value) in items {
            batch.put(key, value);
        }
        Ok(self.db.write(batch)?)
    }

    fn scan_prefix(
        &self,
        prefix: &[u8],
        after: Option<&[u8]>,
        limit: usize,
    ) -> PlazaResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let start = after.unwrap_or(prefix);
        let mut rows = Vec::with_capacity(limit.min(256));

        for item in self.db.iterator(IteratorMode::From(start, Direction::Forward)) {
            let (key, value) = item.map_err(|e| StorageError::ReadFailed(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            if after.is_some_and(|cursor| key.as_ref() <= cursor) {
                continue;
            }
            rows.push((key.to_vec(), value.to_vec()));
            if rows.len() >= limit {
                break;
            }
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise_store(store: &dyn KvStore) {
        assert_eq!(store.get(b"missing").unwrap(), None);

        store.put(b"wallet-sh", b"10000").unwrap();
        assert_eq!(store.get(b"wallet-sh").unwrap(), Some(b"10000".to_vec()));

        store
            .batch_write(&[
                (b"p:a".to_vec(), b"1".to_vec()),
                (b"p:b".to_vec(), b"2".to_vec()),
                (b"p:c".to_vec(), b"3".to_vec()),
                (b"q:a".to_vec(), b"4".to_vec()),
            ])
            .unwrap();

        let all = store.scan_prefix(b"p:", None, 10).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].0, b"p:a".to_vec());

        let page = store.scan_prefix(b"p:", Some(b"p:a"), 1).unwrap();
        assert_eq!(page, vec![(b"p:b".to_vec(), b"2".to_vec())]);

        store.delete(b"p:b").unwrap();
        assert_eq!(store.scan_prefix(b"p:", None, 10).unwrap().len(), 2);
    }

    #[test]
    fn test_memory_store() {
        exercise_store(&MemoryStore::new());
    }

    #[test]
    fn test_rocks_store() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        exercise_store(&store);
    }

    #[test]
    fn test_rocks_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = RocksStore::open(dir.path()).unwrap();
            store.put(b"wallet-sh", b"4321").unwrap();
        }
        let reopened = RocksStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(b"wallet-sh").unwrap(), Some(b"4321".to_vec()));
    }
}
