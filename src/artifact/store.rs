//! Artifact cache backends.
//!
//! Stores are process-local. The engine treats every store error as a cache
//! miss, so a broken store slows lessons down but never fails them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::cache::CacheEntry;
use super::key::CacheKey;
use crate::config::{ArtifactSettings, StoreKind};
use crate::error::{Error, Result};

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Entry for `key`, expired or not; expiry is the caller's decision
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    async fn put(&self, entry: CacheEntry) -> Result<()>;

    async fn remove(&self, key: &CacheKey) -> Result<()>;

    /// Drop every entry expired at `now`; returns how many were removed
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;

    async fn len(&self) -> Result<usize>;
}

pub type SharedStore = Arc<dyn ArtifactStore>;

/// Build the store named in configuration
pub fn create_store(settings: &ArtifactSettings, cache_dir: &Path) -> Result<SharedStore> {
    match settings.store {
        StoreKind::Memory => Ok(Arc::new(MemoryStore::new(settings.max_entries))),
        StoreKind::File => Ok(Arc::new(FileStore::open(cache_dir, settings.max_entries)?)),
    }
}

// ─────────────────────────────────────────────────────────────────
// Memory store
// ─────────────────────────────────────────────────────────────────

/// Bounded LRU map: reads move an entry to the back, writes evict the front
pub struct MemoryStore {
    capacity: usize,
    entries: Mutex<IndexMap<CacheKey, CacheEntry>>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(IndexMap::new()),
        }
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.shift_remove(key) else {
            return Ok(None);
        };
        entries.insert(key.clone(), entry.clone());
        Ok(Some(entry))
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.shift_remove(&entry.key);
        while entries.len() >= self.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                debug!(key = %evicted, "Evicted least recently used artifact");
            }
        }
        entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<()> {
        self.entries.lock().shift_remove(key);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before - entries.len())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.lock().len())
    }
}

// ─────────────────────────────────────────────────────────────────
// File store
// ─────────────────────────────────────────────────────────────────

/// One JSON file per entry, named by the key digest
pub struct FileStore {
    dir: PathBuf,
    capacity: usize,
}

impl FileStore {
    pub fn open(dir: &Path, capacity: usize) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| Error::IoWrite {
            path: dir.to_path_buf(),
            source: e,
        })?;
        debug!(dir = %dir.display(), capacity, "File artifact store opened");
        Ok(Self {
            dir: dir.to_path_buf(),
            capacity: capacity.max(1),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.digest()))
    }

    async fn entry_files(&self) -> Result<Vec<(SystemTime, PathBuf)>> {
        let mut files = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| Error::store(self.name(), e.to_string()))?;
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| Error::store(self.name(), e.to_string()))?
        {
            let path = item.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let modified = item
                .metadata()
                .await
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((modified, path));
        }
        Ok(files)
    }

    async fn prune(&self) -> Result<()> {
        let mut files = self.entry_files().await?;
        if files.len() <= self.capacity {
            return Ok(());
        }
        files.sort();
        let excess = files.len() - self.capacity;
        for (_, path) in files.into_iter().take(excess) {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to prune artifact file");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let path = self.path_for(key);
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::store(self.name(), e.to_string())),
        };
        match serde_json::from_slice::<CacheEntry>(&content) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding unreadable artifact file");
                let _ = tokio::fs::remove_file(&path).await;
                Ok(None)
            }
        }
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        let path = self.path_for(&entry.key);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(&entry)?;

        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| Error::store(self.name(), e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::store(self.name(), e.to_string()))?;

        self.prune().await
    }

    async fn remove(&self, key: &CacheKey) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::store(self.name(), e.to_string())),
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        for (_, path) in self.entry_files().await? {
            let expired = match tokio::fs::read(&path).await {
                Ok(content) => serde_json::from_slice::<CacheEntry>(&content)
                    .map(|entry| entry.is_expired(now))
                    .unwrap_or(true),
                Err(_) => continue,
            };
            if expired && tokio::fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entry_files().await?.len())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::artifact::types::ArtifactResult;
    use crate::lesson::LessonMeta;

    fn entry(lesson: u32, ttl: Duration) -> CacheEntry {
        let meta = LessonMeta::new(lesson, format!("Topic {}", lesson));
        CacheEntry::new(
            CacheKey::for_lesson(&meta),
            ArtifactResult::image(&meta, &[], "mock", format!("https://img/{}", lesson), "p"),
            ttl,
        )
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new(4);
        let e = entry(1, Duration::from_secs(60));
        let key = e.key.clone();
        store.put(e).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap().unwrap().artifact.lesson_number, 1);
        store.remove(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_evicts_least_recently_used() {
        let store = MemoryStore::new(2);
        let first = entry(1, Duration::from_secs(60));
        let first_key = first.key.clone();
        let second = entry(2, Duration::from_secs(60));
        let second_key = second.key.clone();
        store.put(first).await.unwrap();
        store.put(second).await.unwrap();

        // Touch the first entry so the second becomes the eviction candidate
        store.get(&first_key).await.unwrap();
        store.put(entry(3, Duration::from_secs(60))).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 2);
        assert!(store.get(&first_key).await.unwrap().is_some());
        assert!(store.get(&second_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_purge_expired() {
        let store = MemoryStore::new(4);
        store.put(entry(1, Duration::ZERO)).await.unwrap();
        store.put(entry(2, Duration::from_secs(3600))).await.unwrap();
        let later = Utc::now() + chrono::Duration::seconds(5);
        assert_eq!(store.purge_expired(later).await.unwrap(), 1);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), 8).unwrap();
        let e = entry(7, Duration::from_secs(60));
        let key = e.key.clone();
        store.put(e).await.unwrap();

        assert!(dir.path().join(format!("{}.json", key.digest())).exists());
        let loaded = store.get(&key).await.unwrap().unwrap();
        assert_eq!(loaded.artifact.lesson_number, 7);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_file_store_prunes_to_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), 2).unwrap();
        for lesson in 1..=4 {
            store.put(entry(lesson, Duration::from_secs(60))).await.unwrap();
        }
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_file_store_discards_corrupt_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), 4).unwrap();
        let e = entry(9, Duration::from_secs(60));
        let key = e.key.clone();
        std::fs::write(dir.path().join(format!("{}.json", key.digest())), b"not json").unwrap();

        assert!(store.get(&key).await.unwrap().is_none());
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_store_purge_expired() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), 4).unwrap();
        store.put(entry(1, Duration::ZERO)).await.unwrap();
        store.put(entry(2, Duration::from_secs(3600))).await.unwrap();
        let later = Utc::now() + chrono::Duration::seconds(5);
        assert_eq!(store.purge_expired(later).await.unwrap(), 1);
        assert_eq!(store.len().await.unwrap(), 1);
    }
}
