// src/storage/record_store.rs
//! Append-only record collections.
//!
//! Issued credentials and revocation entries each live in one collection. The
//! core only needs three operations from a collection: append an entry, list
//! all entries newest-first, and test whether an entry with a given key exists.
//!
//! Two implementations are provided:
//! - `MemoryStore`: process-local, substitutes for the file store in tests
//! - [`JsonFileStore`]: a pretty-printed JSON array on disk, newest first
//!
//! # Known limitation
//! `JsonFileStore` serializes writers within one process only. Two processes
//! sharing the same file can lose each other's appends.

use async_trait::async_trait;
use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::{VcError, VcResult};

/// An entry that can be persisted in a record collection.
pub trait StoredEntry: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The identifier `contains` looks entries up by.
    fn key(&self) -> &str;
}

/// An append-ordered collection of entries.
///
/// Implementations must give read-your-writes consistency: an `append` that
/// returned `Ok` is visible to every later `list` or `contains` call.
#[async_trait]
pub trait RecordStore<T: StoredEntry>: Send + Sync {
    /// Appends an entry. Either the whole entry is persisted or nothing is.
    async fn append(&self, entry: T) -> VcResult<()>;

    /// All entries, most recent first.
    async fn list(&self) -> VcResult<Vec<T>>;

    /// Whether any entry has the given key.
    async fn contains(&self, key: &str) -> VcResult<bool>;
}

/// In-memory record collection.
#[cfg(test)]
pub struct MemoryStore<T> {
    /// Entries, newest at index 0
    entries: tokio::sync::RwLock<Vec<T>>,
}

/// Record collection persisted as a JSON array file.
pub struct JsonFileStore<T> {
    path: PathBuf,
    /// Held across every load-modify-save so concurrent appends do not race
    lock: Mutex<()>,
    _entry: PhantomData<fn() -> T>,
}

#[cfg(test)]
impl<T> MemoryStore<T> {
    /// Creates a new empty store.
    pub fn new() -> Self {
        MemoryStore {
            entries: tokio::sync::RwLock::new(Vec::new()),
        }
    }
}

#[cfg(test)]
impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[async_trait]
impl<T: StoredEntry> RecordStore<T> for MemoryStore<T> {
    async fn append(&self, entry: T) -> VcResult<()> {
        self.entries.write().await.insert(0, entry);
        Ok(())
    }

    async fn list(&self) -> VcResult<Vec<T>> {
        Ok(self.entries.read().await.clone())
    }

    async fn contains(&self, key: &str) -> VcResult<bool> {
        Ok(self.entries.read().await.iter().any(|entry| entry.key() == key))
    }
}

impl<T: StoredEntry> JsonFileStore<T> {
    /// Opens the collection at `path`, creating its directory and an empty
    /// array file if they do not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> VcResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let store = JsonFileStore {
            path,
            lock: Mutex::new(()),
            _entry: PhantomData,
        };
        if tokio::fs::metadata(&store.path).await.is_err() {
            store.save(&[]).await?;
        }
        Ok(store)
    }

    /// The file backing this collection.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> VcResult<Vec<T>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            error!("Corrupt record file {}: {}", self.path.display(), e);
            VcError::StoreIo(format!("{} is not a valid record file: {}", self.path.display(), e))
        })
    }

    /// Writes the full collection to a sibling temp file and renames it over
    /// the real one, so readers never observe a half-written array.
    async fn save(&self, entries: &[T]) -> VcResult<()> {
        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| VcError::StoreIo(format!("failed to serialize records: {}", e)))?;

        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl<T: StoredEntry> RecordStore<T> for JsonFileStore<T> {
    async fn append(&self, entry: T) -> VcResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        debug!("Appending {} to {}", entry.key(), self.path.display());
        entries.insert(0, entry);
        self.save(&entries).await
    }

    async fn list(&self) -> VcResult<Vec<T>> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn contains(&self, key: &str) -> VcResult<bool> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.iter().any(|entry| entry.key() == key))
    }
}
