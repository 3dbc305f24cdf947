//! Encrypted, size-bounded object cache on local disk.
//!
//! Each object is stored encrypted in its own file, the index of tracked
//! objects lives in memory and is persisted to `cache.db` on close. When
//! the byte budget is exceeded the least-recently-written objects go first.
//!
//! The public operations come in two forms: `try_*` returns the structured
//! [`Error`], the plain form absorbs it into a boolean or `Option` and logs.

pub mod id;
pub mod index;
pub mod metadata;
pub mod object;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;

pub use id::ObjectId;
pub use index::CacheEntry;

use crate::config::CacheConfig;
use crate::crypto::StreamCipher;
use crate::storage::{self, FsStorage, Storage, StorageError};
use crate::{Error, IntegrityError};
use index::EvictionIndex;
use metadata::METADATA_FILE;

/// Byte budget of a freshly opened cache.
pub const DEFAULT_MAX_SIZE: u64 = 500_000_000;

/// What opening a cache made of the persisted metadata.
///
/// Whatever happened, the cache is usable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataLoad {
    /// No metadata file; the cache starts empty.
    Missing,
    /// Metadata verified and re-inserted.
    Restored {
        /// Entries tracked after the reload.
        restored: usize,
        /// Records larger than the budget in effect at open.
        skipped: usize,
        /// Entries evicted while re-inserting.
        evicted: usize,
        /// False if parsing stopped at a malformed record.
        complete: bool,
    },
    /// Metadata failed verification (corruption or a different key).
    /// Object files it described stay on disk untracked.
    Discarded { reason: IntegrityError },
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub current_size: u64,
    pub max_size: u64,
}

/// Disk-backed encrypted object cache.
///
/// Not synchronized: callers must serialize all operations on one instance,
/// and only one instance should own a directory at a time.
pub struct Cache<S: Storage = FsStorage> {
    dir: PathBuf,
    cipher: StreamCipher,
    storage: S,
    index: EvictionIndex,
    load: MetadataLoad,
    closed: bool,
}

impl Cache<FsStorage> {
    /// Open (or create) a cache in `dir` on the local filesystem.
    pub fn open(dir: impl Into<PathBuf>, encryption_key: &[u8]) -> Result<Self, Error> {
        Self::open_with(FsStorage, dir, encryption_key)
    }

    /// Open the cache described by `config`, then apply its byte budget.
    pub fn from_config(config: &CacheConfig) -> Result<Self, Error> {
        config.validate()?;
        let key = config.require_encryption_key()?;
        let mut cache = Self::open(&config.cache_dir, key.as_bytes())?;
        cache.set_max_size(config.max_size);
        Ok(cache)
    }
}

impl<S: Storage> Cache<S> {
    /// Open (or create) a cache in `dir` over the given storage.
    ///
    /// Metadata that is missing, truncated, corrupt or written under another
    /// key is discarded and the cache starts empty; see [`Cache::load_report`].
    /// Reloaded entries go through the same eviction as live writes, against
    /// [`DEFAULT_MAX_SIZE`].
    ///
    /// A metadata file that exists but cannot be read fails the open and is
    /// left untouched.
    pub fn open_with(storage: S, dir: impl Into<PathBuf>, encryption_key: &[u8]) -> Result<Self, Error> {
        let dir = dir.into();
        let cipher = StreamCipher::new(encryption_key)?;
        storage.ensure_dir(&dir)?;

        let mut cache = Self {
            dir,
            cipher,
            storage,
            index: EvictionIndex::new(DEFAULT_MAX_SIZE),
            load: MetadataLoad::Missing,
            closed: false,
        };
        match cache.load_metadata() {
            Ok(load) => cache.load = load,
            Err(e) => {
                // Nothing was loaded, so nothing may be written over the file.
                cache.closed = true;
                tracing::error!(dir = %cache.dir.display(), error = %e, "Cannot read cache metadata");
                return Err(e);
            }
        }

        tracing::info!(
            dir = %cache.dir.display(),
            entries = cache.index.len(),
            current_size = cache.index.current_size(),
            "Opened cache"
        );
        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Outcome of loading the metadata file at open.
    pub fn load_report(&self) -> &MetadataLoad {
        &self.load
    }

    /// Whether `id` is tracked. No I/O.
    pub fn has_object(&self, id: &ObjectId) -> bool {
        self.index.contains(id)
    }

    /// Bookkeeping for `id`, if tracked.
    pub fn entry(&self, id: &ObjectId) -> Option<&CacheEntry> {
        self.index.get(id)
    }

    /// Read and verify the object stored under `id`.
    ///
    /// Returns `Ok(None)` if it is not tracked. A stored object that fails
    /// verification is purged from the index (its file stays on disk) and
    /// reported as [`Error::Integrity`].
    pub fn try_read(&mut self, id: &ObjectId) -> Result<Option<Vec<u8>>, Error> {
        if !self.index.contains(id) {
            return Ok(None);
        }
        let path = self.object_path(id)?;
        let raw = self.storage.read(&path)?;

        match object::decode(&self.cipher, id, raw) {
            Ok(value) => Ok(Some(value)),
            Err(reason) => {
                self.index.remove(id);
                tracing::warn!(id = %id, error = %reason, "Purged object that failed verification");
                Err(reason.into())
            }
        }
    }

    /// Read the object stored under `id`, or None on a miss or any failure.
    pub fn read_object(&mut self, id: &ObjectId) -> Option<Vec<u8>> {
        absorb("read", id, self.try_read(id)).flatten()
    }

    /// Store `value` under `id`, replacing any previous value.
    ///
    /// The index changes only after the file is written. Objects evicted to
    /// make room have their files deleted.
    pub fn try_write(&mut self, id: &ObjectId, value: &[u8]) -> Result<(), Error> {
        if id.is_empty() {
            return Err(Error::EmptyId);
        }
        let size = value.len() as u64;
        if size > self.index.max_size() {
            return Err(Error::TooLarge { size, max_size: self.index.max_size() });
        }

        let path = self.object_path(id)?;
        self.storage.write(&path, &object::encode(&self.cipher, id, value))?;

        let evicted = self.index.insert(id.clone(), CacheEntry { size, written_at: now() });
        tracing::debug!(id = %id, size, evicted = evicted.len(), "Wrote object");
        self.delete_files(evicted);
        Ok(())
    }

    /// Store `value` under `id`. False if it is too large or the write failed.
    pub fn write_object(&mut self, id: &ObjectId, value: &[u8]) -> bool {
        absorb("write", id, self.try_write(id, value)).is_some()
    }

    /// Delete the object stored under `id`. Returns false if it was not tracked.
    ///
    /// A backing file that is already gone counts as deleted.
    pub fn try_erase(&mut self, id: &ObjectId) -> Result<bool, Error> {
        if !self.index.contains(id) {
            return Ok(false);
        }
        let path = self.object_path(id)?;
        self.delete_file(&path);
        self.index.remove(id);
        tracing::debug!(id = %id, "Erased object");
        Ok(true)
    }

    pub fn erase_object(&mut self, id: &ObjectId) -> bool {
        absorb("erase", id, self.try_erase(id)).unwrap_or(false)
    }

    /// Change the byte budget, evicting oldest-written objects to fit it.
    pub fn set_max_size(&mut self, max_size: u64) {
        let evicted = self.index.set_max_size(max_size);
        if !evicted.is_empty() {
            tracing::info!(max_size, evicted = evicted.len(), "Evicted objects to fit new budget");
        }
        self.delete_files(evicted);
    }

    pub fn max_size(&self) -> u64 {
        self.index.max_size()
    }

    /// Total bytes of all tracked objects. No I/O.
    pub fn current_size(&self) -> u64 {
        self.index.current_size()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.index.len(),
            current_size: self.index.current_size(),
            max_size: self.index.max_size(),
        }
    }

    /// Persist the index to the metadata file without closing.
    pub fn flush(&self) -> Result<(), Error> {
        let path = storage::concat_path(&self.dir, METADATA_FILE)?;
        let records = self.index.iter_oldest_first().map(|(id, e)| (id, e.written_at, e.size));
        self.storage.write(&path, &metadata::encode(&self.cipher, records))?;
        tracing::debug!(entries = self.index.len(), "Persisted cache metadata");
        Ok(())
    }

    /// Persist the index and release the cache.
    ///
    /// A failure is logged here as well as returned.
    pub fn close(mut self) -> Result<(), Error> {
        self.closed = true;
        let result = self.flush();
        match &result {
            Ok(()) => tracing::info!(dir = %self.dir.display(), entries = self.index.len(), "Closed cache"),
            Err(e) => tracing::error!(dir = %self.dir.display(), error = %e, "Failed to persist cache metadata on close"),
        }
        result
    }

    /// Delete object files in the directory that the index does not track.
    ///
    /// Such files are left behind by purges, by reopening with a different
    /// key and, as staging files, by writes interrupted before their rename.
    /// Returns how many files were removed.
    pub fn sweep_orphans(&mut self) -> Result<usize, Error> {
        let mut removed = 0;
        for name in self.storage.list(&self.dir)? {
            let orphaned = match name.strip_suffix(storage::STAGING_SUFFIX) {
                Some(target) => object::id_from_file_name(target).is_some(),
                None => object::id_from_file_name(&name).is_some_and(|id| !self.index.contains(&id)),
            };
            if !orphaned {
                continue;
            }
            let path = storage::concat_path(&self.dir, &name)?;
            match self.storage.delete(&path) {
                Ok(()) | Err(StorageError::NotFound { .. }) => removed += 1,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to delete orphaned object file"),
            }
        }
        tracing::info!(removed, "Swept orphaned object files");
        Ok(removed)
    }

    fn object_path(&self, id: &ObjectId) -> Result<PathBuf, StorageError> {
        storage::concat_path(&self.dir, &object::file_name(id))
    }

    fn delete_files(&self, evicted: Vec<(ObjectId, CacheEntry)>) {
        for (id, entry) in evicted {
            tracing::debug!(id = %id, size = entry.size, "Evicted object");
            match self.object_path(&id) {
                Ok(path) => self.delete_file(&path),
                Err(e) => tracing::warn!(id = %id, error = %e, "Cannot locate evicted object file"),
            }
        }
    }

    fn delete_file(&self, path: &Path) {
        match self.storage.delete(path) {
            Ok(()) | Err(StorageError::NotFound { .. }) => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to delete object file"),
        }
    }

    fn load_metadata(&mut self) -> Result<MetadataLoad, Error> {
        let path = storage::concat_path(&self.dir, METADATA_FILE)?;
        if !self.storage.exists(&path) {
            return Ok(MetadataLoad::Missing);
        }
        let raw = self.storage.read(&path)?;
        let decoded = match metadata::decode(&self.cipher, raw) {
            Ok(decoded) => decoded,
            Err(reason) => {
                tracing::warn!(error = %reason, "Discarding cache metadata (corrupt or different key); starting empty");
                return Ok(MetadataLoad::Discarded { reason });
            }
        };

        let mut skipped = 0;
        let mut evicted = 0;
        for record in decoded.records {
            if record.size > self.index.max_size() {
                skipped += 1;
                continue;
            }
            let victims = self.index.insert(record.id, CacheEntry { size: record.size, written_at: record.written_at });
            evicted += victims.len();
            self.delete_files(victims);
        }

        Ok(MetadataLoad::Restored { restored: self.index.len(), skipped, evicted, complete: decoded.complete })
    }
}

impl<S: Storage> Drop for Cache<S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.flush() {
            tracing::error!(dir = %self.dir.display(), error = %e, "Failed to persist cache metadata");
        }
    }
}

/// Write timestamps are kept at the precision the metadata file stores.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn absorb<T>(op: &str, id: &ObjectId, result: Result<T, Error>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e @ Error::Storage(_)) => {
            tracing::warn!(op, id = %id, error = %e, "Cache operation failed");
            None
        }
        Err(e) => {
            tracing::debug!(op, id = %id, error = %e, "Cache operation rejected");
            None
        }
    }
}
