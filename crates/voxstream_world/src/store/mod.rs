//! # Chunk Storage
//!
//! Durable mapping from chunk coordinate to serialized block grid, plus the
//! world seed. Rows are only ever added or overwritten; nothing is deleted.
//!
//! Two backends:
//! - [`FileStore`]: append-only record file, survives restarts
//! - [`MemoryStore`]: volatile, used when no store path is configured
//!
//! Every backend serializes its own calls, so a store can be shared by the
//! render thread and all workers without outside locking.

pub mod file;
pub mod memory;

use std::sync::Arc;

use voxstream_procedural::ChunkCoord;

use crate::config::WorldConfig;
use crate::error::StoreResult;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Persistent chunk storage.
pub trait ChunkStorage: Send + Sync {
    /// Returns the persisted seed, persisting `requested` first if none is
    /// stored yet. Once a seed is stored it never changes.
    ///
    /// # Errors
    ///
    /// Fails if the seed cannot be read or written.
    fn resolve_seed(&self, requested: u64) -> StoreResult<u64>;

    /// Serialized grid for `coord`, or `None` if no row exists.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a damaged row.
    fn get(&self, coord: ChunkCoord) -> StoreResult<Option<Vec<u8>>>;

    /// Inserts a new row.
    ///
    /// # Errors
    ///
    /// [`StoreError::ChunkExists`](crate::StoreError::ChunkExists) if `coord`
    /// already has a row, or an I/O error.
    fn put(&self, coord: ChunkCoord, bytes: &[u8]) -> StoreResult<()>;

    /// Overwrites an existing row.
    ///
    /// # Errors
    ///
    /// [`StoreError::ChunkMissing`](crate::StoreError::ChunkMissing) if
    /// `coord` has no row, or an I/O error.
    fn update(&self, coord: ChunkCoord, bytes: &[u8]) -> StoreResult<()>;

    /// True if `coord` has a row.
    fn contains(&self, coord: ChunkCoord) -> bool;

    /// Number of stored chunks.
    fn len(&self) -> usize;

    /// True if no chunks are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes every completed write durable.
    ///
    /// # Errors
    ///
    /// Fails if the backend cannot sync.
    fn flush(&self) -> StoreResult<()>;
}

/// Opens the backend selected by `config`.
///
/// # Errors
///
/// Fails if the store file cannot be opened or is not a valid store.
pub fn open_storage(config: &WorldConfig) -> StoreResult<Arc<dyn ChunkStorage>> {
    match &config.store_path {
        Some(path) => Ok(Arc::new(FileStore::open_with(path, config.sync_writes)?)),
        None => Ok(Arc::new(MemoryStore::new())),
    }
}
