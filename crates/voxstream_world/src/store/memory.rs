//! Volatile chunk storage. Same contract as the file store, lost on exit.

use std::collections::HashMap;

use parking_lot::Mutex;
use voxstream_procedural::ChunkCoord;

use super::ChunkStorage;
use crate::error::{StoreError, StoreResult};

#[derive(Default)]
struct MemoryState {
    seed: Option<u64>,
    chunks: HashMap<ChunkCoord, Vec<u8>>,
}

/// In-memory [`ChunkStorage`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Creates an empty store with no seed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChunkStorage for MemoryStore {
    fn resolve_seed(&self, requested: u64) -> StoreResult<u64> {
        Ok(*self.state.lock().seed.get_or_insert(requested))
    }

    fn get(&self, coord: ChunkCoord) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.state.lock().chunks.get(&coord).cloned())
    }

    fn put(&self, coord: ChunkCoord, bytes: &[u8]) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.chunks.contains_key(&coord) {
            return Err(StoreError::ChunkExists(coord));
        }
        state.chunks.insert(coord, bytes.to_vec());
        Ok(())
    }

    fn update(&self, coord: ChunkCoord, bytes: &[u8]) -> StoreResult<()> {
        let mut state = self.state.lock();
        let row = state
            .chunks
            .get_mut(&coord)
            .ok_or(StoreError::ChunkMissing(coord))?;
        row.clear();
        row.extend_from_slice(bytes);
        Ok(())
    }

    fn contains(&self, coord: ChunkCoord) -> bool {
        self.state.lock().chunks.contains_key(&coord)
    }

    fn len(&self) -> usize {
        self.state.lock().chunks.len()
    }

    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").field("chunks", &self.len()).finish()
    }
}
