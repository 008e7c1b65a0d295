//! # Ring Cache
//!
//! Fixed number of slots filled in order and overwritten by a wrapping
//! cursor. Eviction is strictly first-in first-out: reading a chunk does not
//! keep it resident.
//!
//! Slots fill contiguously from index 0, so a lookup stops at the first
//! empty slot. The cache only drops its own handle on eviction; readers
//! holding a [`ChunkRef`] keep the chunk alive.

use parking_lot::Mutex;
use voxstream_procedural::ChunkCoord;

use crate::chunk::ChunkRef;

struct Ring {
    slots: Vec<Option<ChunkRef>>,
    /// Next slot to write.
    cursor: usize,
}

/// Bounded FIFO cache of resolved chunks.
pub struct ChunkCache {
    ring: Mutex<Ring>,
    capacity: usize,
}

/// Result of [`ChunkCache::insert_if_absent`].
#[derive(Debug)]
pub enum Inserted {
    /// The chunk went in, evicting the returned chunk if the ring was full.
    New(Option<ChunkRef>),
    /// The coordinate was already cached; the resident chunk is returned.
    Existing(ChunkRef),
}

impl ChunkCache {
    /// Creates an empty cache. A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: Mutex::new(Ring {
                slots: vec![None; capacity],
                cursor: 0,
            }),
            capacity,
        }
    }

    /// Number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        let ring = self.ring.lock();
        ring.slots.iter().take_while(|s| s.is_some()).count()
    }

    /// True if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.lock().slots[0].is_none()
    }

    /// Finds the chunk at `coord`.
    #[must_use]
    pub fn get(&self, coord: ChunkCoord) -> Option<ChunkRef> {
        let ring = self.ring.lock();
        Self::find(&ring, coord).cloned()
    }

    /// True if `coord` is cached.
    #[must_use]
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        let ring = self.ring.lock();
        Self::find(&ring, coord).is_some()
    }

    /// Writes `chunk` at the cursor and advances it.
    ///
    /// Returns the chunk that occupied the slot, if any.
    pub fn insert(&self, chunk: ChunkRef) -> Option<ChunkRef> {
        let mut ring = self.ring.lock();
        Self::push(&mut ring, chunk)
    }

    /// Like [`insert`](Self::insert), but keeps an already-cached chunk for
    /// the same coordinate instead of adding a second copy.
    pub fn insert_if_absent(&self, chunk: ChunkRef) -> Inserted {
        let mut ring = self.ring.lock();
        if let Some(existing) = Self::find(&ring, chunk.coord()) {
            return Inserted::Existing(existing.clone());
        }
        Inserted::New(Self::push(&mut ring, chunk))
    }

    /// Coordinates currently cached, in slot order.
    #[must_use]
    pub fn coords(&self) -> Vec<ChunkCoord> {
        let ring = self.ring.lock();
        ring.slots.iter().map_while(|s| s.as_ref().map(|c| c.coord())).collect()
    }

    /// Empties every slot and resets the cursor.
    ///
    /// Returns the handles that were resident, each exactly once.
    pub fn drain(&self) -> Vec<ChunkRef> {
        let mut ring = self.ring.lock();
        ring.cursor = 0;
        ring.slots.iter_mut().filter_map(Option::take).collect()
    }

    fn find(ring: &Ring, coord: ChunkCoord) -> Option<&ChunkRef> {
        ring.slots
            .iter()
            .map_while(Option::as_ref)
            .find(|chunk| chunk.coord() == coord)
    }

    fn push(ring: &mut Ring, chunk: ChunkRef) -> Option<ChunkRef> {
        let cursor = ring.cursor;
        let evicted = ring.slots[cursor].replace(chunk);
        ring.cursor = (cursor + 1) % ring.slots.len();
        evicted
    }
}

impl std::fmt::Debug for ChunkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
