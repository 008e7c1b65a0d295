//! # Shared Chunks
//!
//! A resolved chunk is handed around as a [`ChunkRef`] (`Arc<Chunk>`). The
//! cache, a queued update request, a worker and the render thread may all
//! hold one at once; the block grid is freed when the last handle drops,
//! so a handle taken before eviction stays valid after it.
//!
//! The coordinate never changes. The grid sits behind a read/write lock so
//! the visibility pass can rewrite it while the render thread reads it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use voxstream_procedural::{compute_visibility, Block, BlockGrid, ChunkCoord, Face, NeighborGrids};

/// Shared handle to a resolved chunk.
pub type ChunkRef = Arc<Chunk>;

/// A chunk of the world: coordinate, block grid and dirty flag.
pub struct Chunk {
    coord: ChunkCoord,
    grid: RwLock<BlockGrid>,
    /// True until the visibility pass has run against the current contents.
    dirty: AtomicBool,
}

impl Chunk {
    /// Wraps a grid. New chunks start dirty.
    #[must_use]
    pub fn new(coord: ChunkCoord, grid: BlockGrid) -> Self {
        Self {
            coord,
            grid: RwLock::new(grid),
            dirty: AtomicBool::new(true),
        }
    }

    /// Wraps a grid in a shared handle.
    #[must_use]
    pub fn shared(coord: ChunkCoord, grid: BlockGrid) -> ChunkRef {
        Arc::new(Self::new(coord, grid))
    }

    /// The chunk's coordinate.
    #[inline]
    #[must_use]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// True if visibility data is stale. Dirty chunks should not be drawn.
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Flags the visibility data as stale.
    #[inline]
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Block at a local position, or `None` outside the chunk.
    #[must_use]
    pub fn block(&self, x: usize, y: usize, z: usize) -> Option<Block> {
        self.grid.read().get(x, y, z)
    }

    /// Owned copy of the grid, independent of later updates.
    #[must_use]
    pub fn snapshot(&self) -> BlockGrid {
        self.grid.read().clone()
    }

    /// Serialized grid, as written to the store.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.grid.read().as_bytes().to_vec()
    }

    /// Number of blocks currently flagged visible.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.grid.read().visible_count()
    }

    /// Runs the visibility pass and clears the dirty flag.
    ///
    /// `lookup` supplies the grid of a neighboring chunk, or `None` if it is
    /// not available; it is called once per face before the grid is locked.
    /// Returns the number of visible blocks.
    ///
    /// A neighbor that lands mid-pass re-dirties the chunk and is not lost.
    /// If the pass unwinds, the chunk is left dirty.
    pub fn update<F>(&self, mut lookup: F) -> usize
    where
        F: FnMut(ChunkCoord) -> Option<BlockGrid>,
    {
        self.dirty.store(false, Ordering::Release);
        let guard = DirtyOnUnwind { dirty: &self.dirty };

        let neighbors: Vec<Option<BlockGrid>> = Face::ALL
            .iter()
            .map(|&face| lookup(self.coord.neighbor(face)))
            .collect();

        let mut refs: NeighborGrids<'_> = [None; 6];
        for (slot, grid) in refs.iter_mut().zip(&neighbors) {
            *slot = grid.as_ref();
        }

        let visible = compute_visibility(&mut self.grid.write(), &refs);
        std::mem::forget(guard);
        visible
    }
}

/// Re-flags a chunk as dirty when dropped during an unfinished pass.
struct DirtyOnUnwind<'a> {
    dirty: &'a AtomicBool,
}

impl Drop for DirtyOnUnwind<'_> {
    fn drop(&mut self) {
        self.dirty.store(true, Ordering::Release);
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("coord", &self.coord)
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}
