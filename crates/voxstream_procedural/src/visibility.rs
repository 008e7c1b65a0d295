//! # Visibility Pass
//!
//! Marks which blocks have at least one face exposed to a transparent or
//! missing neighbor. Only those blocks are worth drawing.
//!
//! Blocks on the chunk boundary look into the adjacent chunk's grid. A
//! neighbor chunk that is not available counts as empty space, so the
//! boundary stays visible until the neighbor shows up and the pass is
//! re-run.

use crate::chunk::{BlockGrid, BlockType, Face, CHUNK_SIZE};

/// The six face-adjacent grids of a chunk, indexed by [`Face::index`].
pub type NeighborGrids<'a> = [Option<&'a BlockGrid>; 6];

/// Recomputes every visibility bit in `grid`.
///
/// Returns the number of visible blocks afterwards.
pub fn compute_visibility(grid: &mut BlockGrid, neighbors: &NeighborGrids<'_>) -> usize {
    let mut visible_count = 0;

    for z in 0..CHUNK_SIZE {
        for y in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let view = &*grid;
                let visible = view.kind_at(x, y, z).is_drawable()
                    && Face::ALL.iter().any(|&face| {
                        neighbor_kind(view, neighbors, [x, y, z], face)
                            .map_or(true, BlockType::is_transparent)
                    });

                grid.set_visible(BlockGrid::index(x, y, z), visible);
                visible_count += usize::from(visible);
            }
        }
    }

    visible_count
}

/// Type of the block adjacent to `pos` across `face`, or `None` if that
/// block lives in a neighbor chunk that is not loaded.
fn neighbor_kind(
    grid: &BlockGrid,
    neighbors: &NeighborGrids<'_>,
    pos: [usize; 3],
    face: Face,
) -> Option<BlockType> {
    let offset = face.offset();
    let mut target = [0usize; 3];
    let mut crosses = false;

    for axis in 0..3 {
        let moved = pos[axis] as i32 + offset[axis];
        if moved < 0 {
            target[axis] = CHUNK_SIZE - 1;
            crosses = true;
        } else if moved >= CHUNK_SIZE as i32 {
            target[axis] = 0;
            crosses = true;
        } else {
            target[axis] = moved as usize;
        }
    }

    let [x, y, z] = target;
    if crosses {
        neighbors[face.index()].map(|other| other.kind_at(x, y, z))
    } else {
        Some(grid.kind_at(x, y, z))
    }
}
