//! # VOXSTREAM Procedural Generation
//!
//! Deterministic chunk generation for an unbounded, reproducible voxel world.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed and coordinate always give the same bytes
//! 2. **Chunked**: The world is generated in fixed-size cubic chunks
//! 3. **Stateless**: Nothing here is shared between threads except the seed
//! 4. **Total**: Every coordinate, negative ones included, is generatable
//!
//! ## Core Components
//!
//! - `SimplexNoise`: seeded 2D noise for the heightfield
//! - `ChunkGenerator`: turns a coordinate into a raw `BlockGrid`
//! - `compute_visibility`: the per-block visibility pass
//!
//! ## Example
//!
//! ```rust
//! use voxstream_procedural::{compute_visibility, generate, ChunkCoord, WorldSeed};
//!
//! let mut grid = generate(WorldSeed::new(12345), ChunkCoord::new(0, 0, 0));
//! assert_eq!(grid.visible_count(), 0);
//!
//! // No neighbors loaded yet: the chunk boundary counts as open air
//! let visible = compute_visibility(&mut grid, &[None; 6]);
//! assert_eq!(visible, grid.visible_count());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod chunk;
pub mod noise;
pub mod visibility;

pub use chunk::{
    generate, Block, BlockGrid, BlockType, ChunkCoord, ChunkGenerator, Face, GridError,
    BLOCK_TYPE_MASK, CHUNK_SIZE, CHUNK_VOLUME, VISIBLE_BIT,
};
pub use noise::{SimplexNoise, WorldSeed};
pub use visibility::{compute_visibility, NeighborGrids};
