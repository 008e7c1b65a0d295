//! # Chunk Format
//!
//! The world is cut into cubic chunks of `CHUNK_SIZE`³ blocks, addressed by
//! a signed integer triple. Chunks are generated independently, so any
//! coordinate can be produced on demand in any order.
//!
//! ## Block Encoding
//!
//! One byte per block:
//!
//! ```text
//! bit 7      : visible (set by the visibility pass)
//! bits 0..=6 : block type
//! ```
//!
//! The grid is laid out `z`-major: `index = z * S² + y * S + x`.

use std::fmt;

use thiserror::Error;

use crate::noise::{SimplexNoise, WorldSeed};

/// Chunk edge length in blocks.
pub const CHUNK_SIZE: usize = 16;

/// Blocks per chunk, and the byte length of a serialized grid.
pub const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;

/// Visibility flag bit within a block byte.
pub const VISIBLE_BIT: u8 = 0x80;

/// Block type bits within a block byte.
pub const BLOCK_TYPE_MASK: u8 = 0x7F;

/// Chunk coordinate (position on the chunk grid, not in blocks).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// X coordinate (in chunks).
    pub x: i32,
    /// Y coordinate (in chunks).
    pub y: i32,
    /// Z coordinate (in chunks).
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk containing the given block position.
    #[inline]
    #[must_use]
    pub const fn from_block_pos(block_x: i32, block_y: i32, block_z: i32) -> Self {
        let size = CHUNK_SIZE as i32;
        Self {
            x: block_x.div_euclid(size),
            y: block_y.div_euclid(size),
            z: block_z.div_euclid(size),
        }
    }

    /// Chunk containing a continuous world-space position.
    #[must_use]
    pub fn from_world_pos(world_x: f32, world_y: f32, world_z: f32) -> Self {
        let size = CHUNK_SIZE as f32;
        Self {
            x: (world_x / size).floor() as i32,
            y: (world_y / size).floor() as i32,
            z: (world_z / size).floor() as i32,
        }
    }

    /// Block position of this chunk's minimum corner.
    ///
    /// Widened to `i64`: the far chunks of the `i32` range sit past
    /// `i32::MAX` in block space.
    #[inline]
    #[must_use]
    pub const fn origin(self) -> [i64; 3] {
        let size = CHUNK_SIZE as i64;
        [self.x as i64 * size, self.y as i64 * size, self.z as i64 * size]
    }

    /// The face-adjacent chunk in direction `face`.
    ///
    /// Wraps at the edge of the coordinate range.
    #[inline]
    #[must_use]
    pub const fn neighbor(self, face: Face) -> Self {
        let [dx, dy, dz] = face.offset();
        Self::new(
            self.x.wrapping_add(dx),
            self.y.wrapping_add(dy),
            self.z.wrapping_add(dz),
        )
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// One of the six axis-aligned directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    /// -X
    West,
    /// +X
    East,
    /// -Y
    Down,
    /// +Y
    Up,
    /// -Z
    North,
    /// +Z
    South,
}

impl Face {
    /// All faces, in a fixed order usable as an array index.
    pub const ALL: [Face; 6] = [
        Face::West,
        Face::East,
        Face::Down,
        Face::Up,
        Face::North,
        Face::South,
    ];

    /// Unit step along this face.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> [i32; 3] {
        match self {
            Face::West => [-1, 0, 0],
            Face::East => [1, 0, 0],
            Face::Down => [0, -1, 0],
            Face::Up => [0, 1, 0],
            Face::North => [0, 0, -1],
            Face::South => [0, 0, 1],
        }
    }

    /// Position of this face in [`Face::ALL`].
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The face pointing the other way.
    #[inline]
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Face::West => Face::East,
            Face::East => Face::West,
            Face::Down => Face::Up,
            Face::Up => Face::Down,
            Face::North => Face::South,
            Face::South => Face::North,
        }
    }
}

/// Block types. Values are the low seven bits of a block byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockType {
    /// Empty space.
    Air = 0,
    /// Stone.
    Stone = 1,
    /// Dirt.
    Dirt = 2,
    /// Grass-topped dirt.
    Grass = 3,
    /// Sand.
    Sand = 4,
    /// Water.
    Water = 5,
    /// Snow.
    Snow = 6,
    /// Gravel.
    Gravel = 7,
}

impl BlockType {
    /// Decodes type bits; `None` for values no block type uses.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits & BLOCK_TYPE_MASK {
            0 => Some(Self::Air),
            1 => Some(Self::Stone),
            2 => Some(Self::Dirt),
            3 => Some(Self::Grass),
            4 => Some(Self::Sand),
            5 => Some(Self::Water),
            6 => Some(Self::Snow),
            7 => Some(Self::Gravel),
            _ => None,
        }
    }

    /// True if neighbors can be seen through this block.
    #[inline]
    #[must_use]
    pub const fn is_transparent(self) -> bool {
        matches!(self, Self::Air | Self::Water)
    }

    /// True if this block has anything to draw.
    #[inline]
    #[must_use]
    pub const fn is_drawable(self) -> bool {
        !matches!(self, Self::Air)
    }
}

/// A decoded block: type plus visibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    /// Block type.
    pub kind: BlockType,
    /// Whether the block has at least one face exposed.
    pub visible: bool,
}

impl Block {
    #[inline]
    fn from_byte(byte: u8) -> Self {
        Self {
            // grids only ever hold validated type bits
            kind: BlockType::from_bits(byte).unwrap_or(BlockType::Air),
            visible: byte & VISIBLE_BIT != 0,
        }
    }
}

/// Errors decoding a serialized block grid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    /// Payload is not exactly `CHUNK_VOLUME` bytes.
    #[error("block grid must be {expected} bytes, got {actual}")]
    WrongLength {
        /// Required length.
        expected: usize,
        /// Length received.
        actual: usize,
    },

    /// A byte carries type bits no block type uses.
    #[error("unknown block type {value} at index {index}")]
    UnknownBlock {
        /// Byte index in the grid.
        index: usize,
        /// Offending type bits.
        value: u8,
    },
}

/// A chunk's blocks: `CHUNK_VOLUME` bytes, heap allocated.
#[derive(Clone, PartialEq, Eq)]
pub struct BlockGrid {
    bytes: Box<[u8]>,
}

impl BlockGrid {
    /// A grid of air.
    #[must_use]
    pub fn empty() -> Self {
        Self::filled(BlockType::Air)
    }

    /// A grid where every block is `kind`, no visibility bits set.
    #[must_use]
    pub fn filled(kind: BlockType) -> Self {
        Self {
            bytes: vec![kind as u8; CHUNK_VOLUME].into_boxed_slice(),
        }
    }

    /// Decodes a serialized grid, keeping stored visibility bits.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] if the length is wrong or a type is unknown.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GridError> {
        if bytes.len() != CHUNK_VOLUME {
            return Err(GridError::WrongLength {
                expected: CHUNK_VOLUME,
                actual: bytes.len(),
            });
        }
        if let Some(index) = bytes.iter().position(|b| BlockType::from_bits(*b).is_none()) {
            return Err(GridError::UnknownBlock {
                index,
                value: bytes[index] & BLOCK_TYPE_MASK,
            });
        }
        Ok(Self {
            bytes: bytes.into(),
        })
    }

    /// Raw bytes, as persisted.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Linear index of a local position. Caller guarantees bounds.
    #[inline]
    #[must_use]
    pub const fn index(x: usize, y: usize, z: usize) -> usize {
        z * CHUNK_SIZE * CHUNK_SIZE + y * CHUNK_SIZE + x
    }

    /// Block at a local position, or `None` outside the chunk.
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<Block> {
        if x < CHUNK_SIZE && y < CHUNK_SIZE && z < CHUNK_SIZE {
            Some(Block::from_byte(self.bytes[Self::index(x, y, z)]))
        } else {
            None
        }
    }

    /// Block type at a local position (bounds unchecked beyond the slice).
    #[inline]
    #[must_use]
    pub fn kind_at(&self, x: usize, y: usize, z: usize) -> BlockType {
        Block::from_byte(self.bytes[Self::index(x, y, z)]).kind
    }

    /// Sets the type at a local position and clears its visibility bit.
    ///
    /// Out-of-range positions are ignored.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, kind: BlockType) {
        if x < CHUNK_SIZE && y < CHUNK_SIZE && z < CHUNK_SIZE {
            self.bytes[Self::index(x, y, z)] = kind as u8;
        }
    }

    /// Sets or clears the visibility bit at a linear index.
    #[inline]
    pub fn set_visible(&mut self, index: usize, visible: bool) {
        if visible {
            self.bytes[index] |= VISIBLE_BIT;
        } else {
            self.bytes[index] &= BLOCK_TYPE_MASK;
        }
    }

    /// Number of blocks with the visibility bit set.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.bytes.iter().filter(|b| **b & VISIBLE_BIT != 0).count()
    }

    /// Every block with its local position, in storage order.
    pub fn iter(&self) -> impl Iterator<Item = ([usize; 3], Block)> + '_ {
        self.bytes.iter().enumerate().map(|(i, byte)| {
            let x = i % CHUNK_SIZE;
            let y = (i / CHUNK_SIZE) % CHUNK_SIZE;
            let z = i / (CHUNK_SIZE * CHUNK_SIZE);
            ([x, y, z], Block::from_byte(*byte))
        })
    }
}

impl fmt::Debug for BlockGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockGrid")
            .field("len", &self.bytes.len())
            .field("visible", &self.visible_count())
            .finish()
    }
}

/// Chunk generator using seeded noise.
///
/// Terrain is a heightfield: each column gets a surface height from
/// octaved simplex noise, filled with stone, a dirt band, and a surface
/// block chosen by height. Open space below sea level is water.
pub struct ChunkGenerator {
    seed: WorldSeed,
    height_noise: SimplexNoise,
    roughness_noise: SimplexNoise,
}

impl ChunkGenerator {
    /// Sea level (block Y).
    pub const SEA_LEVEL: i64 = 0;

    /// Peak deviation of the surface from sea level, in blocks.
    const HEIGHT_AMPLITUDE: f64 = 24.0;

    /// Horizontal scale of the heightfield.
    const HEIGHT_FREQUENCY: f64 = 0.008;

    /// Surface above this many blocks over sea level is snow.
    const SNOW_LINE: i64 = 18;

    /// Depth of the dirt band under the surface.
    const DIRT_DEPTH: i64 = 3;

    /// Creates a new chunk generator.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self {
            seed,
            height_noise: SimplexNoise::new(seed.derive(1)),
            roughness_noise: SimplexNoise::new(seed.derive(2)),
        }
    }

    /// The seed this generator was built from.
    #[must_use]
    pub const fn seed(&self) -> WorldSeed {
        self.seed
    }

    /// Surface height (block Y) of the column at world `(x, z)`.
    #[must_use]
    pub fn surface_height(&self, block_x: i64, block_z: i64) -> i64 {
        let fx = block_x as f64 * Self::HEIGHT_FREQUENCY;
        let fz = block_z as f64 * Self::HEIGHT_FREQUENCY;

        let base = self.height_noise.octaved(fx, fz, 4, 0.5, 2.0);
        // Roughness widens the range in hilly regions
        let rough = (self.roughness_noise.sample(fx * 0.5, fz * 0.5) + 1.0) * 0.5;
        let amplitude = Self::HEIGHT_AMPLITUDE * (0.4 + rough);

        Self::SEA_LEVEL + (base * amplitude).round() as i64
    }

    /// Generates the raw block grid of one chunk. No visibility bits are set.
    #[must_use]
    pub fn generate(&self, coord: ChunkCoord) -> BlockGrid {
        let mut grid = BlockGrid::empty();
        let [origin_x, origin_y, origin_z] = coord.origin();

        for local_z in 0..CHUNK_SIZE {
            for local_x in 0..CHUNK_SIZE {
                let block_x = origin_x + local_x as i64;
                let block_z = origin_z + local_z as i64;
                let height = self.surface_height(block_x, block_z);

                for local_y in 0..CHUNK_SIZE {
                    let block_y = origin_y + local_y as i64;
                    let kind = self.block_at(block_x, block_y, block_z, height);
                    if kind != BlockType::Air {
                        grid.set(local_x, local_y, local_z, kind);
                    }
                }
            }
        }

        grid
    }

    /// Block type at a world position given its column's surface height.
    fn block_at(&self, block_x: i64, block_y: i64, block_z: i64, height: i64) -> BlockType {
        if block_y > height {
            return if block_y <= Self::SEA_LEVEL {
                BlockType::Water
            } else {
                BlockType::Air
            };
        }

        let near_water = height <= Self::SEA_LEVEL + 1;
        if block_y == height {
            return if near_water {
                BlockType::Sand
            } else if height - Self::SEA_LEVEL > Self::SNOW_LINE {
                BlockType::Snow
            } else {
                BlockType::Grass
            };
        }

        if block_y > height - Self::DIRT_DEPTH {
            return if near_water { BlockType::Sand } else { BlockType::Dirt };
        }

        // Sparse gravel pockets in the stone layer
        if self.seed.hash3(block_x, block_y, block_z) % 64 == 0 {
            BlockType::Gravel
        } else {
            BlockType::Stone
        }
    }
}

/// Generates the raw block grid for `coord` under `seed`.
///
/// Pure and total: identical inputs always give byte-identical grids.
#[must_use]
pub fn generate(seed: WorldSeed, coord: ChunkCoord) -> BlockGrid {
    ChunkGenerator::new(seed).generate(coord)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_coord_from_block() {
        assert_eq!(ChunkCoord::from_block_pos(0, 0, 0), ChunkCoord::new(0, 0, 0));
        assert_eq!(ChunkCoord::from_block_pos(15, 15, 15), ChunkCoord::new(0, 0, 0));
        assert_eq!(ChunkCoord::from_block_pos(16, 16, 16), ChunkCoord::new(1, 1, 1));
        assert_eq!(ChunkCoord::from_block_pos(-1, -1, -1), ChunkCoord::new(-1, -1, -1));
        assert_eq!(ChunkCoord::from_block_pos(-16, 0, -17), ChunkCoord::new(-1, 0, -2));
    }

    #[test]
    fn test_chunk_coord_from_world_pos_floors() {
        assert_eq!(ChunkCoord::from_world_pos(0.5, 15.9, 16.0), ChunkCoord::new(0, 0, 1));
        assert_eq!(ChunkCoord::from_world_pos(-0.1, -16.0, -16.1), ChunkCoord::new(-1, -1, -2));
    }

    #[test]
    fn test_faces_round_trip() {
        let coord = ChunkCoord::new(3, -2, 7);
        for face in Face::ALL {
            assert_eq!(coord.neighbor(face).neighbor(face.opposite()), coord);
            assert_eq!(Face::ALL[face.index()], face);
        }
    }

    #[test]
    fn test_block_byte_encoding() {
        let mut grid = BlockGrid::empty();
        grid.set(1, 2, 3, BlockType::Stone);
        let index = BlockGrid::index(1, 2, 3);
        grid.set_visible(index, true);

        assert_eq!(grid.as_bytes()[index], VISIBLE_BIT | BlockType::Stone as u8);
        assert_eq!(
            grid.get(1, 2, 3),
            Some(Block { kind: BlockType::Stone, visible: true })
        );

        grid.set_visible(index, false);
        assert_eq!(grid.as_bytes()[index], BlockType::Stone as u8);
        assert_eq!(grid.get(CHUNK_SIZE, 0, 0), None);
    }

    #[test]
    fn test_from_bytes_validation() {
        assert_eq!(
            BlockGrid::from_bytes(&[0u8; 10]),
            Err(GridError::WrongLength { expected: CHUNK_VOLUME, actual: 10 })
        );

        let mut bytes = vec![0u8; CHUNK_VOLUME];
        bytes[42] = 0x7E;
        assert_eq!(
            BlockGrid::from_bytes(&bytes),
            Err(GridError::UnknownBlock { index: 42, value: 0x7E })
        );

        bytes[42] = VISIBLE_BIT | BlockType::Grass as u8;
        let grid = BlockGrid::from_bytes(&bytes).unwrap();
        assert_eq!(grid.visible_count(), 1);
    }

    #[test]
    fn test_iter_positions_match_index() {
        let mut grid = BlockGrid::empty();
        grid.set(5, 9, 14, BlockType::Sand);
        let found: Vec<_> = grid
            .iter()
            .filter(|(_, block)| block.kind == BlockType::Sand)
            .map(|(pos, _)| pos)
            .collect();
        assert_eq!(found, vec![[5, 9, 14]]);
    }

    #[test]
    fn test_generation_determinism() {
        let gen1 = ChunkGenerator::new(WorldSeed::new(42));
        let gen2 = ChunkGenerator::new(WorldSeed::new(42));

        for coord in [
            ChunkCoord::new(0, 0, 0),
            ChunkCoord::new(5, -1, 10),
            ChunkCoord::new(-7, 0, -3),
            ChunkCoord::new(-1000, 2, 999),
        ] {
            assert_eq!(gen1.generate(coord), gen2.generate(coord), "mismatch at {coord}");
        }
    }

    #[test]
    fn test_generation_at_range_edges() {
        let gen = ChunkGenerator::new(WorldSeed::new(42));
        for coord in [
            ChunkCoord::new(i32::MAX, i32::MAX, i32::MAX),
            ChunkCoord::new(i32::MIN, i32::MIN, i32::MIN),
            ChunkCoord::new(200_000_000, 0, -200_000_000),
        ] {
            assert_eq!(gen.generate(coord), gen.generate(coord), "mismatch at {coord}");
        }
    }

    #[test]
    fn test_neighbors_wrap_at_range_edges() {
        let max = ChunkCoord::new(i32::MAX, 0, i32::MIN);
        assert_eq!(max.neighbor(Face::East), ChunkCoord::new(i32::MIN, 0, i32::MIN));
        assert_eq!(max.neighbor(Face::North), ChunkCoord::new(i32::MAX, 0, i32::MAX));
        for face in Face::ALL {
            assert_eq!(max.neighbor(face).neighbor(face.opposite()), max);
        }
        assert_eq!(max.origin(), [i64::from(i32::MAX) * 16, 0, i64::from(i32::MIN) * 16]);
    }

    #[test]
    fn test_generation_sets_no_visibility() {
        let grid = generate(WorldSeed::new(9), ChunkCoord::new(0, -1, 0));
        assert_eq!(grid.visible_count(), 0);
    }

    #[test]
    fn test_deep_chunks_are_solid_and_sky_is_empty() {
        let gen = ChunkGenerator::new(WorldSeed::new(42));

        let deep = gen.generate(ChunkCoord::new(0, -20, 0));
        assert!(deep.iter().all(|(_, b)| b.kind != BlockType::Air && b.kind != BlockType::Water));

        let sky = gen.generate(ChunkCoord::new(0, 20, 0));
        assert!(sky.iter().all(|(_, b)| b.kind == BlockType::Air));
    }

    #[test]
    fn test_seed_changes_terrain() {
        let a = ChunkGenerator::new(WorldSeed::new(1));
        let b = ChunkGenerator::new(WorldSeed::new(2));
        let differs = (0..16).any(|i| {
            let coord = ChunkCoord::new(i, 0, -i);
            a.generate(coord) != b.generate(coord)
        });
        assert!(differs, "different seeds should give different terrain");
    }
}
