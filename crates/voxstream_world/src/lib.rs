//! # VOXSTREAM World
//!
//! Streams chunks of an unbounded voxel world to a renderer without ever
//! blocking it.
//!
//! ## Design Principles
//!
//! 1. **Non-blocking front**: the render thread only reads the cache and queues work
//! 2. **Bounded memory**: a fixed-size ring cache, evicted first-in first-out
//! 3. **Durable**: every generated chunk is stored, and the seed with it
//! 4. **Isolated workers**: a failing request is logged, not fatal
//!
//! ## Thread Safety
//!
//! The cache, the request queue and the store each guard their own state.
//! Chunks are shared as `Arc` handles; a handle taken from the cache stays
//! valid after the cache evicts it.
//!
//! ## Example
//!
//! ```rust
//! use voxstream_world::{World, WorldConfig};
//!
//! let world = World::open(12345, WorldConfig::default()).unwrap();
//!
//! // Nothing cached yet: the request is queued.
//! assert!(world.request_chunk(0, 0, 0).unwrap().is_none());
//!
//! // Handle it on this thread instead of a worker.
//! world.run_pending();
//! let chunk = world.request_chunk(0, 0, 0).unwrap().unwrap();
//! assert!(!chunk.is_dirty());
//!
//! let report = world.shutdown();
//! assert_eq!(report.chunks_released, 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod cache;
pub mod chunk;
pub mod config;
pub mod error;
pub mod queue;
pub mod store;
mod worker;
pub mod world;

pub use cache::ChunkCache;
pub use chunk::{Chunk, ChunkRef};
pub use config::{RenderSettings, WorldConfig, RENDER_DISTANCE_FAR, RENDER_DISTANCE_NEAR};
pub use error::{ConfigError, QueueError, StoreError, StoreResult, WorldError, WorldResult};
pub use queue::{Enqueued, Request, RequestQueue};
pub use store::{open_storage, ChunkStorage, FileStore, MemoryStore};
pub use world::{ChunkSource, ShutdownReport, StreamFrame, World, WorldEvent, WorldStats};

pub use voxstream_procedural::{Block, BlockGrid, BlockType, ChunkCoord, CHUNK_SIZE};
