//! # World Error Types
//!
//! All errors that can occur while streaming chunks.
//!
//! A cache miss or an already-pending request is NOT an error: it is the
//! normal "not ready yet" state and is reported as `Ok(None)`.

use std::path::PathBuf;

use thiserror::Error;
use voxstream_procedural::{ChunkCoord, GridError};

/// Errors from the persistent chunk store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying file operation failed.
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// File does not start with a valid store header.
    #[error("invalid store header: {0}")]
    BadHeader(String),

    /// A record failed its integrity check.
    #[error("corrupt record at offset {offset}: {reason}")]
    Corrupt {
        /// Byte offset of the record.
        offset: u64,
        /// What was wrong with it.
        reason: String,
    },

    /// `put` for a coordinate that already has a row.
    #[error("chunk {0} already stored")]
    ChunkExists(ChunkCoord),

    /// `update` for a coordinate that has no row.
    #[error("chunk {0} not stored")]
    ChunkMissing(ChunkCoord),

    /// Persisted seed is not an integer.
    #[error("persisted seed is not an integer: {0:?}")]
    InvalidSeed(String),

    /// Stored payload did not decompress.
    #[error("chunk payload failed to decompress: {0}")]
    Decompress(String),

    /// Stored payload decompressed to an invalid grid.
    #[error("stored chunk is not a valid grid: {0}")]
    Grid(#[from] GridError),
}

/// Errors from the request queue.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Queue is at capacity; retry on a later frame.
    #[error("request queue full (capacity {capacity})")]
    Full {
        /// Queue capacity.
        capacity: usize,
    },

    /// The world is shutting down and accepts no more work.
    #[error("request queue closed")]
    Closed,
}

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Config text is not valid TOML for `WorldConfig`.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config parsed but a value is unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors creating or running a world.
#[derive(Error, Debug)]
pub enum WorldError {
    /// Store could not be opened or used.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Request could not be queued.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(std::io::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
