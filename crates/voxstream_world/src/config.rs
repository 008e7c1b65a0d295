//! # World Configuration
//!
//! Loaded once at startup, from TOML or built in code.
//!
//! ```toml
//! cache_capacity = 128
//! queue_capacity = 512
//! worker_count = 4
//! store_path = "saves/world.vxs"
//!
//! [render]
//! render_distance = 2
//! wireframe = false
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Render distance used by release builds, in chunks.
pub const RENDER_DISTANCE_NEAR: u32 = 1;

/// Render distance used by debug builds, in chunks.
pub const RENDER_DISTANCE_FAR: u32 = 2;

/// Render-affecting flags. Plain configuration, read by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Draw polygon outlines only.
    pub wireframe: bool,
    /// Use per-face instead of smooth shading.
    pub flat_shading: bool,
    /// Radius, in chunks, streamed around the camera.
    pub render_distance: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            wireframe: false,
            flat_shading: false,
            render_distance: if cfg!(debug_assertions) {
                RENDER_DISTANCE_FAR
            } else {
                RENDER_DISTANCE_NEAR
            },
        }
    }
}

/// Configuration for a [`World`](crate::World).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Ring cache slots. Kept small: lookups are a linear scan.
    pub cache_capacity: usize,
    /// Maximum queued requests before `QueueError::Full`.
    pub queue_capacity: usize,
    /// Background worker threads.
    pub worker_count: usize,
    /// Store file. `None` keeps chunks in memory only.
    pub store_path: Option<PathBuf>,
    /// Mark cached neighbors dirty when a new chunk arrives.
    pub refresh_neighbors: bool,
    /// fsync after every store write instead of on shutdown.
    pub sync_writes: bool,
    /// Render flags.
    pub render: RenderSettings,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 128,
            queue_capacity: 512,
            worker_count: 4,
            store_path: None,
            refresh_neighbors: true,
            sync_writes: false,
            render: RenderSettings::default(),
        }
    }
}

impl WorldConfig {
    /// Parses a config from TOML text. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is malformed or invalid.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Rejects values the world cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid("cache_capacity must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".into()));
        }
        if self.worker_count == 0 {
            return Err(ConfigError::Invalid("worker_count must be at least 1".into()));
        }
        Ok(())
    }

    /// Sets the cache capacity.
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Sets the queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub fn with_workers(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Persists chunks to `path`.
    #[must_use]
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Enables or disables neighbor refresh on chunk arrival.
    #[must_use]
    pub fn with_refresh_neighbors(mut self, enabled: bool) -> Self {
        self.refresh_neighbors = enabled;
        self
    }
}
