//! # World
//!
//! The façade the renderer talks to. Every call made from the render thread
//! returns immediately: a chunk is either cached and handed back, or a
//! request is queued and the caller tries again on a later frame.
//!
//! ## Resolution order
//!
//! 1. **Cache**: hit returns the resident chunk
//! 2. **Store**: a stored grid is decoded and its visibility recomputed
//! 3. **Generate**: the chunk is generated, its visibility computed and the
//!    result written to the store
//!
//! Only workers walk this path. Neighbor grids for the visibility pass come
//! from the cache or the store, never from generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, error, info, warn};
use voxstream_procedural::{BlockGrid, ChunkCoord, ChunkGenerator, Face, WorldSeed};

use crate::cache::{ChunkCache, Inserted};
use crate::chunk::{Chunk, ChunkRef};
use crate::config::{RenderSettings, WorldConfig};
use crate::error::{QueueError, StoreError, WorldResult};
use crate::queue::{Request, RequestQueue};
use crate::store::{open_storage, ChunkStorage};
use crate::worker::{self, WorkerPool};

/// Events buffered for [`World::events`] before new ones are dropped.
const EVENT_CAPACITY: usize = 1024;

/// Largest radius [`World::stream_around`] will walk.
const MAX_STREAM_DISTANCE: u32 = 32;

/// Where a resolved chunk's blocks came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkSource {
    /// Read back from the store.
    Store,
    /// Produced by the generator.
    Generated,
}

/// Notification emitted by the workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorldEvent {
    /// A chunk entered the cache.
    ChunkLoaded {
        /// Chunk coordinate.
        coord: ChunkCoord,
        /// Where its blocks came from.
        source: ChunkSource,
    },
    /// A chunk's visibility was recomputed.
    ChunkUpdated {
        /// Chunk coordinate.
        coord: ChunkCoord,
    },
    /// A chunk left the cache.
    ChunkEvicted {
        /// Chunk coordinate.
        coord: ChunkCoord,
    },
}

/// Counters since the world was opened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldStats {
    /// Chunks produced by the generator.
    pub generated: u64,
    /// Chunks decoded from the store.
    pub loaded_from_store: u64,
    /// Visibility refreshes of cached chunks.
    pub updated: u64,
    /// Chunks pushed out of the cache.
    pub evicted: u64,
    /// Failed store reads or writes.
    pub store_errors: u64,
    /// Requests whose handler panicked.
    pub worker_panics: u64,
    /// Requests refused because the queue was full or closed.
    pub requests_rejected: u64,
}

#[derive(Default)]
pub(crate) struct StatsCounters {
    generated: AtomicU64,
    loaded_from_store: AtomicU64,
    updated: AtomicU64,
    evicted: AtomicU64,
    store_errors: AtomicU64,
    pub(crate) worker_panics: AtomicU64,
    requests_rejected: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> WorldStats {
        WorldStats {
            generated: self.generated.load(Ordering::Relaxed),
            loaded_from_store: self.loaded_from_store.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            worker_panics: self.worker_panics.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Chunks around a position, as seen by one render frame.
#[derive(Debug, Default)]
pub struct StreamFrame {
    /// Clean chunks, safe to draw, in sweep order.
    pub ready: Vec<ChunkRef>,
    /// Chunks not resolved yet.
    pub pending: usize,
    /// Cached chunks waiting for a visibility refresh.
    pub dirty: usize,
    /// Requests the queue refused this frame.
    pub rejected: usize,
}

impl StreamFrame {
    /// True if every chunk in range was ready.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pending == 0 && self.dirty == 0 && self.rejected == 0
    }
}

/// What [`World::shutdown`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Queued requests dropped without running.
    pub discarded_requests: usize,
    /// Worker threads joined.
    pub workers_joined: usize,
    /// Chunks released from the cache.
    pub chunks_released: usize,
    /// Whether the final store sync succeeded.
    pub store_flushed: bool,
}

/// How a freshly built chunk is written back.
#[derive(Clone, Copy, Debug)]
enum Persist {
    Insert,
    Overwrite,
}

/// State shared between the façade and the workers.
pub(crate) struct WorldShared {
    generator: ChunkGenerator,
    pub(crate) cache: ChunkCache,
    pub(crate) queue: RequestQueue,
    store: Arc<dyn ChunkStorage>,
    pub(crate) stats: StatsCounters,
    events: Sender<WorldEvent>,
    refresh_neighbors: bool,
}

impl WorldShared {
    /// Runs one request. Called by workers and by [`World::run_pending`].
    pub(crate) fn handle(&self, request: &Request) {
        match request {
            Request::NewChunk(coord) => {
                self.resolve(*coord);
            }
            Request::UpdateChunk(chunk) => self.refresh(chunk),
        }
    }

    fn resolve(&self, coord: ChunkCoord) -> ChunkRef {
        if let Some(chunk) = self.cache.get(coord) {
            return chunk;
        }

        let (grid, source, persist) = match self.load_stored(coord) {
            Ok(Some(grid)) => {
                self.stats.loaded_from_store.fetch_add(1, Ordering::Relaxed);
                (grid, ChunkSource::Store, None)
            }
            Ok(None) => {
                self.stats.generated.fetch_add(1, Ordering::Relaxed);
                (self.generator.generate(coord), ChunkSource::Generated, Some(Persist::Insert))
            }
            Err(e) => {
                self.stats.store_errors.fetch_add(1, Ordering::Relaxed);
                self.stats.generated.fetch_add(1, Ordering::Relaxed);
                error!(%coord, error = %e, "stored chunk unreadable, regenerating");
                (self.generator.generate(coord), ChunkSource::Generated, Some(Persist::Overwrite))
            }
        };

        let chunk = Chunk::shared(coord, grid);
        let visible = chunk.update(|c| self.neighbor_grid(c));
        if let Some(mode) = persist {
            self.persist(&chunk, mode);
        }

        match self.cache.insert_if_absent(Arc::clone(&chunk)) {
            Inserted::Existing(resident) => return resident,
            Inserted::New(Some(evicted)) => {
                self.stats.evicted.fetch_add(1, Ordering::Relaxed);
                debug!(coord = %evicted.coord(), "chunk evicted");
                self.emit(WorldEvent::ChunkEvicted {
                    coord: evicted.coord(),
                });
            }
            Inserted::New(None) => {}
        }

        if self.refresh_neighbors {
            for face in Face::ALL {
                if let Some(neighbor) = self.cache.get(coord.neighbor(face)) {
                    neighbor.mark_dirty();
                }
            }
        }

        debug!(%coord, ?source, visible, "chunk resolved");
        self.emit(WorldEvent::ChunkLoaded { coord, source });
        chunk
    }

    fn refresh(&self, chunk: &ChunkRef) {
        let visible = chunk.update(|c| self.neighbor_grid(c));
        self.persist(chunk, Persist::Overwrite);
        self.stats.updated.fetch_add(1, Ordering::Relaxed);

        debug!(coord = %chunk.coord(), visible, "chunk refreshed");
        self.emit(WorldEvent::ChunkUpdated {
            coord: chunk.coord(),
        });
    }

    fn load_stored(&self, coord: ChunkCoord) -> Result<Option<BlockGrid>, StoreError> {
        match self.store.get(coord)? {
            Some(bytes) => Ok(Some(BlockGrid::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Neighbor grid for the visibility pass: cache, then store.
    fn neighbor_grid(&self, coord: ChunkCoord) -> Option<BlockGrid> {
        if let Some(chunk) = self.cache.get(coord) {
            return Some(chunk.snapshot());
        }
        match self.load_stored(coord) {
            Ok(grid) => grid,
            Err(e) => {
                debug!(%coord, error = %e, "neighbor unreadable, treating as absent");
                None
            }
        }
    }

    fn persist(&self, chunk: &Chunk, mode: Persist) {
        let coord = chunk.coord();
        let bytes = chunk.to_bytes();

        let result = match mode {
            Persist::Insert => self.store.put(coord, &bytes),
            Persist::Overwrite => match self.store.update(coord, &bytes) {
                Err(StoreError::ChunkMissing(_)) => self.store.put(coord, &bytes),
                other => other,
            },
        };

        match result {
            Ok(()) => {}
            // Another thread resolved the same coordinate first.
            Err(StoreError::ChunkExists(_)) => debug!(%coord, "chunk already stored"),
            Err(e) => {
                self.stats.store_errors.fetch_add(1, Ordering::Relaxed);
                error!(%coord, error = %e, "failed to persist chunk");
            }
        }
    }

    fn emit(&self, event: WorldEvent) {
        if let Err(TrySendError::Full(dropped)) = self.events.try_send(event) {
            debug!(?dropped, "event channel full, dropping event");
        }
    }
}

/// A streamed voxel world.
///
/// Dropping a `World` shuts it down the same way [`World::shutdown`] does.
pub struct World {
    shared: Arc<WorldShared>,
    workers: Option<WorkerPool>,
    worker_count: usize,
    seed: WorldSeed,
    render: RenderSettings,
    events: Receiver<WorldEvent>,
    shut_down: bool,
}

impl World {
    /// Opens a world and starts its workers.
    ///
    /// `seed` is only used if the store has none yet; a persisted seed
    /// always wins.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, an unusable store or a worker that
    /// cannot be spawned.
    pub fn new(seed: u64, config: WorldConfig) -> WorldResult<Self> {
        let mut world = Self::open(seed, config)?;
        world.start()?;
        Ok(world)
    }

    /// Opens a world without starting workers. Queued requests wait until
    /// [`start`](Self::start) or [`run_pending`](Self::run_pending).
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or an unusable store.
    pub fn open(seed: u64, config: WorldConfig) -> WorldResult<Self> {
        config.validate()?;
        let store = open_storage(&config)?;
        Self::with_storage(seed, config, store)
    }

    /// Opens a world on a caller-supplied store, without starting workers.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or if the seed cannot be resolved.
    pub fn with_storage(
        seed: u64,
        config: WorldConfig,
        store: Arc<dyn ChunkStorage>,
    ) -> WorldResult<Self> {
        config.validate()?;

        let resolved = store.resolve_seed(seed)?;
        if resolved != seed {
            info!(requested = seed, persisted = resolved, "using persisted world seed");
        }
        let seed = WorldSeed::new(resolved);

        let (sender, receiver) = crossbeam_channel::bounded(EVENT_CAPACITY);
        let shared = Arc::new(WorldShared {
            generator: ChunkGenerator::new(seed),
            cache: ChunkCache::new(config.cache_capacity),
            queue: RequestQueue::new(config.queue_capacity),
            store,
            stats: StatsCounters::default(),
            events: sender,
            refresh_neighbors: config.refresh_neighbors,
        });

        info!(
            seed = resolved,
            cache_capacity = config.cache_capacity,
            queue_capacity = config.queue_capacity,
            stored_chunks = shared.store.len(),
            "world opened"
        );

        Ok(Self {
            shared,
            workers: None,
            worker_count: config.worker_count,
            seed,
            render: config.render,
            events: receiver,
            shut_down: false,
        })
    }

    /// Spawns the worker threads. Does nothing if they are running.
    ///
    /// # Errors
    ///
    /// [`QueueError::Closed`] after shutdown, or a spawn failure.
    pub fn start(&mut self) -> WorldResult<()> {
        if self.shut_down || self.shared.queue.is_closed() {
            return Err(QueueError::Closed.into());
        }
        if self.workers.is_some() {
            return Ok(());
        }

        let pool = WorkerPool::spawn(self.worker_count, &self.shared)?;
        info!(workers = pool.len(), "world workers started");
        self.workers = Some(pool);
        Ok(())
    }

    /// True while worker threads are running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.workers.is_some()
    }

    /// The seed in effect (the persisted one if the store had it).
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed.value()
    }

    /// Returns the chunk at `(x, y, z)` if cached, otherwise queues it.
    ///
    /// `Ok(None)` means "not ready yet, ask again next frame". Never blocks.
    ///
    /// # Errors
    ///
    /// [`QueueError::Full`] if the request could not be queued this frame,
    /// [`QueueError::Closed`] after shutdown.
    pub fn request_chunk(&self, x: i32, y: i32, z: i32) -> Result<Option<ChunkRef>, QueueError> {
        self.request_chunk_at(ChunkCoord::new(x, y, z))
    }

    /// [`request_chunk`](Self::request_chunk) by coordinate.
    ///
    /// # Errors
    ///
    /// See [`request_chunk`](Self::request_chunk).
    pub fn request_chunk_at(&self, coord: ChunkCoord) -> Result<Option<ChunkRef>, QueueError> {
        if let Some(chunk) = self.shared.cache.get(coord) {
            return Ok(Some(chunk));
        }
        self.enqueue(Request::NewChunk(coord)).map(|()| None)
    }

    /// Queues a visibility refresh for a dirty chunk. Never blocks.
    ///
    /// # Errors
    ///
    /// [`QueueError::Full`] or [`QueueError::Closed`].
    pub fn request_chunk_update(&self, chunk: &ChunkRef) -> Result<(), QueueError> {
        self.enqueue(Request::UpdateChunk(Arc::clone(chunk)))
    }

    /// Cached chunk at `coord`, without queuing anything.
    #[must_use]
    pub fn cached_chunk(&self, coord: ChunkCoord) -> Option<ChunkRef> {
        self.shared.cache.get(coord)
    }

    /// Resolves `coord` on the calling thread: cache, store, then generate.
    ///
    /// Blocks on store I/O and generation; not for the render thread.
    pub fn resolve_chunk(&self, coord: ChunkCoord) -> ChunkRef {
        self.shared.resolve(coord)
    }

    /// Runs queued requests on the calling thread until the queue is empty.
    ///
    /// Returns the number of requests handled.
    pub fn run_pending(&self) -> usize {
        let mut handled = 0;
        while let Some(request) = self.shared.queue.try_pop() {
            worker::run_request(&self.shared, &request);
            handled += 1;
        }
        handled
    }

    /// Requests every chunk within `distance` of `position` in sweep order.
    ///
    /// Sweeps z from far to near, then y and x upward. Dirty chunks get a
    /// refresh queued and are left out of `ready`. Stops early once the
    /// world is shut down.
    pub fn stream_around(&self, position: [f32; 3], distance: u32) -> StreamFrame {
        let center = ChunkCoord::from_world_pos(position[0], position[1], position[2]);
        let d = distance.min(MAX_STREAM_DISTANCE) as i32;
        let mut frame = StreamFrame::default();

        for dz in (-d..=d).rev() {
            for dy in -d..=d {
                for dx in -d..=d {
                    let coord = ChunkCoord::new(
                        center.x.saturating_add(dx),
                        center.y.saturating_add(dy),
                        center.z.saturating_add(dz),
                    );

                    match self.request_chunk_at(coord) {
                        Ok(Some(chunk)) if chunk.is_dirty() => {
                            frame.dirty += 1;
                            if self.request_chunk_update(&chunk).is_err() {
                                frame.rejected += 1;
                            }
                        }
                        Ok(Some(chunk)) => frame.ready.push(chunk),
                        Ok(None) => frame.pending += 1,
                        Err(QueueError::Full { .. }) => frame.rejected += 1,
                        Err(QueueError::Closed) => return frame,
                    }
                }
            }
        }

        frame
    }

    /// Current render flags.
    #[must_use]
    pub fn render_settings(&self) -> RenderSettings {
        self.render
    }

    /// Turns wireframe drawing on or off.
    pub fn set_wireframe(&mut self, enabled: bool) {
        self.render.wireframe = enabled;
    }

    /// Flips wireframe drawing.
    pub fn toggle_wireframe(&mut self) {
        self.render.wireframe = !self.render.wireframe;
    }

    /// Flips flat shading.
    pub fn toggle_flat_shading(&mut self) {
        self.render.flat_shading = !self.render.flat_shading;
    }

    /// Sets the render distance, in chunks.
    pub fn set_render_distance(&mut self, distance: u32) {
        self.render.render_distance = distance;
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> WorldStats {
        self.shared.stats.snapshot()
    }

    /// Receiver for world events. Every clone shares one stream.
    #[must_use]
    pub fn events(&self) -> Receiver<WorldEvent> {
        self.events.clone()
    }

    /// Chunks currently cached.
    #[must_use]
    pub fn cached_chunks(&self) -> usize {
        self.shared.cache.len()
    }

    /// Requests queued and not yet taken by a worker.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.shared.queue.len()
    }

    /// Chunks in the store.
    #[must_use]
    pub fn stored_chunks(&self) -> usize {
        self.shared.store.len()
    }

    /// Stops the workers, releases the cache and syncs the store.
    ///
    /// Requests still queued are dropped; requests being handled finish
    /// first.
    pub fn shutdown(mut self) -> ShutdownReport {
        self.stop()
    }

    fn stop(&mut self) -> ShutdownReport {
        self.shut_down = true;

        let discarded_requests = self.shared.queue.close();
        let workers_joined = self.workers.take().map_or(0, WorkerPool::join);
        let chunks_released = self.shared.cache.drain().len();

        let store_flushed = match self.shared.store.flush() {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "failed to flush chunk store on shutdown");
                false
            }
        };

        let report = ShutdownReport {
            discarded_requests,
            workers_joined,
            chunks_released,
            store_flushed,
        };
        if discarded_requests > 0 {
            warn!(discarded_requests, "dropped queued requests on shutdown");
        }
        info!(?report, "world shut down");
        report
    }

    fn enqueue(&self, request: Request) -> Result<(), QueueError> {
        match self.shared.queue.push(request) {
            Ok(_) => Ok(()),
            Err(e) => {
                self.shared
                    .stats
                    .requests_rejected
                    .fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}

impl Drop for World {
    fn drop(&mut self) {
        if !self.shut_down {
            self.stop();
        }
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("seed", &self.seed.value())
            .field("running", &self.is_running())
            .field("cache", &self.shared.cache)
            .field("render", &self.render)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreResult;
    use crate::store::MemoryStore;
    use std::sync::Weak;
    use voxstream_procedural::BlockType;

    fn paused_world(config: WorldConfig) -> World {
        World::open(42, config).unwrap()
    }

    /// Reads like a memory store; every write fails.
    struct ReadOnlyDisk(MemoryStore);

    impl ReadOnlyDisk {
        fn refuse() -> StoreResult<()> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only disk").into())
        }
    }

    impl ChunkStorage for ReadOnlyDisk {
        fn resolve_seed(&self, requested: u64) -> StoreResult<u64> {
            self.0.resolve_seed(requested)
        }
        fn get(&self, coord: ChunkCoord) -> StoreResult<Option<Vec<u8>>> {
            self.0.get(coord)
        }
        fn put(&self, _: ChunkCoord, _: &[u8]) -> StoreResult<()> {
            Self::refuse()
        }
        fn update(&self, _: ChunkCoord, _: &[u8]) -> StoreResult<()> {
            Self::refuse()
        }
        fn contains(&self, coord: ChunkCoord) -> bool {
            self.0.contains(coord)
        }
        fn len(&self) -> usize {
            self.0.len()
        }
        fn flush(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_first_request_misses_then_hits() {
        let world = paused_world(WorldConfig::default().with_cache_capacity(2));

        assert!(world.request_chunk(0, 0, 0).unwrap().is_none());
        assert_eq!(world.run_pending(), 1);

        let chunk = world.request_chunk(0, 0, 0).unwrap().unwrap();
        assert_eq!(chunk.coord(), ChunkCoord::new(0, 0, 0));
        assert!(!chunk.is_dirty());
        assert_eq!(world.stats().generated, 1);
        assert_eq!(world.stored_chunks(), 1);
    }

    #[test]
    fn test_repeated_requests_queue_once() {
        let world = paused_world(WorldConfig::default());
        for _ in 0..5 {
            assert!(world.request_chunk(3, -1, 2).unwrap().is_none());
        }
        assert_eq!(world.pending_requests(), 1);
    }

    #[test]
    fn test_full_queue_is_reported() {
        let world = paused_world(WorldConfig::default().with_queue_capacity(1));
        world.request_chunk(0, 0, 0).unwrap();
        assert!(matches!(
            world.request_chunk(1, 0, 0),
            Err(QueueError::Full { capacity: 1 })
        ));
        assert_eq!(world.stats().requests_rejected, 1);
    }

    #[test]
    fn test_store_hit_skips_generation() {
        let store: Arc<dyn ChunkStorage> = Arc::new(MemoryStore::new());
        let coord = ChunkCoord::new(0, -3, 0);
        let mut grid = BlockGrid::filled(BlockType::Sand);
        grid.set(0, 0, 0, BlockType::Air);
        store.put(coord, grid.as_bytes()).unwrap();

        let world = World::with_storage(1, WorldConfig::default(), Arc::clone(&store)).unwrap();
        let chunk = world.resolve_chunk(coord);

        assert_eq!(chunk.block(1, 1, 1).unwrap().kind, BlockType::Sand);
        assert_eq!(chunk.block(0, 0, 0).unwrap().kind, BlockType::Air);
        let stats = world.stats();
        assert_eq!(stats.loaded_from_store, 1);
        assert_eq!(stats.generated, 0);
    }

    #[test]
    fn test_unreadable_store_row_is_regenerated() {
        let store: Arc<dyn ChunkStorage> = Arc::new(MemoryStore::new());
        let coord = ChunkCoord::new(2, 0, 2);
        store.put(coord, &[1, 2, 3]).unwrap();

        let world = World::with_storage(7, WorldConfig::default(), Arc::clone(&store)).unwrap();
        let chunk = world.resolve_chunk(coord);

        assert_eq!(chunk.to_bytes().len(), voxstream_procedural::CHUNK_VOLUME);
        assert_eq!(store.get(coord).unwrap().unwrap(), chunk.to_bytes());
        let stats = world.stats();
        assert_eq!(stats.store_errors, 1);
        assert_eq!(stats.generated, 1);
    }

    #[test]
    fn test_failed_write_keeps_chunk_usable() {
        let store: Arc<dyn ChunkStorage> = Arc::new(ReadOnlyDisk(MemoryStore::new()));
        let world = World::with_storage(3, WorldConfig::default(), store).unwrap();

        assert!(world.request_chunk(0, -1, 0).unwrap().is_none());
        world.run_pending();

        let chunk = world.request_chunk(0, -1, 0).unwrap().unwrap();
        assert!(!chunk.is_dirty());
        assert_eq!(world.stored_chunks(), 0);
        let stats = world.stats();
        assert_eq!(stats.generated, 1);
        assert_eq!(stats.store_errors, 1);

        // A refresh still applies when its write fails.
        chunk.mark_dirty();
        world.request_chunk_update(&chunk).unwrap();
        world.run_pending();
        assert!(!chunk.is_dirty());
        assert!(world.cached_chunk(ChunkCoord::new(0, -1, 0)).is_some());
        let stats = world.stats();
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.store_errors, 2);
    }

    #[test]
    fn test_resolves_at_range_edges() {
        let world = paused_world(WorldConfig::default());
        for coord in [
            ChunkCoord::new(i32::MAX, 0, 0),
            ChunkCoord::new(200_000_000, 0, 0),
            ChunkCoord::new(i32::MIN, i32::MIN, i32::MIN),
        ] {
            let chunk = world.resolve_chunk(coord);
            assert_eq!(chunk.coord(), coord);
            assert!(!chunk.is_dirty());
        }

        // Wraps around to the chunk across the edge of the range.
        let across = world.resolve_chunk(ChunkCoord::new(i32::MIN, 0, 0));
        assert!(world.cached_chunk(ChunkCoord::new(i32::MAX, 0, 0)).unwrap().is_dirty());
        assert_eq!(across.coord(), ChunkCoord::new(i32::MIN, 0, 0));
        assert_eq!(world.stats().store_errors, 0);
        assert_eq!(world.stored_chunks(), 4);
    }

    #[test]
    fn test_arrival_dirties_cached_neighbors() {
        let world = paused_world(WorldConfig::default());
        let west = world.resolve_chunk(ChunkCoord::new(-1, 0, 0));
        assert!(!west.is_dirty());

        world.resolve_chunk(ChunkCoord::new(0, 0, 0));
        assert!(west.is_dirty());

        world.request_chunk_update(&west).unwrap();
        world.run_pending();
        assert!(!west.is_dirty());
        assert_eq!(world.stats().updated, 1);
    }

    #[test]
    fn test_neighbor_refresh_can_be_disabled() {
        let world = paused_world(WorldConfig::default().with_refresh_neighbors(false));
        let west = world.resolve_chunk(ChunkCoord::new(-1, 0, 0));
        world.resolve_chunk(ChunkCoord::new(0, 0, 0));
        assert!(!west.is_dirty());
    }

    #[test]
    fn test_eviction_is_counted_and_reported() {
        let world = paused_world(WorldConfig::default().with_cache_capacity(2));
        let events = world.events();

        for x in 0..3 {
            world.resolve_chunk(ChunkCoord::new(x, 0, 0));
        }

        assert_eq!(world.cached_chunks(), 2);
        assert_eq!(world.stats().evicted, 1);
        let evicted: Vec<_> = events
            .try_iter()
            .filter_map(|e| match e {
                WorldEvent::ChunkEvicted { coord } => Some(coord),
                _ => None,
            })
            .collect();
        assert_eq!(evicted, vec![ChunkCoord::new(0, 0, 0)]);
    }

    #[test]
    fn test_stream_around_walks_far_to_near() {
        let world = paused_world(WorldConfig::default());

        let first = world.stream_around([8.0, 8.0, 8.0], 1);
        assert_eq!(first.pending, 27);
        assert!(first.ready.is_empty());
        world.run_pending();

        // Arrivals dirtied earlier neighbors; refresh them.
        let mut frame = world.stream_around([8.0, 8.0, 8.0], 1);
        while !frame.is_complete() {
            world.run_pending();
            frame = world.stream_around([8.0, 8.0, 8.0], 1);
        }

        assert_eq!(frame.ready.len(), 27);
        assert_eq!(frame.ready[0].coord(), ChunkCoord::new(-1, -1, 1));
        assert_eq!(frame.ready[26].coord(), ChunkCoord::new(1, 1, -1));
    }

    #[test]
    fn test_render_settings_toggle() {
        let mut world = paused_world(WorldConfig::default());
        assert!(!world.render_settings().wireframe);

        world.toggle_wireframe();
        world.toggle_flat_shading();
        world.set_render_distance(5);

        let settings = world.render_settings();
        assert!(settings.wireframe);
        assert!(settings.flat_shading);
        assert_eq!(settings.render_distance, 5);

        world.set_wireframe(false);
        assert!(!world.render_settings().wireframe);
        world.set_wireframe(true);
        assert!(world.render_settings().wireframe);
    }

    #[test]
    fn test_shutdown_releases_every_chunk() {
        let world = paused_world(WorldConfig::default().with_cache_capacity(4));
        let weak: Vec<Weak<Chunk>> = (0..4)
            .map(|x| Arc::downgrade(&world.resolve_chunk(ChunkCoord::new(x, 0, 0))))
            .collect();
        world.request_chunk(9, 9, 9).unwrap();

        let report = world.shutdown();
        assert_eq!(report.chunks_released, 4);
        assert_eq!(report.discarded_requests, 1);
        assert_eq!(report.workers_joined, 0);
        assert!(report.store_flushed);
        assert!(weak.iter().all(|w| w.upgrade().is_none()));
    }
}
