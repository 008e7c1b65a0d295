//! # Persistence Integration Test
//!
//! Proves a world file brings back the same seed and the same chunks after
//! a restart.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use voxstream_world::{
    BlockType, ChunkCoord, ChunkSource, ChunkStorage, FileStore, World, WorldConfig, WorldEvent,
};

fn temp_path(ext: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("test_world_{id}_{n}.{ext}"))
}

fn kinds(world: &World, coord: ChunkCoord) -> Vec<BlockType> {
    world
        .resolve_chunk(coord)
        .snapshot()
        .iter()
        .map(|(_, block)| block.kind)
        .collect()
}

/// Test: The first seed sticks to the store.
#[test]
fn test_seed_survives_restart() {
    let path = temp_path("vxs");
    let config = WorldConfig::default().with_store_path(&path);

    {
        let world = World::open(10, config.clone()).unwrap();
        assert_eq!(world.seed(), 10);
    }
    {
        let world = World::open(99, config.clone()).unwrap();
        assert_eq!(world.seed(), 10);
    }

    fs::remove_file(&path).ok();
}

/// Test: Chunks come back from the store instead of being regenerated.
#[test]
fn test_chunks_survive_restart() {
    let path = temp_path("vxs");
    let config = WorldConfig::default().with_store_path(&path);
    let coords = [
        ChunkCoord::new(0, 0, 0),
        ChunkCoord::new(0, -1, 0),
        ChunkCoord::new(-4, 2, 9),
    ];

    let before: Vec<_> = {
        let world = World::open(10, config.clone()).unwrap();
        let kinds: Vec<_> = coords.iter().map(|&c| kinds(&world, c)).collect();
        assert_eq!(world.stats().generated, 3);
        let report = world.shutdown();
        assert!(report.store_flushed);
        kinds
    };

    {
        let world = World::open(99, config.clone()).unwrap();
        let events = world.events();
        assert_eq!(world.stored_chunks(), 3);

        let after: Vec<_> = coords.iter().map(|&c| kinds(&world, c)).collect();
        assert_eq!(before, after);

        let stats = world.stats();
        assert_eq!(stats.loaded_from_store, 3);
        assert_eq!(stats.generated, 0);
        assert!(events.try_iter().all(|e| !matches!(
            e,
            WorldEvent::ChunkLoaded { source: ChunkSource::Generated, .. }
        )));
    }

    fs::remove_file(&path).ok();
}

/// Test: A stored world matches a fresh in-memory world with the same seed.
#[test]
fn test_store_and_memory_agree() {
    let path = temp_path("vxs");
    let coord = ChunkCoord::new(3, 0, -2);

    let stored = World::open(2024, WorldConfig::default().with_store_path(&path)).unwrap();
    let memory = World::open(2024, WorldConfig::default()).unwrap();
    assert_eq!(kinds(&stored, coord), kinds(&memory, coord));

    drop(stored);
    fs::remove_file(&path).ok();
}

/// Test: Refreshed visibility is written back to the store.
#[test]
fn test_refresh_is_persisted() {
    let path = temp_path("vxs");
    let config = WorldConfig::default().with_store_path(&path);
    // Deep enough to be solid rock.
    let coord = ChunkCoord::new(0, -4, 0);

    let (generated, refreshed) = {
        let world = World::open(10, config).unwrap();
        let chunk = world.resolve_chunk(coord);
        let generated = chunk.to_bytes();

        // A neighbor arriving dirties the chunk.
        world.resolve_chunk(ChunkCoord::new(0, -4, 1));
        assert!(chunk.is_dirty());

        world.request_chunk_update(&chunk).unwrap();
        assert_eq!(world.run_pending(), 1);
        assert!(!chunk.is_dirty());
        assert_eq!(world.stats().updated, 1);
        (generated, chunk.to_bytes())
    };

    // The neighbor now hides the shared face.
    assert_ne!(generated, refreshed);

    let store = FileStore::open(&path).unwrap();
    assert_eq!(store.get(coord).unwrap().unwrap(), refreshed);

    drop(store);
    fs::remove_file(&path).ok();
}

/// Test: A TOML config file drives the whole setup.
#[test]
fn test_world_from_config_file() {
    let store_path = temp_path("vxs");
    let config_path = temp_path("toml");
    fs::write(
        &config_path,
        format!(
            "cache_capacity = 4\nworker_count = 1\nstore_path = {:?}\n\n[render]\nwireframe = true\n",
            store_path.display().to_string()
        ),
    )
    .unwrap();

    let config = WorldConfig::from_toml_file(&config_path).unwrap();
    assert_eq!(config.cache_capacity, 4);
    assert_eq!(config.store_path.as_deref(), Some(store_path.as_path()));

    let world = World::open(1, config).unwrap();
    assert!(world.render_settings().wireframe);
    for x in 0..6 {
        world.resolve_chunk(ChunkCoord::new(x, 0, 0));
    }
    assert_eq!(world.cached_chunks(), 4);
    assert_eq!(world.stats().evicted, 2);
    assert_eq!(world.stored_chunks(), 6);

    drop(world);
    fs::remove_file(&store_path).ok();
    fs::remove_file(&config_path).ok();
}
