use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

const MIN_ACTIVE_CHUNK_RADIUS: i32 = 1;
const MAX_ACTIVE_CHUNK_RADIUS: i32 = 32;
const MAX_FLUSH_CHUNK_RADIUS: i32 = MAX_ACTIVE_CHUNK_RADIUS + 8;
const MIN_MAX_CHUNKS: usize = 1;
const MAX_MAX_CHUNKS: usize = 16_384;
const MIN_HANDOFF_CAPACITY: usize = 1;
const MAX_ENEMIES: usize = 10_000;
const MIN_GENERATION_THREADS: usize = 1;
const MAX_GENERATION_THREADS: usize = 64;
const MIN_TICK_RATE: u32 = 1;
const MAX_TICK_RATE: u32 = 240;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,
    /// Chunks whose centre is closer than this many chunks to an observer
    /// get activated.
    #[serde(default = "default_active_chunk_radius")]
    pub active_chunk_radius: i32,
    /// Chunks farther than this from every observer get saved and dropped.
    /// Always larger than `active_chunk_radius`.
    #[serde(default = "default_flush_chunk_radius")]
    pub flush_chunk_radius: i32,
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
    #[serde(default = "default_handoff_capacity")]
    pub handoff_capacity: usize,
    #[serde(default = "default_max_enemies")]
    pub max_enemies: usize,
    #[serde(default = "default_generation_threads")]
    pub generation_threads: usize,
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            save_dir: default_save_dir(),
            active_chunk_radius: default_active_chunk_radius(),
            flush_chunk_radius: default_flush_chunk_radius(),
            max_chunks: default_max_chunks(),
            handoff_capacity: default_handoff_capacity(),
            max_enemies: default_max_enemies(),
            generation_threads: default_generation_threads(),
            tick_rate: default_tick_rate(),
        }
    }
}

impl WorldConfig {
    pub fn sanitize(mut self) -> Self {
        self.active_chunk_radius = self
            .active_chunk_radius
            .clamp(MIN_ACTIVE_CHUNK_RADIUS, MAX_ACTIVE_CHUNK_RADIUS);
        self.flush_chunk_radius = self
            .flush_chunk_radius
            .clamp(self.active_chunk_radius + 1, MAX_FLUSH_CHUNK_RADIUS);
        self.max_chunks = self.max_chunks.clamp(MIN_MAX_CHUNKS, MAX_MAX_CHUNKS);
        self.handoff_capacity = self.handoff_capacity.clamp(MIN_HANDOFF_CAPACITY, self.max_chunks);
        self.max_enemies = self.max_enemies.min(MAX_ENEMIES);
        self.generation_threads = self
            .generation_threads
            .clamp(MIN_GENERATION_THREADS, MAX_GENERATION_THREADS);
        self.tick_rate = self.tick_rate.clamp(MIN_TICK_RATE, MAX_TICK_RATE);
        self
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let parsed = toml::from_str::<Self>(&contents).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to deserialize world config: {e}"),
            )
        })?;
        Ok(parsed.sanitize())
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let config = self.clone().sanitize();
        let serialized = toml::to_string_pretty(&config).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to serialize world config: {e}"),
            )
        })?;
        fs::write(path, serialized)
    }

    pub fn activation_radius_squared(&self) -> f32 {
        radius_in_blocks_squared(self.active_chunk_radius)
    }

    pub fn flush_radius_squared(&self) -> f32 {
        radius_in_blocks_squared(self.flush_chunk_radius)
    }
}

fn radius_in_blocks_squared(chunks: i32) -> f32 {
    let blocks = (chunks * quarry_shared::coords::CHUNK_SIZE_X as i32) as f32;
    blocks * blocks
}

fn default_seed() -> u64 {
    0
}

fn default_save_dir() -> PathBuf {
    PathBuf::from("saves/world")
}

fn default_active_chunk_radius() -> i32 {
    8
}

fn default_flush_chunk_radius() -> i32 {
    10
}

fn default_max_chunks() -> usize {
    768
}

fn default_handoff_capacity() -> usize {
    768
}

fn default_max_enemies() -> usize {
    100
}

fn default_generation_threads() -> usize {
    2
}

fn default_tick_rate() -> u32 {
    60
}

pub fn load_or_create_config(path: &Path) -> WorldConfig {
    match WorldConfig::load(path) {
        Ok(config) => config,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let config = WorldConfig::default();
            if let Err(save_err) = config.save(path) {
                warn!(
                    "Failed to create default config at {}: {save_err}",
                    path.display()
                );
            }
            config
        }
        Err(err) => {
            warn!("Failed to load config from {}: {err}", path.display());
            WorldConfig::default()
        }
    }
}
