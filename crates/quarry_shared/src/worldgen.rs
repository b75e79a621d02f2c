use noise::{NoiseFn, Perlin};

use crate::block::BlockType;
use crate::chunk::ChunkProxy;
use crate::coords::{
    chunk_to_world, local_to_index, LocalPos, CHUNK_HEIGHT, CHUNK_SIZE_X, CHUNK_SIZE_Y,
};

pub const GROUND_HEIGHT: i32 = 70;
pub const SEA_LEVEL: usize = CHUNK_HEIGHT / 2;
const HEIGHT_VARIATION: f64 = 30.0;
const NOISE_SCALE: f64 = 125.0;
const NOISE_OCTAVES: u32 = 4;
const OCTAVE_PERSISTENCE: f64 = 0.5;
const DIRT_DEPTH: i32 = 4;

/// Deterministic terrain generator: one height per world column, then fixed
/// bands of grass, dirt, stone and bedrock, with sand and water at sea level.
#[derive(Clone)]
pub struct WorldGenerator {
    pub seed: u64,
    terrain: Perlin,
}

impl WorldGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            terrain: Perlin::new(seed as u32),
        }
    }

    /// Fractal noise in roughly `[-1, 1]` for a world column.
    fn column_noise(&self, world_x: i32, world_y: i32) -> f64 {
        let mut frequency = 1.0 / NOISE_SCALE;
        let mut amplitude = 1.0;
        let mut total = 0.0;
        let mut total_amplitude = 0.0;

        for _ in 0..NOISE_OCTAVES {
            total += self
                .terrain
                .get([world_x as f64 * frequency, world_y as f64 * frequency])
                * amplitude;
            total_amplitude += amplitude;
            amplitude *= OCTAVE_PERSISTENCE;
            frequency *= 2.0;
        }

        (total / total_amplitude).clamp(-1.0, 1.0)
    }

    /// Height of the grass layer for a world column.
    pub fn surface_height(&self, world_x: i32, world_y: i32) -> i32 {
        let offset = self.column_noise(world_x, world_y) * HEIGHT_VARIATION;
        (GROUND_HEIGHT + offset as i32).clamp(1, CHUNK_HEIGHT as i32 - 1)
    }

    /// Overwrites every block type in `proxy` with generated terrain for its
    /// coordinate.
    pub fn populate(&self, proxy: &mut ChunkProxy) {
        let coords = proxy.coords;

        for y in 0..CHUNK_SIZE_Y {
            for x in 0..CHUNK_SIZE_X {
                let world = chunk_to_world(coords, LocalPos::new(x as u8, y as u8, 0));
                let height = self.surface_height(world.x, world.y);

                for z in 0..CHUNK_HEIGHT {
                    let block_type = band_for(z as i32, height);
                    proxy.block_types[local_to_index(LocalPos::new(x as u8, y as u8, z as u8))] =
                        block_type;
                }
            }
        }
    }
}

fn band_for(z: i32, height: i32) -> BlockType {
    let layer = if z == height {
        BlockType::GRASS
    } else if z < height && z >= height - DIRT_DEPTH {
        BlockType::DIRT
    } else if z < height - DIRT_DEPTH && z > 0 {
        BlockType::STONE
    } else if z == 0 {
        BlockType::BEDROCK
    } else {
        BlockType::AIR
    };

    let z = z as usize;
    if z <= SEA_LEVEL && (layer == BlockType::GRASS || layer == BlockType::DIRT) {
        BlockType::SAND
    } else if z < SEA_LEVEL && layer == BlockType::AIR {
        BlockType::WATER
    } else {
        layer
    }
}
