use std::ops::{Add, Sub};

use glam::{IVec3, Vec2, Vec3};
use serde::{Deserialize, Serialize};

pub const CHUNK_BITS_X: u32 = 4;
pub const CHUNK_BITS_Y: u32 = 4;
pub const CHUNK_BITS_Z: u32 = 7;
pub const CHUNK_BITS_PER_LAYER: u32 = CHUNK_BITS_X + CHUNK_BITS_Y;

pub const CHUNK_SIZE_X: usize = 1 << CHUNK_BITS_X;
pub const CHUNK_SIZE_Y: usize = 1 << CHUNK_BITS_Y;
pub const CHUNK_HEIGHT: usize = 1 << CHUNK_BITS_Z;
pub const BLOCKS_PER_LAYER: usize = 1 << CHUNK_BITS_PER_LAYER;
pub const CHUNK_VOLUME: usize = 1 << (CHUNK_BITS_PER_LAYER + CHUNK_BITS_Z);

pub const X_MASK: usize = CHUNK_SIZE_X - 1;
pub const Y_MASK: usize = CHUNK_SIZE_Y - 1;
pub const Z_MASK: usize = CHUNK_HEIGHT - 1;

/// Horizontal grid coordinate of a chunk. Chunks span the full world height,
/// so there is no vertical component.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl LocalPos {
    pub const fn new(x: u8, y: u8, z: u8) -> Self {
        Self { x, y, z }
    }
}

impl Add for ChunkPos {
    type Output = ChunkPos;

    fn add(self, rhs: Self) -> Self::Output {
        ChunkPos {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Sub for ChunkPos {
    type Output = ChunkPos;

    fn sub(self, rhs: Self) -> Self::Output {
        ChunkPos {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

pub fn local_to_index(local: LocalPos) -> usize {
    (usize::from(local.z) << CHUNK_BITS_PER_LAYER)
        | (usize::from(local.y) << CHUNK_BITS_X)
        | usize::from(local.x)
}

pub fn index_to_local(index: usize) -> LocalPos {
    debug_assert!(index < CHUNK_VOLUME, "chunk index out of bounds: {index}");

    LocalPos {
        x: (index & X_MASK) as u8,
        y: ((index >> CHUNK_BITS_X) & Y_MASK) as u8,
        z: ((index >> CHUNK_BITS_PER_LAYER) & Z_MASK) as u8,
    }
}

/// Chunk containing a world-space point. Only x and y matter.
pub fn world_to_chunk(world_pos: Vec3) -> ChunkPos {
    ChunkPos {
        x: (world_pos.x.floor() as i32) >> CHUNK_BITS_X,
        y: (world_pos.y.floor() as i32) >> CHUNK_BITS_Y,
    }
}

/// Splits an integer block coordinate into its chunk and local parts. Returns
/// `None` above or below the world.
pub fn block_to_chunk(block: IVec3) -> Option<(ChunkPos, LocalPos)> {
    if block.z < 0 || block.z >= CHUNK_HEIGHT as i32 {
        return None;
    }

    let chunk = ChunkPos {
        x: block.x >> CHUNK_BITS_X,
        y: block.y >> CHUNK_BITS_Y,
    };
    let local = LocalPos {
        x: (block.x & X_MASK as i32) as u8,
        y: (block.y & Y_MASK as i32) as u8,
        z: block.z as u8,
    };
    Some((chunk, local))
}

pub fn chunk_origin(chunk: ChunkPos) -> IVec3 {
    IVec3::new(chunk.x << CHUNK_BITS_X, chunk.y << CHUNK_BITS_Y, 0)
}

pub fn chunk_centre(chunk: ChunkPos) -> Vec2 {
    Vec2::new(
        ((chunk.x << CHUNK_BITS_X) + (CHUNK_SIZE_X as i32 / 2)) as f32,
        ((chunk.y << CHUNK_BITS_Y) + (CHUNK_SIZE_Y as i32 / 2)) as f32,
    )
}

pub fn chunk_to_world(chunk: ChunkPos, local: LocalPos) -> IVec3 {
    chunk_origin(chunk) + IVec3::new(i32::from(local.x), i32::from(local.y), i32::from(local.z))
}

pub fn block_world_coords(chunk: ChunkPos, index: usize) -> IVec3 {
    chunk_to_world(chunk, index_to_local(index))
}

pub fn is_east_edge(index: usize) -> bool {
    index & X_MASK == X_MASK
}

pub fn is_west_edge(index: usize) -> bool {
    index & X_MASK == 0
}

pub fn is_north_edge(index: usize) -> bool {
    (index >> CHUNK_BITS_X) & Y_MASK == Y_MASK
}

pub fn is_south_edge(index: usize) -> bool {
    (index >> CHUNK_BITS_X) & Y_MASK == 0
}

pub fn is_top_layer(index: usize) -> bool {
    index >> CHUNK_BITS_PER_LAYER == Z_MASK
}

pub fn is_bottom_layer(index: usize) -> bool {
    index >> CHUNK_BITS_PER_LAYER == 0
}

pub fn is_horizontal_edge(index: usize) -> bool {
    is_east_edge(index) || is_west_edge(index) || is_north_edge(index) || is_south_edge(index)
}

/// Index of the top-most block in the column containing `index`.
pub fn column_top_index(index: usize) -> usize {
    (index & (BLOCKS_PER_LAYER - 1)) | (Z_MASK << CHUNK_BITS_PER_LAYER)
}
