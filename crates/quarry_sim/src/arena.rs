use glam::{IVec3, Vec3};
use quarry_shared::block::{Block, BlockRegistry};
use quarry_shared::coords::{block_to_chunk, local_to_index, ChunkPos, CHUNK_HEIGHT};
use rustc_hash::FxHashMap;

use crate::chunk::Chunk;
use crate::locator::BlockLocator;
use crate::pool::{PoolHandle, SlotPool};

pub type ChunkHandle = PoolHandle;

/// Every live chunk, pooled, with a coordinate index over them. Chunks in the
/// `Requested` state are indexed so they are not requested twice, but only
/// active chunks resolve through [`ChunkArena::locate`].
pub struct ChunkArena {
    pool: SlotPool<Chunk>,
    by_coords: FxHashMap<ChunkPos, ChunkHandle>,
}

impl ChunkArena {
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: SlotPool::new(capacity, Chunk::new),
            by_coords: FxHashMap::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pool.is_full()
    }

    /// Claims and resets a pooled chunk for `coords`. `None` when the pool is
    /// exhausted or the coordinate is already live.
    pub fn allocate(&mut self, coords: ChunkPos) -> Option<ChunkHandle> {
        if self.by_coords.contains_key(&coords) {
            return None;
        }
        let (handle, chunk) = self.pool.allocate()?;
        chunk.reset(coords);
        self.by_coords.insert(coords, handle);
        Some(handle)
    }

    pub fn release(&mut self, handle: ChunkHandle) -> bool {
        let Some(coords) = self.pool.get(handle).map(Chunk::coords) else {
            return false;
        };
        self.by_coords.remove(&coords);
        self.pool.release(handle)
    }

    pub fn get(&self, handle: ChunkHandle) -> Option<&Chunk> {
        self.pool.get(handle)
    }

    pub fn get_mut(&mut self, handle: ChunkHandle) -> Option<&mut Chunk> {
        self.pool.get_mut(handle)
    }

    /// Live chunk at `coords` in any state.
    pub fn find(&self, coords: ChunkPos) -> Option<ChunkHandle> {
        self.by_coords.get(&coords).copied()
    }

    pub fn find_active(&self, coords: ChunkPos) -> Option<ChunkHandle> {
        let handle = self.find(coords)?;
        self.pool.get(handle)?.is_active().then_some(handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChunkHandle, &Chunk)> {
        self.pool.iter()
    }

    pub fn active_handles(&self) -> Vec<ChunkHandle> {
        self.pool
            .iter()
            .filter(|(_, chunk)| chunk.is_active())
            .map(|(handle, _)| handle)
            .collect()
    }

    pub fn block(&self, locator: BlockLocator) -> Option<Block> {
        self.pool
            .get(locator.chunk)
            .map(|chunk| chunk.block(locator.index()))
    }

    pub fn block_mut(&mut self, locator: BlockLocator) -> Option<&mut Block> {
        self.pool
            .get_mut(locator.chunk)
            .map(|chunk| chunk.block_mut(locator.index()))
    }

    /// Locator for the block containing a world-space point, if its chunk is
    /// active.
    pub fn locate(&self, position: Vec3) -> Option<BlockLocator> {
        self.locate_block(position.floor().as_ivec3())
    }

    pub fn locate_block(&self, block: IVec3) -> Option<BlockLocator> {
        let (coords, local) = block_to_chunk(block)?;
        let chunk = self.find_active(coords)?;
        Some(BlockLocator::new(chunk, local_to_index(local)))
    }

    /// Height of the highest solid block in a world column. `None` when the
    /// column's chunk is not active or the column holds nothing solid.
    pub fn column_height(&self, registry: &BlockRegistry, world_x: i32, world_y: i32) -> Option<i32> {
        (0..CHUNK_HEIGHT as i32).rev().find(|&z| {
            self.locate_block(IVec3::new(world_x, world_y, z))
                .and_then(|locator| self.block(locator))
                .is_some_and(|block| registry.is_solid(block.block_type))
        })
    }
}
