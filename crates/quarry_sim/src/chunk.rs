use quarry_shared::block::{Block, BlockType};
use quarry_shared::chunk::ChunkProxy;
use quarry_shared::coords::{ChunkPos, CHUNK_VOLUME};

use crate::arena::ChunkHandle;

/// The four horizontal neighbours a chunk links to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    East,
    West,
    North,
    South,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::East,
        Direction::West,
        Direction::North,
        Direction::South,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
        }
    }

    pub fn offset(self) -> ChunkPos {
        match self {
            Direction::East => ChunkPos::new(1, 0),
            Direction::West => ChunkPos::new(-1, 0),
            Direction::North => ChunkPos::new(0, 1),
            Direction::South => ChunkPos::new(0, -1),
        }
    }

    fn slot(self) -> usize {
        match self {
            Direction::East => 0,
            Direction::West => 1,
            Direction::North => 2,
            Direction::South => 3,
        }
    }
}

/// Where a live chunk is in its streaming lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChunkState {
    /// Slot claimed, contents still being loaded or generated by the worker.
    Requested,
    /// Populated, linked and lit.
    Active,
}

pub struct Chunk {
    coords: ChunkPos,
    blocks: Box<[Block; CHUNK_VOLUME]>,
    modified: bool,
    state: ChunkState,
    neighbors: [Option<ChunkHandle>; 4],
}

impl Chunk {
    pub fn new() -> Self {
        Self {
            coords: ChunkPos::default(),
            blocks: Box::new([Block::AIR; CHUNK_VOLUME]),
            modified: false,
            state: ChunkState::Requested,
            neighbors: [None; 4],
        }
    }

    /// Prepares a pooled chunk for a new coordinate: all air, no light, no
    /// links.
    pub fn reset(&mut self, coords: ChunkPos) {
        self.coords = coords;
        self.blocks.fill(Block::AIR);
        self.modified = false;
        self.state = ChunkState::Requested;
        self.neighbors = [None; 4];
    }

    pub fn coords(&self) -> ChunkPos {
        self.coords
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    pub fn set_state(&mut self, state: ChunkState) {
        self.state = state;
    }

    pub fn is_active(&self) -> bool {
        self.state == ChunkState::Active
    }

    pub fn blocks(&self) -> &[Block] {
        self.blocks.as_slice()
    }

    pub fn block(&self, index: usize) -> Block {
        self.blocks[index]
    }

    pub fn block_mut(&mut self, index: usize) -> &mut Block {
        &mut self.blocks[index]
    }

    pub fn block_type(&self, index: usize) -> BlockType {
        self.blocks[index].block_type
    }

    /// Set whenever block types or light values change. The mesh builder
    /// clears it after rebuilding.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    pub fn clear_modified(&mut self) {
        self.modified = false;
    }

    pub fn neighbor(&self, direction: Direction) -> Option<ChunkHandle> {
        self.neighbors[direction.slot()]
    }

    pub fn set_neighbor(&mut self, direction: Direction, neighbor: Option<ChunkHandle>) {
        self.neighbors[direction.slot()] = neighbor;
    }

    pub fn snapshot(&self) -> ChunkProxy {
        let mut proxy = ChunkProxy::new(self.coords);
        for (target, block) in proxy.as_mut_slice().iter_mut().zip(self.blocks.iter()) {
            *target = block.block_type;
        }
        proxy
    }

    /// Copies block types out of a populated proxy. Light and flags start
    /// cleared.
    pub fn populate_from(&mut self, proxy: &ChunkProxy) {
        debug_assert_eq!(proxy.coords, self.coords, "proxy installed into wrong chunk");
        for (block, &block_type) in self.blocks.iter_mut().zip(proxy.as_slice()) {
            *block = Block::new(block_type);
        }
        self.modified = true;
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}
