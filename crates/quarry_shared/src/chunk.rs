use crate::block::BlockType;
use crate::coords::{local_to_index, ChunkPos, LocalPos, CHUNK_VOLUME};

/// Thread-portable snapshot of a chunk's block types. This is what crosses
/// between the simulation and the streaming worker, and what gets written to
/// disk. Light and flag bits are not carried.
#[derive(Clone, Debug)]
pub struct ChunkProxy {
    pub coords: ChunkPos,
    pub block_types: Box<[BlockType; CHUNK_VOLUME]>,
    valid: bool,
}

impl ChunkProxy {
    pub fn new(coords: ChunkPos) -> Self {
        Self {
            coords,
            block_types: Box::new([BlockType::AIR; CHUNK_VOLUME]),
            valid: true,
        }
    }

    pub fn new_filled(coords: ChunkPos, block_type: BlockType) -> Self {
        Self {
            coords,
            block_types: Box::new([block_type; CHUNK_VOLUME]),
            valid: true,
        }
    }

    /// A proxy the worker must skip and the simulation must not install.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn get(&self, local: LocalPos) -> BlockType {
        self.block_types[local_to_index(local)]
    }

    pub fn set(&mut self, local: LocalPos, block_type: BlockType) {
        self.block_types[local_to_index(local)] = block_type;
    }

    pub fn fill(&mut self, block_type: BlockType) {
        self.block_types.fill(block_type);
    }

    pub fn as_slice(&self) -> &[BlockType] {
        self.block_types.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [BlockType] {
        self.block_types.as_mut_slice()
    }

    pub fn is_uniform(&self, block_type: BlockType) -> bool {
        self.block_types.iter().all(|&current| current == block_type)
    }
}
