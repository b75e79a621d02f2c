use glam::IVec3;
use quarry_shared::coords::{
    block_world_coords, is_bottom_layer, is_east_edge, is_north_edge, is_south_edge,
    is_top_layer, is_west_edge, BLOCKS_PER_LAYER, CHUNK_SIZE_X, CHUNK_VOLUME, X_MASK,
};
use quarry_shared::physics::Face;

use crate::arena::{ChunkArena, ChunkHandle};
use crate::chunk::Direction;

const ROW_STRIDE: usize = CHUNK_SIZE_X;
const ROW_SPAN: usize = BLOCKS_PER_LAYER - CHUNK_SIZE_X;

/// A block addressed by the chunk that holds it and its local index. Cheap to
/// copy; resolves only while the chunk handle is still live.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockLocator {
    pub chunk: ChunkHandle,
    index: u16,
}

impl BlockLocator {
    pub fn new(chunk: ChunkHandle, index: usize) -> Self {
        debug_assert!(index < CHUNK_VOLUME, "block index out of range: {index}");
        Self {
            chunk,
            index: index as u16,
        }
    }

    pub fn index(&self) -> usize {
        usize::from(self.index)
    }

    /// Locator one step across `face`. Crosses into linked neighbour chunks
    /// horizontally; `None` past the top or bottom of the world, at an
    /// unlinked edge, or when this locator's chunk has been released.
    pub fn neighbor(self, arena: &ChunkArena, face: Face) -> Option<Self> {
        let chunk = arena.get(self.chunk)?;
        let index = self.index();

        let (direction, wrapped) = match face {
            Face::PosZ => {
                return (!is_top_layer(index)).then(|| Self::new(self.chunk, index + BLOCKS_PER_LAYER));
            }
            Face::NegZ => {
                return (!is_bottom_layer(index))
                    .then(|| Self::new(self.chunk, index - BLOCKS_PER_LAYER));
            }
            Face::PosX if !is_east_edge(index) => return Some(Self::new(self.chunk, index + 1)),
            Face::NegX if !is_west_edge(index) => return Some(Self::new(self.chunk, index - 1)),
            Face::PosY if !is_north_edge(index) => {
                return Some(Self::new(self.chunk, index + ROW_STRIDE));
            }
            Face::NegY if !is_south_edge(index) => {
                return Some(Self::new(self.chunk, index - ROW_STRIDE));
            }
            Face::PosX => (Direction::East, index - X_MASK),
            Face::NegX => (Direction::West, index + X_MASK),
            Face::PosY => (Direction::North, index - ROW_SPAN),
            Face::NegY => (Direction::South, index + ROW_SPAN),
        };

        let neighbor = chunk.neighbor(direction)?;
        arena.get(neighbor)?;
        Some(Self::new(neighbor, wrapped))
    }

    pub fn world_position(&self, arena: &ChunkArena) -> Option<IVec3> {
        let chunk = arena.get(self.chunk)?;
        Some(block_world_coords(chunk.coords(), self.index()))
    }
}
