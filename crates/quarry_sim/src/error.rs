use quarry_shared::block::BlockType;
use quarry_shared::coords::ChunkPos;

/// Why a chunk could not enter or leave the streaming pipeline this tick.
/// Both are transient; the chunk is retried on a later tick.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("chunk pool exhausted while requesting {0:?}")]
    PoolExhausted(ChunkPos),
    #[error("{buffer} buffer full, dropped request for {coords:?}")]
    BufferFull {
        buffer: &'static str,
        coords: ChunkPos,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EditError {
    #[error("target block is no longer loaded")]
    StaleLocator,
    #[error("block type {0:?} cannot be dug")]
    Indestructible(BlockType),
    #[error("placement would intersect an observer")]
    Obstructed,
    #[error("block type {0:?} is not registered")]
    InvalidBlockType(BlockType),
}
