pub mod block;
pub mod chunk;
pub mod coords;
pub mod physics;
pub mod worldgen;
