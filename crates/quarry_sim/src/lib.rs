pub mod arena;
pub mod bullet;
pub mod chunk;
pub mod collision;
pub mod config;
pub mod enemy;
pub mod error;
pub mod lighting;
pub mod locator;
pub mod observer;
pub mod pool;
pub mod raycast;
pub mod streaming;
pub mod world;

pub use world::{TickStats, World, WorldEvent};
