pub mod chunk_store;
pub mod observer_save;
pub mod rle;
