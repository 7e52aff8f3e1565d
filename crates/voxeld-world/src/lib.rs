pub mod blocks;
pub mod chunk;
pub mod generator;
pub mod store;
pub mod tracker;

pub use chunk::{Chunk, ChunkSection};
pub use store::ChunkStore;
pub use tracker::PlayerTracker;
