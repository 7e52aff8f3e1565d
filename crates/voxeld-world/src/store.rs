use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use voxeld_types::ChunkCoord;

use crate::chunk::Chunk;
use crate::generator::generate_flat_chunk;

/// Coordinate-indexed map of chunks, each independently locked. Lookups
/// never hold the list lock while touching chunk data: acquire it, clone the
/// `Arc`, release it, then lock the individual chunk.
#[derive(Default)]
pub struct ChunkStore {
    chunks: RwLock<HashMap<ChunkCoord, Arc<Chunk>>>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the chunk at `coord`, generating and inserting it on first
    /// access. Uses the entry API under a single write-lock acquisition so
    /// two callers racing on the same missing coordinate cannot each
    /// generate a chunk and have one silently clobber the other.
    pub fn get_or_create(&self, coord: ChunkCoord) -> Arc<Chunk> {
        if let Some(chunk) = self.chunks.read().expect("chunk store lock poisoned").get(&coord) {
            return chunk.clone();
        }
        let mut chunks = self.chunks.write().expect("chunk store lock poisoned");
        chunks
            .entry(coord)
            .or_insert_with(|| Arc::new(generate_flat_chunk(coord)))
            .clone()
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.chunks.read().expect("chunk store lock poisoned").get(&coord).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let store = ChunkStore::new();
        let a = store.get_or_create(ChunkCoord::new(1, 1));
        let b = store.get_or_create(ChunkCoord::new(1, 1));
        assert!(Arc::ptr_eq(&a, &b));
    }
}
