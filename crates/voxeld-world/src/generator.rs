use voxeld_types::ChunkCoord;

use crate::blocks;
use crate::chunk::{Chunk, ChunkState};

/// Fixed flat-world template: section 0 present, y=0 bedrock, y=1..13 stone,
/// y=14 dirt, y=15 grass, heightmap 16 everywhere. No other world generation
/// is implemented.
pub fn generate_flat_chunk(coord: ChunkCoord) -> Chunk {
    let chunk = Chunk::empty(coord);
    {
        let mut state = chunk.lock();
        fill_flat(&mut state);
    }
    chunk
}

fn fill_flat(state: &mut ChunkState) {
    for x in 0..16 {
        for z in 0..16 {
            state.set_block(x, 0, z, blocks::BEDROCK);
            for y in 1..=13 {
                state.set_block(x, y, z, blocks::STONE);
            }
            state.set_block(x, 14, z, blocks::DIRT);
            state.set_block(x, 15, z, blocks::GRASS_BLOCK);
        }
    }
    for row in state.heightmap.iter_mut() {
        for v in row.iter_mut() {
            *v = 16;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_chunk_layers_match_template() {
        let chunk = generate_flat_chunk(ChunkCoord::new(0, 0));
        let state = chunk.lock();
        assert_eq!(state.get_block(3, 0, 3), blocks::BEDROCK);
        assert_eq!(state.get_block(3, 7, 3), blocks::STONE);
        assert_eq!(state.get_block(3, 14, 3), blocks::DIRT);
        assert_eq!(state.get_block(3, 15, 3), blocks::GRASS_BLOCK);
        assert_eq!(state.get_block(3, 16, 3), blocks::AIR);
        assert_eq!(state.heightmap[0][0], 16);
        assert_eq!(state.primary_bitmask(), 1);
    }
}
