use std::sync::{Mutex, MutexGuard};

use bytes::{BufMut, BytesMut};
use voxeld_nbt::{nbt_compound, NbtValue};
use voxeld_protocol::bitpack;
use voxeld_types::ChunkCoord;

use crate::blocks;

pub const SECTIONS_PER_CHUNK: usize = 16;
pub const BLOCKS_PER_SECTION: usize = 16 * 16 * 16;

/// One 16×16×16 vertical slice of a chunk: 4096 block-ids as u16, indexed
/// `y*256 + z*16 + x`.
#[derive(Clone)]
pub struct ChunkSection {
    blocks: Box<[u16; BLOCKS_PER_SECTION]>,
}

impl ChunkSection {
    pub fn empty() -> Self {
        Self {
            blocks: Box::new([blocks::AIR; BLOCKS_PER_SECTION]),
        }
    }

    fn index(x: usize, y: usize, z: usize) -> usize {
        y * 256 + z * 16 + x
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> u16 {
        self.blocks[Self::index(x, y, z)]
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, id: u16) {
        self.blocks[Self::index(x, y, z)] = id;
    }

    /// Encodes the `(blockCount, bitsPerBlock, dataLength, data)` wire shape
    /// for a populated section: 4096 block-ids bit-packed 16→14 into 896
    /// big-endian `i64` words (7168 bytes).
    fn write_wire(&self, buf: &mut BytesMut) {
        buf.put_u16(BLOCKS_PER_SECTION as u16);
        buf.put_u8(14); // bits per block, direct (no palette)
        let packed = bitpack::pack_16_to_14(self.blocks.as_slice());
        let words = bitpack::bytes_to_be_i64_words(&packed);
        voxeld_protocol::codec::write_varint(buf, words.len() as i32);
        for word in words {
            buf.put_i64(word);
        }
    }
}

/// Mutable chunk contents, guarded as a whole by `Chunk`'s single lock so a
/// caller can compose several operations (e.g. bitmask + per-section encode)
/// atomically.
pub struct ChunkState {
    sections: [Option<Box<ChunkSection>>; SECTIONS_PER_CHUNK],
    /// `biomes[z][x]`.
    pub biomes: [[i32; 16]; 16],
    /// `heightmap[z][x]`.
    pub heightmap: [[u16; 16]; 16],
}

impl ChunkState {
    fn empty() -> Self {
        Self {
            sections: Default::default(),
            biomes: [[0; 16]; 16],
            heightmap: [[0; 16]; 16],
        }
    }

    pub fn section(&self, index: usize) -> Option<&ChunkSection> {
        self.sections[index].as_deref()
    }

    fn section_index(y: i32) -> usize {
        (y >> 4) as usize
    }

    pub fn get_block(&self, x: i32, y: i32, z: i32) -> u16 {
        let idx = Self::section_index(y);
        match &self.sections[idx] {
            Some(section) => section.get(x as usize, (y & 15) as usize, z as usize),
            None => blocks::AIR,
        }
    }

    /// Lazily materializes the containing section iff the new block is not
    /// air, per "a section exists iff some block in its range is non-air".
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, id: u16) {
        let idx = Self::section_index(y);
        let local_y = (y & 15) as usize;
        if blocks::is_air(id) {
            if let Some(section) = self.sections[idx].as_mut() {
                section.set(x as usize, local_y, z as usize, id);
            }
            return;
        }
        let section = self.sections[idx].get_or_insert_with(|| Box::new(ChunkSection::empty()));
        section.set(x as usize, local_y, z as usize, id);
    }

    /// Bitset of populated sections, lowest bit = section 0.
    pub fn primary_bitmask(&self) -> i32 {
        let mut mask = 0i32;
        for (i, section) in self.sections.iter().enumerate() {
            if section.is_some() {
                mask |= 1 << i;
            }
        }
        mask
    }

    /// The `(blockCount, bitsPerBlock, dataLength, data)` blobs for every
    /// populated section, concatenated in index order.
    pub fn encode_sections(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for section in self.sections.iter().flatten() {
            section.write_wire(&mut buf);
        }
        buf.to_vec()
    }

    /// The heightmap wrapped as a `MOTION_BLOCKING` `LONG_ARRAY` inside an
    /// unnamed root compound, matching the `ChunkData` heightmaps field.
    pub fn encode_heightmap_nbt(&self) -> Vec<u8> {
        let mut flat = Vec::with_capacity(256);
        for z in 0..16 {
            for x in 0..16 {
                flat.push(self.heightmap[z][x]);
            }
        }
        let packed = bitpack::pack_16_to_9(&flat);
        let words = bitpack::bytes_to_be_i64_words(&packed);
        let doc = nbt_compound! { "MOTION_BLOCKING" => NbtValue::LongArray(words) };
        let mut buf = BytesMut::new();
        doc.write_root_named("", &mut buf);
        buf.to_vec()
    }

    pub fn biomes_flat(&self) -> Vec<i32> {
        let mut flat = Vec::with_capacity(256);
        for z in 0..16 {
            for x in 0..16 {
                flat.push(self.biomes[z][x]);
            }
        }
        flat
    }
}

/// A chunk column: up to 16 sections, a biome array, a heightmap, all behind
/// one lock. Lazily materialized by `ChunkStore`; lives for the server's
/// lifetime once created.
pub struct Chunk {
    pub coord: ChunkCoord,
    state: Mutex<ChunkState>,
}

impl Chunk {
    pub fn empty(coord: ChunkCoord) -> Self {
        Self {
            coord,
            state: Mutex::new(ChunkState::empty()),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, ChunkState> {
        self.state.lock().expect("chunk lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_block_materializes_only_on_non_air() {
        let mut state = ChunkState::empty();
        assert_eq!(state.primary_bitmask(), 0);
        state.set_block(0, 0, 0, blocks::STONE);
        assert_eq!(state.primary_bitmask(), 1);
        assert_eq!(state.get_block(0, 0, 0), blocks::STONE);
    }

    #[test]
    fn encode_sections_matches_populated_bitmask() {
        let mut state = ChunkState::empty();
        state.set_block(0, 20, 0, blocks::STONE); // section index 1
        assert_eq!(state.primary_bitmask(), 0b10);
        let encoded = state.encode_sections();
        // blockCount(2) + bitsPerBlock(1) + dataLength varint(2, value 896) + 7168 bytes
        assert_eq!(encoded.len(), 2 + 1 + 2 + 7168);
    }

    #[test]
    fn heightmap_nbt_has_compound_root() {
        let state = ChunkState::empty();
        let doc = state.encode_heightmap_nbt();
        assert_eq!(doc[0], voxeld_nbt::TAG_COMPOUND);
    }
}
