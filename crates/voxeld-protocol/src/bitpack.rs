//! The old (pre-1.16) bit-packing scheme: values are streamed
//! least-significant-bit-first into a contiguous bitstream with no per-word
//! padding, so a value may straddle a word boundary. This matches
//! `bitpack16to14`/`bitpack16to9` in the reference implementation, not the
//! padded per-long scheme later clients use.

/// Packs `values` at `bits` bits each into a continuous LSB-first byte
/// stream. `values.len() * bits` need not be a multiple of 8; the final
/// partial byte is zero-padded in its high bits.
fn pack_bits(values: &[u16], bits: u32) -> Vec<u8> {
    let total_bits = values.len() as u64 * bits as u64;
    let mut out = Vec::with_capacity(((total_bits + 7) / 8) as usize);
    let mask = (1u64 << bits) - 1;
    let mut acc: u64 = 0;
    let mut nbits: u32 = 0;
    for &v in values {
        acc |= (v as u64 & mask) << nbits;
        nbits += bits;
        while nbits >= 8 {
            out.push((acc & 0xff) as u8);
            acc >>= 8;
            nbits -= 8;
        }
    }
    if nbits > 0 {
        out.push((acc & 0xff) as u8);
    }
    out
}

fn unpack_bits(bytes: &[u8], count: usize, bits: u32) -> Vec<u16> {
    let mask = (1u64 << bits) - 1;
    let mut out = Vec::with_capacity(count);
    let mut acc: u64 = 0;
    let mut nbits: u32 = 0;
    let mut byte_iter = bytes.iter();
    for _ in 0..count {
        while nbits < bits {
            let byte = *byte_iter.next().expect("pack_bits produced too few bytes");
            acc |= (byte as u64) << nbits;
            nbits += 8;
        }
        out.push((acc & mask) as u16);
        acc >>= bits;
        nbits -= bits;
    }
    out
}

/// 16→14: for each block of 32 input values, streams the low 14 bits of each
/// into 7 `u64` words (448 bits), then grouped into 8-byte little-endian
/// words for the caller to re-serialize big-endian onto the wire.
pub fn pack_16_to_14(values: &[u16]) -> Vec<u8> {
    assert_eq!(values.len() % 32, 0, "16->14 packer requires a multiple of 32 inputs");
    pack_bits(values, 14)
}

pub fn unpack_16_to_14(bytes: &[u8], count: usize) -> Vec<u16> {
    unpack_bits(bytes, count, 14)
}

/// 16→9: for each block of 8 input values, streams the low 9 bits of each
/// into 1 `u64` plus 1 trailing byte (72 bits).
pub fn pack_16_to_9(values: &[u16]) -> Vec<u8> {
    assert_eq!(values.len() % 8, 0, "16->9 packer requires a multiple of 8 inputs");
    pack_bits(values, 9)
}

pub fn unpack_16_to_9(bytes: &[u8], count: usize) -> Vec<u16> {
    unpack_bits(bytes, count, 9)
}

/// Groups a packed byte stream into big-endian `i64` words, as written onto
/// the wire (the reference packer reinterprets native-endian `u64` words, so
/// each 8-byte group here is little-endian on the way in).
pub fn bytes_to_be_i64_words(bytes: &[u8]) -> Vec<i64> {
    assert_eq!(bytes.len() % 8, 0, "packed byte count must be a multiple of 8");
    bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(chunk);
            u64::from_le_bytes(arr) as i64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_16_to_14_produces_exact_byte_count() {
        for k in 1..=4usize {
            let values: Vec<u16> = (0..32 * k as u32).map(|i| (i % 0x3fff) as u16).collect();
            let packed = pack_16_to_14(&values);
            assert_eq!(packed.len(), 56 * k);
            assert_eq!(unpack_16_to_14(&packed, values.len()), values);
        }
    }

    #[test]
    fn pack_16_to_9_produces_exact_byte_count() {
        for k in 1..=4usize {
            let values: Vec<u16> = (0..8 * k as u32).map(|i| (i % 0x1ff) as u16).collect();
            let packed = pack_16_to_9(&values);
            assert_eq!(packed.len(), 9 * k);
            assert_eq!(unpack_16_to_9(&packed, values.len()), values);
        }
    }

    #[test]
    fn full_section_packs_into_896_words() {
        let values = [0x3fffu16; 4096];
        let packed = pack_16_to_14(&values);
        assert_eq!(packed.len(), 7168);
        assert_eq!(bytes_to_be_i64_words(&packed).len(), 896);
    }

    #[test]
    fn full_heightmap_packs_into_36_words() {
        let values = [15u16; 256];
        let packed = pack_16_to_9(&values);
        assert_eq!(packed.len(), 288);
        assert_eq!(bytes_to_be_i64_words(&packed).len(), 36);
    }

    #[test]
    #[should_panic]
    fn rejects_non_multiple_input() {
        pack_16_to_14(&[1, 2, 3]);
    }
}
