//! Entity metadata: a list of `(index:u8, type:VarInt, value)` entries
//! terminated by sentinel byte `0xff`.

use bytes::{BufMut, BytesMut};

use crate::codec::write_varint;

pub const TYPE_BYTE: i32 = 0;
pub const TYPE_VARINT: i32 = 1;
pub const TYPE_FLOAT: i32 = 2;
pub const TYPE_BOOLEAN: i32 = 7;
pub const TYPE_POSE: i32 = 18;

pub const SENTINEL: u8 = 0xff;

pub const FLAG_CROUCHING: u8 = 0x02;
pub const FLAG_SPRINTING: u8 = 0x08;

#[derive(Debug, Clone, Copy)]
pub enum MetadataValue {
    Byte(i8),
    VarInt(i32),
    Float(f32),
    Bool(bool),
    Pose(u8),
}

impl MetadataValue {
    fn type_id(&self) -> i32 {
        match self {
            MetadataValue::Byte(_) => TYPE_BYTE,
            MetadataValue::VarInt(_) => TYPE_VARINT,
            MetadataValue::Float(_) => TYPE_FLOAT,
            MetadataValue::Bool(_) => TYPE_BOOLEAN,
            MetadataValue::Pose(_) => TYPE_POSE,
        }
    }

    fn write(&self, buf: &mut BytesMut) {
        match self {
            MetadataValue::Byte(v) => buf.put_i8(*v),
            MetadataValue::VarInt(v) => write_varint(buf, *v),
            MetadataValue::Float(v) => buf.put_f32(*v),
            MetadataValue::Bool(v) => buf.put_u8(if *v { 1 } else { 0 }),
            MetadataValue::Pose(v) => write_varint(buf, *v as i32),
        }
    }
}

pub fn encode_metadata(entries: &[(u8, MetadataValue)]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    for (index, value) in entries {
        buf.put_u8(*index);
        write_varint(&mut buf, value.type_id());
        value.write(&mut buf);
    }
    buf.put_u8(SENTINEL);
    buf.to_vec()
}

/// The bitfield metadata entry (index 0) encoding crouching/sprinting.
pub fn entity_flags_entry(crouching: bool, sprinting: bool) -> (u8, MetadataValue) {
    let mut flags = 0u8;
    if crouching {
        flags |= FLAG_CROUCHING;
    }
    if sprinting {
        flags |= FLAG_SPRINTING;
    }
    (0, MetadataValue::Byte(flags as i8))
}

/// The pose metadata entry (index 6 in this protocol era).
pub fn pose_entry(crouching: bool) -> (u8, MetadataValue) {
    const POSE_STANDING: u8 = 0;
    const POSE_SNEAKING: u8 = 5;
    (6, MetadataValue::Pose(if crouching { POSE_SNEAKING } else { POSE_STANDING }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_flags_and_terminator() {
        let encoded = encode_metadata(&[entity_flags_entry(true, false)]);
        assert_eq!(encoded[0], 0); // index
        assert_eq!(encoded[1], TYPE_BYTE as u8); // type varint, single byte
        assert_eq!(encoded[2], FLAG_CROUCHING);
        assert_eq!(*encoded.last().unwrap(), SENTINEL);
    }
}
