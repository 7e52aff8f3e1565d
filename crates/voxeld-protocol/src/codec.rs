use bytes::{BufMut, BytesMut};
use thiserror::Error;
use uuid::Uuid;
use voxeld_types::BlockPos;

/// Errors from the primitive codec layer. `Incomplete` is benign (the caller
/// should wait for more bytes); `Invalid` is fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("not enough data")]
    Incomplete,
    #[error("invalid data: {0}")]
    Invalid(String),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// A read-only, non-consuming cursor over a byte slice. Reads never mutate
/// the caller's buffer; on `Incomplete` the caller still owns every byte
/// and may retry once more data has arrived.
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(CodecError::Incomplete);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> CodecResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::Invalid(format!("bad bool byte {other}"))),
        }
    }

    pub fn read_i16(&mut self) -> CodecResult<i16> {
        let b = self.take(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u16(&mut self) -> CodecResult<u16> {
        Ok(self.read_i16()? as u16)
    }

    pub fn read_i32(&mut self) -> CodecResult<i32> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i64(&mut self) -> CodecResult<i64> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(i64::from_be_bytes(arr))
    }

    pub fn read_f32(&mut self) -> CodecResult<f32> {
        Ok(f32::from_bits(self.read_i32()? as u32))
    }

    pub fn read_f64(&mut self) -> CodecResult<f64> {
        Ok(f64::from_bits(self.read_i64()? as u64))
    }

    /// Up to 5 bytes; 7 low bits per byte, high bit set on continuation.
    pub fn read_varint(&mut self) -> CodecResult<i32> {
        let mut result: i32 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = self.read_u8()?;
            result |= ((byte & 0x7F) as i32) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift >= 35 {
                return Err(CodecError::Invalid("VarInt too long".into()));
            }
        }
    }

    pub fn read_varlong(&mut self) -> CodecResult<i64> {
        let mut result: i64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = self.read_u8()?;
            result |= ((byte & 0x7F) as i64) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift >= 70 {
                return Err(CodecError::Invalid("VarLong too long".into()));
            }
        }
    }

    pub fn read_string(&mut self) -> CodecResult<String> {
        let len = self.read_varint()?;
        if len < 0 {
            return Err(CodecError::Invalid("negative string length".into()));
        }
        let bytes = self.take(len as usize)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CodecError::Invalid(format!("non-utf8 string: {e}")))
    }

    /// Sixteen bytes, high 8 bytes then low 8 bytes, each big-endian.
    pub fn read_uuid(&mut self) -> CodecResult<Uuid> {
        let hi = self.read_i64()? as u64;
        let lo = self.read_i64()? as u64;
        Ok(Uuid::from_u64_pair(hi, lo))
    }

    pub fn read_block_pos(&mut self) -> CodecResult<BlockPos> {
        let raw = self.read_i64()? as u64;
        Ok(BlockPos::decode(raw))
    }

    pub fn read_byte_array(&mut self) -> CodecResult<Vec<u8>> {
        let len = self.read_varint()?;
        if len < 0 {
            return Err(CodecError::Invalid("negative array length".into()));
        }
        Ok(self.take(len as usize)?.to_vec())
    }

    /// Consumes the rest of the payload.
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }
}

pub fn write_varint(buf: &mut BytesMut, mut value: i32) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value = ((value as u32) >> 7) as i32;
        if value != 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if value == 0 {
            break;
        }
    }
}

pub fn varint_len(value: i32) -> usize {
    let mut val = value as u32;
    let mut len = 0;
    loop {
        len += 1;
        val >>= 7;
        if val == 0 {
            break;
        }
    }
    len
}

pub fn write_string(buf: &mut BytesMut, s: &str) {
    write_varint(buf, s.len() as i32);
    buf.put_slice(s.as_bytes());
}

/// High 8 bytes then low 8 bytes, each big-endian.
pub fn write_uuid(buf: &mut BytesMut, uuid: &Uuid) {
    let (hi, lo) = uuid.as_u64_pair();
    buf.put_u64(hi);
    buf.put_u64(lo);
}

pub fn write_block_pos(buf: &mut BytesMut, pos: &BlockPos) {
    buf.put_u64(pos.encode());
}

pub fn write_byte_array(buf: &mut BytesMut, data: &[u8]) {
    write_varint(buf, data.len() as i32);
    buf.put_slice(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_roundtrip() {
        let cases: &[(i32, &[u8])] = &[
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7F]),
            (128, &[0x80, 0x01]),
            (255, &[0xFF, 0x01]),
            (25565, &[0xDD, 0xC7, 0x01]),
            (2097151, &[0xFF, 0xFF, 0x7F]),
            (-1, &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]),
        ];
        for &(value, bytes) in cases {
            let mut buf = BytesMut::new();
            write_varint(&mut buf, value);
            assert_eq!(buf.as_ref(), bytes);
            let mut cursor = Cursor::new(bytes);
            assert_eq!(cursor.read_varint().unwrap(), value);
        }
    }

    #[test]
    fn varint_len_matches_encoding() {
        assert_eq!(varint_len(0), 1);
        assert_eq!(varint_len(127), 1);
        assert_eq!(varint_len(128), 2);
        assert_eq!(varint_len(25565), 3);
        assert_eq!(varint_len(-1), 5);
    }

    #[test]
    fn varint_incomplete_vs_invalid() {
        assert_eq!(Cursor::new(&[0x80]).read_varint(), Err(CodecError::Incomplete));
        assert_eq!(
            Cursor::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]).read_varint(),
            Err(CodecError::Invalid("VarInt too long".into()))
        );
    }

    #[test]
    fn string_roundtrip() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "Hello, world!");
        let mut cursor = Cursor::new(&buf);
        assert_eq!(cursor.read_string().unwrap(), "Hello, world!");
    }

    #[test]
    fn uuid_roundtrip_is_hi_then_lo() {
        let uuid = Uuid::from_u64_pair(0x0102030405060708, 0x090a0b0c0d0e0f10);
        let mut buf = BytesMut::new();
        write_uuid(&mut buf, &uuid);
        assert_eq!(&buf[0..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut cursor = Cursor::new(&buf);
        assert_eq!(cursor.read_uuid().unwrap(), uuid);
    }

    #[test]
    fn block_pos_roundtrip_through_wire() {
        let pos = BlockPos::new(100, 63, -200);
        let mut buf = BytesMut::new();
        write_block_pos(&mut buf, &pos);
        let mut cursor = Cursor::new(&buf);
        assert_eq!(cursor.read_block_pos().unwrap(), pos);
    }
}
