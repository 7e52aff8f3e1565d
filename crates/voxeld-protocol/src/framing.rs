use bytes::{BufMut, BytesMut};

use crate::buffer::Buffer;
use crate::codec::{self, CodecError, Cursor};

/// `1024 - 5`: max total frame size minus the largest possible length+id
/// VarInt header.
pub const MAX_PAYLOAD: i32 = 1024 - 5;

pub enum FrameOutcome {
    /// Not enough bytes buffered yet for a full frame.
    Incomplete,
    /// A complete frame: `consumed` bytes should be discarded from the
    /// buffer, `id`/`payload` are the decoded packet id and body.
    Frame {
        consumed: usize,
        id: i32,
        payload: Vec<u8>,
    },
}

/// Attempts to parse one frame `(length:VarInt, id:VarInt, payload)` from the
/// head of `data` without consuming anything on failure.
pub fn try_parse_frame(data: &[u8]) -> Result<FrameOutcome, CodecError> {
    let mut cursor = Cursor::new(data);
    let length = match cursor.read_varint() {
        Ok(v) => v,
        Err(CodecError::Incomplete) => return Ok(FrameOutcome::Incomplete),
        Err(e) => return Err(e),
    };
    if length < 0 || length > MAX_PAYLOAD {
        return Err(CodecError::Invalid(format!(
            "frame length {length} exceeds max payload {MAX_PAYLOAD}"
        )));
    }
    let header_len = cursor.position();
    let total = header_len + length as usize;
    if data.len() < total {
        return Ok(FrameOutcome::Incomplete);
    }
    let mut body = Cursor::new(&data[header_len..total]);
    let id = match body.read_varint() {
        Ok(v) => v,
        Err(CodecError::Incomplete) => {
            return Err(CodecError::Invalid("frame too short for packet id".into()))
        }
        Err(e) => return Err(e),
    };
    let payload = body.read_remaining().to_vec();
    Ok(FrameOutcome::Frame {
        consumed: total,
        id,
        payload,
    })
}

/// Builds the wire bytes for one frame: payload is written first, then id
/// and length are prepended.
pub fn serialize_packet(id: i32, payload: &[u8]) -> Buffer {
    let mut body = BytesMut::with_capacity(codec::varint_len(id) + payload.len());
    codec::write_varint(&mut body, id);
    body.put_slice(payload);

    let mut framed = Buffer::with_capacity(5 + body.len());
    framed.append(&body);
    let mut length_header = BytesMut::with_capacity(5);
    codec::write_varint(&mut length_header, body.len() as i32);
    framed.prepend(&length_header);
    framed
}

#[derive(Debug)]
pub enum ReaderEvent {
    Frame { id: i32, payload: Vec<u8> },
    Error(CodecError),
}

/// Stream defragmenter: owns a single `Buffer`, accepts byte spans as they
/// arrive, and emits complete frames. A monoid on byte streams — splitting
/// the input differently never changes the sequence of frames produced.
#[derive(Default)]
pub struct PacketReader {
    buffer: Buffer,
    poisoned: bool,
}

impl PacketReader {
    pub fn new() -> Self {
        Self {
            buffer: Buffer::new(),
            poisoned: false,
        }
    }

    /// Appends `data` and drains as many complete frames as are available.
    /// Once an `Error` event is produced the reader is poisoned and further
    /// calls are no-ops, matching "the error callback is invoked exactly
    /// once".
    pub fn on_bytes_received(&mut self, data: &[u8]) -> Vec<ReaderEvent> {
        let mut events = Vec::new();
        if self.poisoned {
            return events;
        }
        self.buffer.append(data);
        loop {
            match try_parse_frame(self.buffer.as_slice()) {
                Ok(FrameOutcome::Incomplete) => break,
                Ok(FrameOutcome::Frame { consumed, id, payload }) => {
                    self.buffer.discard(consumed);
                    events.push(ReaderEvent::Frame { id, payload });
                }
                Err(e) => {
                    self.poisoned = true;
                    events.push(ReaderEvent::Error(e));
                    break;
                }
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrip() {
        let framed = serialize_packet(5, b"hello");
        match try_parse_frame(framed.as_slice()).unwrap() {
            FrameOutcome::Frame { id, payload, consumed } => {
                assert_eq!(id, 5);
                assert_eq!(payload, b"hello");
                assert_eq!(consumed, framed.len());
            }
            FrameOutcome::Incomplete => panic!("expected a complete frame"),
        }
    }

    #[test]
    fn oversized_length_is_invalid() {
        let mut buf = BytesMut::new();
        codec::write_varint(&mut buf, MAX_PAYLOAD + 1);
        assert!(matches!(try_parse_frame(&buf), Err(CodecError::Invalid(_))));
    }

    #[test]
    fn reader_is_split_independent() {
        let framed = serialize_packet(7, b"world");
        let bytes = framed.as_slice().to_vec();

        let mut whole = PacketReader::new();
        let whole_events = whole.on_bytes_received(&bytes);

        let mut split = PacketReader::new();
        let mut split_events = Vec::new();
        for chunk in bytes.chunks(1) {
            split_events.extend(split.on_bytes_received(chunk));
        }

        assert_eq!(whole_events.len(), split_events.len());
        match (&whole_events[0], &split_events[0]) {
            (ReaderEvent::Frame { id: a, payload: pa }, ReaderEvent::Frame { id: b, payload: pb }) => {
                assert_eq!(a, b);
                assert_eq!(pa, pb);
            }
            _ => panic!("expected frame events"),
        }
    }

    #[test]
    fn reader_stops_after_one_error() {
        let mut reader = PacketReader::new();
        let mut bad = BytesMut::new();
        codec::write_varint(&mut bad, MAX_PAYLOAD + 1);
        let events = reader.on_bytes_received(&bad);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ReaderEvent::Error(_)));
        let more = reader.on_bytes_received(b"anything");
        assert!(more.is_empty());
    }
}
