use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Growable byte container: append to the tail, prepend to the head (used to
/// write the length+id header after a payload has been built), and discard a
/// prefix. Backed by `bytes::BytesMut`, which keeps small buffers inline and
/// avoids a heap allocation for short packets.
#[derive(Debug, Default, Clone)]
pub struct Buffer {
    inner: BytesMut,
}

impl Buffer {
    pub fn new() -> Self {
        Self {
            inner: BytesMut::new(),
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: BytesMut::with_capacity(cap),
        }
    }

    pub fn append(&mut self, data: &[u8]) {
        self.inner.put_slice(data);
    }

    /// Inserts `data` before everything currently in the buffer.
    pub fn prepend(&mut self, data: &[u8]) {
        let mut combined = BytesMut::with_capacity(data.len() + self.inner.len());
        combined.put_slice(data);
        combined.put_slice(&self.inner);
        self.inner = combined;
    }

    /// Drops the first `len` bytes.
    pub fn discard(&mut self, len: usize) {
        self.inner.advance(len);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn freeze(self) -> Bytes {
        self.inner.freeze()
    }

    pub fn into_inner(self) -> BytesMut {
        self.inner
    }
}

impl From<BytesMut> for Buffer {
    fn from(inner: BytesMut) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_prepend_then_discard() {
        let mut buf = Buffer::new();
        buf.append(&[3, 4, 5]);
        buf.prepend(&[1, 2]);
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4, 5]);
        buf.discard(2);
        assert_eq!(buf.as_slice(), &[3, 4, 5]);
    }
}
