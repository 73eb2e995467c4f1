//! Bounded tail ring for UI display.
//!
//! The ring keeps the most recent N bytes of child output. The log file on
//! disk remains the authoritative full record; this exists so `exec tail`
//! never has to re-read a multi-megabyte log.

use std::collections::VecDeque;

/// A byte ring bounded at a fixed capacity.
#[derive(Debug)]
pub struct TailBuffer {
    buf: VecDeque<u8>,
    capacity: usize,
}

impl TailBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Appends a chunk, evicting the oldest bytes past capacity.
    pub fn push(&mut self, chunk: &[u8]) {
        // A chunk larger than the ring reduces to its trailing slice.
        let chunk = if chunk.len() > self.capacity {
            &chunk[chunk.len() - self.capacity..]
        } else {
            chunk
        };
        let overflow = (self.buf.len() + chunk.len()).saturating_sub(self.capacity);
        for _ in 0..overflow {
            self.buf.pop_front();
        }
        self.buf.extend(chunk);
    }

    /// Current contents as lossily decoded UTF-8.
    pub fn contents(&self) -> String {
        let (a, b) = self.buf.as_slices();
        let mut bytes = Vec::with_capacity(self.buf.len());
        bytes.extend_from_slice(a);
        bytes.extend_from_slice(b);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keeps_most_recent_bytes() {
        let mut tail = TailBuffer::new(8);
        tail.push(b"abcdefgh");
        tail.push(b"ij");
        assert_eq!(tail.contents(), "cdefghij");
        assert_eq!(tail.len(), 8);
    }

    #[test]
    fn oversized_chunk_reduces_to_trailing_slice() {
        let mut tail = TailBuffer::new(4);
        tail.push(b"0123456789");
        assert_eq!(tail.contents(), "6789");
    }

    #[test]
    fn empty_ring() {
        let tail = TailBuffer::new(16);
        assert!(tail.is_empty());
        assert_eq!(tail.contents(), "");
    }

    #[test]
    fn invalid_utf8_is_lossy_not_fatal() {
        let mut tail = TailBuffer::new(16);
        tail.push(&[0xFF, 0xFE, b'o', b'k']);
        assert!(tail.contents().ends_with("ok"));
    }
}
