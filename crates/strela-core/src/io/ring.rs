//! Fixed-capacity byte ring used to coalesce small writes.

use std::io::{self, Write};

/// A circular byte buffer.
///
/// Bytes are appended at the head and drained from the tail into a sink.
/// Appends never grow the buffer; callers flush when it is full.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buffer: Box<[u8]>,
    start: usize,
    len: usize,
}

impl RingBuffer {
    /// Creates a ring holding up to `capacity` bytes (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity.max(1)].into_boxed_slice(),
            start: 0,
            len: 0,
        }
    }

    /// Total number of bytes the ring can hold.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of bytes that can be appended before a flush is needed.
    pub fn free_space(&self) -> usize {
        self.capacity() - self.len
    }

    /// Appends one byte; returns false if the ring is full.
    pub fn append_byte(&mut self, byte: u8) -> bool {
        if self.len == self.capacity() {
            return false;
        }
        let index = (self.start + self.len) % self.capacity();
        self.buffer[index] = byte;
        self.len += 1;
        true
    }

    /// Appends as much of `data` as fits and returns the number of bytes taken.
    pub fn append(&mut self, data: &[u8]) -> usize {
        let count = data.len().min(self.free_space());
        let capacity = self.capacity();
        let head = (self.start + self.len) % capacity;

        // At most two runs: head..end, then 0..start.
        let first = count.min(capacity - head);
        self.buffer[head..head + first].copy_from_slice(&data[..first]);
        let second = count - first;
        self.buffer[..second].copy_from_slice(&data[first..count]);

        self.len += count;
        count
    }

    /// Drains every buffered byte into `sink` in order.
    ///
    /// Returns the number of bytes written.
    pub fn flush_to(&mut self, sink: &mut dyn Write) -> io::Result<usize> {
        let mut written = 0;
        while self.len > 0 {
            let end = (self.start + self.len).min(self.capacity());
            sink.write_all(&self.buffer[self.start..end])?;
            let chunk = end - self.start;
            written += chunk;
            self.len -= chunk;
            self.start = end % self.capacity();
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_until_full() {
        let mut ring = RingBuffer::new(4);
        assert!(ring.append_byte(1));
        assert_eq!(ring.append(&[2, 3, 4, 5]), 3);
        assert!(!ring.append_byte(6));
        assert_eq!(ring.free_space(), 0);

        let mut out = Vec::new();
        assert_eq!(ring.flush_to(&mut out).unwrap(), 4);
        assert_eq!(out, vec![1, 2, 3, 4]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let mut ring = RingBuffer::new(5);
        let mut out = Vec::new();

        assert_eq!(ring.append(&[1, 2, 3]), 3);
        // The next append starts at index 3 and wraps past the end.
        ring.flush_to(&mut out).unwrap();
        assert_eq!(ring.append(&[4, 5, 6, 7, 8]), 5);
        ring.flush_to(&mut out).unwrap();

        assert_eq!(out, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut ring = RingBuffer::new(0);
        assert_eq!(ring.capacity(), 1);
        assert!(ring.append_byte(9));
    }
}
