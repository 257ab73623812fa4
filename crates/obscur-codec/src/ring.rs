//! Fixed-capacity cyclic byte buffer.
//!
//! Backs the block-cipher read decorator, which must withhold a trailing
//! window of decrypted bytes until it can tell padding from payload. All
//! operations are O(n) in the bytes moved and never reallocate.
//!
//! # Invariants
//!
//! - `len <= capacity` at all times.
//! - `put` fails (rather than overwriting) when the buffer is full.
//! - `take` and non-saturating `skip` fail (rather than short-reading) when
//!   fewer bytes are buffered than requested.

use thiserror::Error;

/// Errors from ring buffer operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingBufferError {
    /// A `put` would exceed the fixed capacity.
    #[error("ring buffer capacity exceeded: {requested} bytes requested, {available} free")]
    CapacityExceeded {
        /// Bytes the caller tried to enqueue.
        requested: usize,
        /// Free space remaining.
        available: usize,
    },

    /// A `take`, `skip`, or `peek_tail` asked for more bytes than are buffered.
    #[error("ring buffer underflow: {requested} bytes requested, {buffered} buffered")]
    Underflow {
        /// Bytes the caller asked for.
        requested: usize,
        /// Bytes currently buffered.
        buffered: usize,
    },
}

/// Fixed-capacity cyclic byte store.
#[derive(Debug)]
pub struct RingBuffer {
    buf: Box<[u8]>,
    head: usize,
    len: usize,
}

impl RingBuffer {
    /// Create a ring buffer holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self { buf: vec![0u8; capacity].into_boxed_slice(), head: 0, len: 0 }
    }

    /// Fixed capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free space remaining.
    pub fn available(&self) -> usize {
        self.capacity() - self.len
    }

    /// Enqueue all of `data`.
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` if `data` does not fit; the buffer is unchanged.
    pub fn put(&mut self, data: &[u8]) -> Result<(), RingBufferError> {
        if data.len() > self.available() {
            return Err(RingBufferError::CapacityExceeded {
                requested: data.len(),
                available: self.available(),
            });
        }

        let capacity = self.capacity();
        let tail = (self.head + self.len) % capacity;
        let first = data.len().min(capacity - tail);
        self.buf[tail..tail + first].copy_from_slice(&data[..first]);
        let rest = data.len() - first;
        self.buf[..rest].copy_from_slice(&data[first..]);
        self.len += data.len();
        Ok(())
    }

    /// Dequeue exactly `out.len()` bytes into `out`.
    ///
    /// # Errors
    ///
    /// `Underflow` if fewer bytes are buffered; the buffer is unchanged.
    pub fn take(&mut self, out: &mut [u8]) -> Result<(), RingBufferError> {
        if out.len() > self.len {
            return Err(RingBufferError::Underflow {
                requested: out.len(),
                buffered: self.len,
            });
        }

        let capacity = self.capacity();
        let first = out.len().min(capacity - self.head);
        out[..first].copy_from_slice(&self.buf[self.head..self.head + first]);
        let rest = out.len() - first;
        out[first..].copy_from_slice(&self.buf[..rest]);
        self.head = (self.head + out.len()) % capacity;
        self.len -= out.len();
        Ok(())
    }

    /// Drop up to `count` buffered bytes without copying them out.
    ///
    /// With `saturating` set, skipping past the end drops everything buffered
    /// and reports how many bytes were actually dropped. Without it, a skip
    /// past the end fails and leaves the buffer unchanged.
    pub fn skip(&mut self, count: usize, saturating: bool) -> Result<usize, RingBufferError> {
        let dropped = if count > self.len {
            if !saturating {
                return Err(RingBufferError::Underflow {
                    requested: count,
                    buffered: self.len,
                });
            }
            self.len
        } else {
            count
        };

        self.head = (self.head + dropped) % self.capacity();
        self.len -= dropped;
        Ok(dropped)
    }

    /// Drop buffered bytes from the tail, keeping the oldest `new_len`.
    ///
    /// # Errors
    ///
    /// `Underflow` if `new_len` exceeds the current length.
    pub fn truncate(&mut self, new_len: usize) -> Result<(), RingBufferError> {
        if new_len > self.len {
            return Err(RingBufferError::Underflow {
                requested: new_len,
                buffered: self.len,
            });
        }
        self.len = new_len;
        Ok(())
    }

    /// Copy the last `out.len()` buffered bytes into `out` without dequeuing.
    ///
    /// # Errors
    ///
    /// `Underflow` if fewer bytes are buffered.
    pub fn peek_tail(&self, out: &mut [u8]) -> Result<(), RingBufferError> {
        if out.len() > self.len {
            return Err(RingBufferError::Underflow {
                requested: out.len(),
                buffered: self.len,
            });
        }

        let capacity = self.capacity();
        let start = (self.head + self.len - out.len()) % capacity;
        let first = out.len().min(capacity - start);
        out[..first].copy_from_slice(&self.buf[start..start + first]);
        let rest = out.len() - first;
        out[first..].copy_from_slice(&self.buf[..rest]);
        Ok(())
    }
}
