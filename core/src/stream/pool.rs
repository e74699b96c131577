//! Bounded free list of byte buffers shared by the dispatcher, workers and sink.
//!
//! Buffers move by value: `acquire` hands one out, `release` takes it back.
//! At most `max_buffers` are retained, each no larger than `max_buffer_len`,
//! so idle memory held by the pool has a fixed ceiling.

use crossbeam::queue::ArrayQueue;

pub struct BufferPool {
    free: ArrayQueue<Vec<u8>>,
    initial_capacity: usize,
    max_buffer_len: usize,
}

impl BufferPool {
    pub fn new(max_buffers: usize, initial_capacity: usize, max_buffer_len: usize) -> Self {
        Self {
            free: ArrayQueue::new(max_buffers.max(1)),
            initial_capacity,
            max_buffer_len,
        }
    }

    pub fn acquire(&self) -> Vec<u8> {
        self.free
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.initial_capacity))
    }

    /// Return a buffer. Oversized buffers, or any beyond the retention bound,
    /// are dropped.
    pub fn release(&self, mut buf: Vec<u8>) {
        if buf.capacity() > self.max_buffer_len {
            return;
        }
        buf.clear();
        let _ = self.free.push(buf);
    }

    /// Drop retained buffers until at most `keep` remain.
    pub fn trim(&self, keep: usize) -> usize {
        let mut dropped = 0;
        while self.free.len() > keep {
            if self.free.pop().is_none() {
                break;
            }
            dropped += 1;
        }
        dropped
    }

    pub fn retained(&self) -> usize {
        self.free.len()
    }

    pub fn max_buffers(&self) -> usize {
        self.free.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_buffers_are_reused_cleared() {
        let pool = BufferPool::new(2, 8, 64);
        let mut a = pool.acquire();
        a.extend_from_slice(b"row");
        let cap = a.capacity();
        pool.release(a);
        let b = pool.acquire();
        assert!(b.is_empty());
        assert_eq!(b.capacity(), cap);
    }

    #[test]
    fn retention_is_bounded() {
        let pool = BufferPool::new(2, 8, 64);
        for _ in 0..5 {
            pool.release(Vec::with_capacity(8));
        }
        assert_eq!(pool.retained(), 2);
        pool.release(Vec::with_capacity(1024));
        assert_eq!(pool.retained(), 2);
        assert_eq!(pool.trim(0), 2);
        assert_eq!(pool.retained(), 0);
    }
}
