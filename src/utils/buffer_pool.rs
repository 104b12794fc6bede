//! # Buffer Pool
//!
//! Pool of send buffers used to coalesce queued frames into one socket
//! write. Every connection drains through a pooled buffer instead of
//! allocating one per write.
//!
//! ## Usage
//! ```rust
//! use game_protocol::utils::buffer_pool::BufferPool;
//!
//! let pool = BufferPool::new(4, 2048);
//! let mut buffer = pool.acquire();
//! buffer.extend_from_slice(&[0x00, 0x02, 0x29, 0x00]);
//! // returned to the pool on drop
//! ```

use bytes::BytesMut;
use std::sync::{Arc, Mutex};

/// A pooled buffer that returns itself to the pool when dropped
pub struct PooledBuffer {
    buffer: BytesMut,
    pool: Arc<Mutex<Vec<BytesMut>>>,
    capacity: usize,
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        // buffers that grew past their class are left to the allocator
        if self.buffer.capacity() <= self.capacity * 2 {
            self.buffer.clear();
            if let Ok(mut pool) = self.pool.lock() {
                pool.push(std::mem::take(&mut self.buffer));
            }
        }
    }
}

impl std::ops::Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl std::ops::DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

/// Thread-safe pool of fixed-capacity send buffers
#[derive(Clone)]
pub struct BufferPool {
    pool: Arc<Mutex<Vec<BytesMut>>>,
    capacity: usize,
}

impl BufferPool {
    /// Pre-allocate `pool_size` buffers of `capacity` bytes
    pub fn new(pool_size: usize, capacity: usize) -> Self {
        let pool = (0..pool_size)
            .map(|_| BytesMut::with_capacity(capacity))
            .collect();
        Self {
            pool: Arc::new(Mutex::new(pool)),
            capacity,
        }
    }

    /// Take a buffer from the pool, allocating when it is empty
    pub fn acquire(&self) -> PooledBuffer {
        let buffer = self
            .pool
            .lock()
            .ok()
            .and_then(|mut pool| pool.pop())
            .unwrap_or_else(|| BytesMut::with_capacity(self.capacity));

        PooledBuffer {
            buffer,
            pool: self.pool.clone(),
            capacity: self.capacity,
        }
    }

    /// Capacity of every buffer handed out
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of idle buffers
    pub fn available(&self) -> usize {
        self.pool.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_returns_on_drop() {
        let pool = BufferPool::new(2, 64);
        assert_eq!(pool.available(), 2);

        let mut buf = pool.acquire();
        buf.extend_from_slice(b"abc");
        assert_eq!(pool.available(), 1);

        drop(buf);
        assert_eq!(pool.available(), 2);
        assert!(pool.acquire().is_empty());
    }

    #[test]
    fn test_empty_pool_allocates() {
        let pool = BufferPool::new(0, 64);
        let buf = pool.acquire();
        assert!(buf.capacity() >= 64);
        drop(buf);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_grown_buffer_not_returned() {
        let pool = BufferPool::new(0, 16);
        {
            let mut buf = pool.acquire();
            buf.extend_from_slice(&[0u8; 256]);
        }
        assert_eq!(pool.available(), 0);
    }
}
