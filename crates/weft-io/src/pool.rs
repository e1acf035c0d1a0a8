//! Packet buffer pool.
//!
//! Readers obtain buffers here and writers return them, so the forwarding
//! hot path never allocates. A buffer is reclaimed exactly once per
//! lifecycle: ownership of the [`RouterPacket`] moves reader → pipeline →
//! writer, and whichever stage finishes with it calls [`BufferPool::reclaim`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use weft_core::packet::{RouterPacket, PKT_BUF_SIZE};

/// Default number of buffers retained in the freelist.
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// Freelist of reusable packet buffers.
pub struct BufferPool {
    free: Mutex<Vec<RouterPacket>>,
    capacity: usize,
    buf_size: usize,
    taken: AtomicU64,
    reclaimed: AtomicU64,
}

impl BufferPool {
    pub fn new(capacity: usize, buf_size: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
            buf_size,
            taken: AtomicU64::new(0),
            reclaimed: AtomicU64::new(0),
        }
    }

    /// Pop a pooled buffer, or allocate a fresh one when the pool is empty.
    pub fn get(&self) -> RouterPacket {
        self.taken.fetch_add(1, Ordering::Relaxed);
        match self.lock_free().pop() {
            Some(pkt) => pkt,
            None => RouterPacket::with_capacity(self.buf_size),
        }
    }

    /// Reset a buffer and return it to the freelist. A pool already at
    /// capacity drops the buffer instead of growing.
    pub fn reclaim(&self, mut pkt: RouterPacket) {
        self.reclaimed.fetch_add(1, Ordering::Relaxed);
        pkt.reset();
        let mut free = self.lock_free();
        if free.len() < self.capacity {
            free.push(pkt);
        }
    }

    /// Buffers handed out and not yet reclaimed.
    pub fn outstanding(&self) -> u64 {
        self.taken.load(Ordering::Relaxed) - self.reclaimed.load(Ordering::Relaxed)
    }

    /// Buffers currently idle in the freelist.
    pub fn idle(&self) -> usize {
        self.lock_free().len()
    }

    fn lock_free(&self) -> std::sync::MutexGuard<'_, Vec<RouterPacket>> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY, PKT_BUF_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_allocates_when_empty() {
        let pool = BufferPool::new(4, 128);
        assert_eq!(pool.idle(), 0);
        let pkt = pool.get();
        assert_eq!(pool.outstanding(), 1);
        pool.reclaim(pkt);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn reclaim_resets_the_buffer() {
        let pool = BufferPool::new(4, 128);
        let mut pkt = pool.get();
        pkt.load(b"stale bytes");
        pkt.resolved.up_flag = Some(true);
        pool.reclaim(pkt);

        let pkt = pool.get();
        assert!(pkt.is_empty());
        assert!(pkt.resolved.up_flag.is_none());
    }

    #[test]
    fn pool_at_capacity_drops_excess() {
        let pool = BufferPool::new(2, 64);
        let a = pool.get();
        let b = pool.get();
        let c = pool.get();
        pool.reclaim(a);
        pool.reclaim(b);
        pool.reclaim(c);
        assert_eq!(pool.idle(), 2, "third buffer must be dropped, not retained");
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn outstanding_tracks_every_path() {
        let pool = BufferPool::new(8, 64);
        let pkts: Vec<_> = (0..5).map(|_| pool.get()).collect();
        assert_eq!(pool.outstanding(), 5);
        for p in pkts {
            pool.reclaim(p);
        }
        assert_eq!(pool.outstanding(), 0);
    }
}
