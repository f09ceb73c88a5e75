use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

/// Element count of every buffer handed out by one recycler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SizeClass(pub usize);

impl SizeClass {
    #[inline]
    pub fn len(self) -> usize {
        self.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecyclerStats {
    pub checkouts: u64,
    pub recycled: u64,
    pub allocated: usize,
    pub fallback_allocations: u64,
    pub free: usize,
}

/// Lock-free pool of fixed-length arrays, keyed by element type and size class.
///
/// Buffers come back with whatever contents they were recycled with; callers
/// overwrite before reading.
pub struct ArrayRecycler<T> {
    size_class: SizeClass,
    free_tx: Sender<Box<[T]>>,
    free_rx: Receiver<Box<[T]>>,
    max_free: usize,
    allocated: AtomicUsize,
    checkouts: AtomicU64,
    recycled: AtomicU64,
    fallback: AtomicU64,
}

impl<T: Copy + Default + Send + 'static> ArrayRecycler<T> {
    pub fn new(size_class: SizeClass, max_free: usize) -> Self {
        let max_free = max_free.max(1);
        let (free_tx, free_rx) = bounded(max_free);
        Self {
            size_class,
            free_tx,
            free_rx,
            max_free,
            allocated: AtomicUsize::new(0),
            checkouts: AtomicU64::new(0),
            recycled: AtomicU64::new(0),
            fallback: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn size_class(&self) -> SizeClass {
        self.size_class
    }

    /// Take a buffer from the free list, or allocate one when the list is empty.
    pub fn checkout(&self) -> Box<[T]> {
        self.checkouts.fetch_add(1, Ordering::Relaxed);
        if let Ok(buf) = self.free_rx.try_recv() {
            return buf;
        }
        let live = self.allocated.fetch_add(1, Ordering::AcqRel) + 1;
        if live > self.max_free {
            // Pool exhausted under load: keep serving the caller with a direct allocation.
            let n = self.fallback.fetch_add(1, Ordering::Relaxed) + 1;
            if n.is_power_of_two() {
                log::debug!(
                    target: "storage",
                    "recycler({}) past free-list bound: live={} fallbacks={}",
                    self.size_class.len(),
                    live,
                    n
                );
            }
        }
        vec![T::default(); self.size_class.len()].into_boxed_slice()
    }

    /// Return a buffer. Wrong-sized buffers and overflow past `max_free` are dropped.
    pub fn recycle(&self, buf: Box<[T]>) -> bool {
        if buf.len() != self.size_class.len() {
            log::warn!(
                target: "storage",
                "recycler({}) rejected buffer of len {}",
                self.size_class.len(),
                buf.len()
            );
            return false;
        }
        self.recycled.fetch_add(1, Ordering::Relaxed);
        match self.free_tx.try_send(buf) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.allocated.fetch_sub(1, Ordering::AcqRel);
                false
            }
        }
    }

    pub fn stats(&self) -> RecyclerStats {
        RecyclerStats {
            checkouts: self.checkouts.load(Ordering::Relaxed),
            recycled: self.recycled.load(Ordering::Relaxed),
            allocated: self.allocated.load(Ordering::Relaxed),
            fallback_allocations: self.fallback.load(Ordering::Relaxed),
            free: self.free_rx.len(),
        }
    }
}

/// The two pools every chunk draws its channels from (`u16` ids/lamp/tertiary, `u8` sunlight).
#[derive(Clone)]
pub struct VoxelRecyclers {
    pub shorts: Arc<ArrayRecycler<u16>>,
    pub bytes: Arc<ArrayRecycler<u8>>,
}

impl VoxelRecyclers {
    pub fn new(size_class: SizeClass, max_free: usize) -> Self {
        Self {
            shorts: Arc::new(ArrayRecycler::new(size_class, max_free)),
            bytes: Arc::new(ArrayRecycler::new(size_class, max_free)),
        }
    }

    /// Sized from the number of live chunks the session expects; three u16 channels per chunk.
    pub fn for_chunks(size_class: SizeClass, expected_chunks: usize) -> Self {
        let expected = expected_chunks.max(1);
        Self {
            shorts: Arc::new(ArrayRecycler::new(size_class, expected * 3)),
            bytes: Arc::new(ArrayRecycler::new(size_class, expected)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_reuses_recycled_buffer() {
        let pool = ArrayRecycler::<u16>::new(SizeClass(8), 4);
        let mut a = pool.checkout();
        a[3] = 77;
        assert!(pool.recycle(a));
        let b = pool.checkout();
        assert_eq!(b.len(), 8);
        // Same allocation back, contents are not cleared.
        assert_eq!(b[3], 77);
        let s = pool.stats();
        assert_eq!(s.checkouts, 2);
        assert_eq!(s.recycled, 1);
        assert_eq!(s.allocated, 1);
    }

    #[test]
    fn exhaustion_falls_back_to_allocation() {
        let pool = ArrayRecycler::<u8>::new(SizeClass(4), 2);
        let bufs: Vec<_> = (0..5).map(|_| pool.checkout()).collect();
        assert!(bufs.iter().all(|b| b.len() == 4));
        assert_eq!(pool.stats().fallback_allocations, 3);
        let kept = bufs.into_iter().map(|b| pool.recycle(b)).filter(|k| *k).count();
        assert_eq!(kept, 2);
        assert_eq!(pool.stats().free, 2);
        assert_eq!(pool.stats().allocated, 2);
    }

    #[test]
    fn wrong_size_is_rejected() {
        let pool = ArrayRecycler::<u8>::new(SizeClass(4), 2);
        assert!(!pool.recycle(vec![0u8; 3].into_boxed_slice()));
        assert_eq!(pool.stats().free, 0);
    }
}
