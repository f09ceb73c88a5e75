use std::fmt;
use std::sync::Arc;

use crate::recycler::ArrayRecycler;

/// Element types a column store can hold.
pub trait Voxel: Copy + Default + PartialEq + Send + Sync + 'static {}
impl<T: Copy + Default + PartialEq + Send + Sync + 'static> Voxel for T {}

enum Repr<T> {
    Uniform(T),
    Dense(Box<[T]>),
}

/// One voxel channel of a chunk. Starts as a single uniform value and only
/// checks a dense buffer out of its recycler on the first write that differs.
///
/// Dropping the store hands the dense buffer back; each buffer returns at most once.
pub struct VoxelColumnStore<T: Voxel> {
    recycler: Arc<ArrayRecycler<T>>,
    repr: Repr<T>,
}

impl<T: Voxel> VoxelColumnStore<T> {
    pub fn new(recycler: Arc<ArrayRecycler<T>>, fill: T) -> Self {
        Self {
            recycler,
            repr: Repr::Uniform(fill),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.recycler.size_class().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_dense(&self) -> bool {
        matches!(self.repr, Repr::Dense(_))
    }

    pub fn uniform_value(&self) -> Option<T> {
        match self.repr {
            Repr::Uniform(v) => Some(v),
            Repr::Dense(_) => None,
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> T {
        match &self.repr {
            Repr::Uniform(v) => {
                debug_assert!(index < self.len());
                *v
            }
            Repr::Dense(buf) => buf[index],
        }
    }

    /// Write one voxel; a uniform store only goes dense when `value` differs.
    pub fn set(&mut self, index: usize, value: T) {
        if let Repr::Uniform(v) = self.repr {
            debug_assert!(index < self.len());
            if v == value {
                return;
            }
            self.activate();
        }
        if let Repr::Dense(buf) = &mut self.repr {
            buf[index] = value;
        }
    }

    /// Force a dense buffer, expanding the current uniform value into it.
    pub fn activate(&mut self) {
        if let Repr::Uniform(v) = self.repr {
            let mut buf = self.recycler.checkout();
            buf.fill(v);
            self.repr = Repr::Dense(buf);
        }
    }

    /// Replace the contents with `src`. Short input is padded with the default value.
    pub fn fill_from(&mut self, src: &[T]) {
        let n = self.len();
        if let Some(&first) = src.first() {
            let same = src[..src.len().min(n)].iter().all(|&v| v == first);
            let uniform = same && (src.len() >= n || first == T::default());
            if uniform {
                self.release();
                self.repr = Repr::Uniform(first);
                return;
            }
        } else {
            self.release();
            self.repr = Repr::Uniform(T::default());
            return;
        }
        if !self.is_dense() {
            self.repr = Repr::Dense(self.recycler.checkout());
        }
        if let Repr::Dense(buf) = &mut self.repr {
            let m = src.len().min(n);
            buf[..m].copy_from_slice(&src[..m]);
            buf[m..].fill(T::default());
        }
    }

    pub fn copy_to(&self, out: &mut [T]) {
        let m = out.len().min(self.len());
        match &self.repr {
            Repr::Uniform(v) => out[..m].fill(*v),
            Repr::Dense(buf) => out[..m].copy_from_slice(&buf[..m]),
        }
    }

    pub fn to_vec(&self) -> Vec<T> {
        let mut out = vec![T::default(); self.len()];
        self.copy_to(&mut out);
        out
    }

    /// Hand the dense buffer back and reset to the default value.
    /// Returns true if a buffer was released.
    pub fn release(&mut self) -> bool {
        match std::mem::replace(&mut self.repr, Repr::Uniform(T::default())) {
            Repr::Dense(buf) => {
                self.recycler.recycle(buf);
                true
            }
            Repr::Uniform(_) => false,
        }
    }

    /// Collapse back to uniform when every voxel holds the same value.
    pub fn compact(&mut self) -> bool {
        let first = match &self.repr {
            Repr::Dense(buf) => match buf.first() {
                Some(&f) if buf.iter().all(|&v| v == f) => f,
                _ => return false,
            },
            Repr::Uniform(_) => return false,
        };
        self.release();
        self.repr = Repr::Uniform(first);
        true
    }
}

impl<T: Voxel> Drop for VoxelColumnStore<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: Voxel + fmt::Debug> fmt::Debug for VoxelColumnStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Uniform(v) => write!(f, "VoxelColumnStore::Uniform({v:?})"),
            Repr::Dense(_) => write!(f, "VoxelColumnStore::Dense(len={})", self.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SizeClass;

    fn pool() -> Arc<ArrayRecycler<u16>> {
        Arc::new(ArrayRecycler::new(SizeClass(16), 4))
    }

    #[test]
    fn uniform_until_differing_write() {
        let p = pool();
        let mut s = VoxelColumnStore::new(p.clone(), 3u16);
        s.set(5, 3);
        assert!(!s.is_dense());
        assert_eq!(p.stats().checkouts, 0);
        s.set(5, 9);
        assert!(s.is_dense());
        assert_eq!(s.get(5), 9);
        assert_eq!(s.get(4), 3);
    }

    #[test]
    fn drop_returns_buffer_once() {
        let p = pool();
        {
            let mut s = VoxelColumnStore::new(p.clone(), 0u16);
            s.activate();
            assert!(s.release());
            assert!(!s.release());
        }
        let st = p.stats();
        assert_eq!(st.recycled, 1);
        assert_eq!(st.free, 1);
    }

    #[test]
    fn compact_collapses_uniform_dense() {
        let p = pool();
        let mut s = VoxelColumnStore::new(p.clone(), 1u16);
        s.set(0, 2);
        s.set(0, 1);
        assert!(s.compact());
        assert_eq!(s.uniform_value(), Some(1));
        assert_eq!(p.stats().free, 1);
    }

    #[test]
    fn fill_from_pads_short_input() {
        let p = pool();
        let mut s = VoxelColumnStore::new(p, 0u16);
        s.fill_from(&[1, 2, 3]);
        assert!(s.is_dense());
        let v = s.to_vec();
        assert_eq!(&v[..4], &[1, 2, 3, 0]);
        assert_eq!(v.len(), 16);
    }
}
