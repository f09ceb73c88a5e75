use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use geist_world::{ChunkCoord, WorldError};
use hashbrown::HashMap;

use crate::{ChunkStore, VoxelBuffer};

/// Encoded chunks kept in memory. Can be told to fail the next N calls with a
/// transient error, which is how retry paths are exercised.
#[derive(Default)]
pub struct MemoryStore {
    chunks: Mutex<HashMap<ChunkCoord, Vec<u8>>>,
    fail_loads: AtomicUsize,
    fail_saves: AtomicUsize,
    saves: AtomicUsize,
    loads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_loads(&self, n: usize) {
        self.fail_loads.store(n, Ordering::Release);
    }

    pub fn fail_next_saves(&self, n: usize) {
        self.fail_saves.store(n, Ordering::Release);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Acquire)
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Acquire)
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&coord)
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl ChunkStore for MemoryStore {
    fn load(&self, coord: ChunkCoord) -> Result<Option<VoxelBuffer>, WorldError> {
        self.loads.fetch_add(1, Ordering::AcqRel);
        if Self::take_failure(&self.fail_loads) {
            return Err(WorldError::TransientIo {
                coord,
                source: io::Error::new(io::ErrorKind::Interrupted, "injected load failure"),
            });
        }
        let bytes = self
            .chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&coord)
            .cloned();
        bytes.map(|b| VoxelBuffer::decode(&b, coord)).transpose()
    }

    fn save(&self, coord: ChunkCoord, buf: &VoxelBuffer) -> Result<(), WorldError> {
        if Self::take_failure(&self.fail_saves) {
            return Err(WorldError::TransientIo {
                coord,
                source: io::Error::new(io::ErrorKind::Interrupted, "injected save failure"),
            });
        }
        let bytes = buf.encode(coord)?;
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(coord, bytes);
        self.saves.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
