//! Chunk persistence: the store interface the runtime loads from and saves to.
#![forbid(unsafe_code)]

mod buffer;
mod dir;
mod memory;

pub use buffer::VoxelBuffer;
pub use dir::DirStore;
pub use memory::MemoryStore;

use geist_world::{ChunkCoord, WorldError};

/// Load and save whole-chunk voxel buffers. Called from IO worker threads.
pub trait ChunkStore: Send + Sync {
    /// `Ok(None)` when nothing was ever saved for `coord`.
    fn load(&self, coord: ChunkCoord) -> Result<Option<VoxelBuffer>, WorldError>;

    fn save(&self, coord: ChunkCoord, buf: &VoxelBuffer) -> Result<(), WorldError>;
}
