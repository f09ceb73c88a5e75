use geist_world::ChunkCoord;

use crate::mesh::ChunkMesh;

/// Things the owning thread reports to its caller, drained with
/// `ChunkWorld::drain_events`.
#[derive(Clone, Debug, PartialEq)]
pub enum WorldEvent {
    /// A mesh pass finished and the chunk can be drawn.
    ChunkDrawable { coord: ChunkCoord, mesh: ChunkMesh },
    /// A save failed; the chunk stays dirty and is retried.
    SaveFailed {
        coord: ChunkCoord,
        attempt: u32,
        reason: String,
    },
    /// Retries ran out. The chunk's unsaved edits are lost if it is evicted.
    SaveAbandoned { coord: ChunkCoord },
    /// Generation kept failing and the chunk stays in `Generate`.
    ChunkStuck { coord: ChunkCoord, reason: String },
    ChunkEvicted { coord: ChunkCoord },
}
