use thiserror::Error;

use crate::coord::{ChunkCoord, Face};

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("transient io failure for chunk {coord}: {source}")]
    TransientIo {
        coord: ChunkCoord,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt voxel data for chunk {coord}: {reason}")]
    Corrupt { coord: ChunkCoord, reason: String },
    #[error("generation failed for chunk {coord}: {reason}")]
    Generation { coord: ChunkCoord, reason: String },
    #[error("chunk {coord} has a half-linked {face:?} neighbor")]
    InconsistentNeighborState { coord: ChunkCoord, face: Face },
}

impl WorldError {
    pub fn coord(&self) -> ChunkCoord {
        match self {
            WorldError::TransientIo { coord, .. }
            | WorldError::Corrupt { coord, .. }
            | WorldError::Generation { coord, .. }
            | WorldError::InconsistentNeighborState { coord, .. } => *coord,
        }
    }

    /// Whether the scheduler should retry the same state.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, WorldError::Corrupt { .. })
    }
}
