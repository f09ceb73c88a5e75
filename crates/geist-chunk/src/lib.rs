//! Chunks, their lifecycle state, and the grid that links neighbors.
#![forbid(unsafe_code)]

mod chunk;
mod data;
mod grid;
mod light;
mod state;

pub use chunk::{Chunk, ChunkGridData, ChunkHandle, TaskKind, TaskTicket};
pub use data::{ChunkData, ChunkSnapshot, LightWriter, MeshReader};
pub use grid::{ChunkGrid, SlotId};
pub use light::{ChannelQueues, LampColor, LightComponent, LightNode, LightQueues, MAX_LIGHT};
pub use state::ChunkState;
