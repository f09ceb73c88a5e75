use geist_chunk::LightComponent;
use geist_world::{ChunkCoord, Face};

/// Light work crossing into a neighboring chunk.
///
/// `index` is already expressed in the target chunk. `level` is the value of
/// the sending voxel (or its value before removal), `travel` the direction of the step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightMessage {
    pub target: ChunkCoord,
    pub component: LightComponent,
    pub index: u32,
    pub level: u8,
    pub travel: Face,
    pub removal: bool,
}
