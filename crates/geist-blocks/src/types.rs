use serde::{Deserialize, Serialize};

/// Raw block id as stored in the block channel of a chunk.
pub type BlockId = u16;

pub const AIR: BlockId = 0;

/// Runtime properties of one block id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockType {
    pub id: BlockId,
    pub name: String,
    /// Collides and occludes neighbouring faces when meshed.
    pub solid: bool,
    /// Stops sunlight from entering this voxel.
    pub blocks_sunlight: bool,
    /// Lets lamp light pass through this voxel.
    pub propagates_light: bool,
    /// Light lost when entering this voxel; never below 1 for passable media.
    pub light_attenuation: u8,
    /// Emitted lamp colour per component (r, g, b), 0 for non-emitters.
    pub emission: [u8; 3],
    /// Meshed in the separate water pass.
    pub liquid: bool,
}

impl BlockType {
    #[inline]
    pub fn is_emitter(&self) -> bool {
        self.emission.iter().any(|c| *c > 0)
    }

    #[inline]
    pub fn is_air(&self) -> bool {
        self.id == AIR
    }
}
