use serde::{Deserialize, Serialize};

use crate::coord::{CHUNK_LAYER, CHUNK_SIZE};

/// Height value of a column sample that the generator has not filled yet.
pub const UNLOADED_HEIGHT: i32 = i32::MIN;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Biome {
    #[default]
    Plains,
    Forest,
    Desert,
    Ocean,
}

impl Biome {
    pub fn surface_block(self) -> &'static str {
        match self {
            Biome::Plains | Biome::Forest => "grass",
            Biome::Desert | Biome::Ocean => "sand",
        }
    }

    pub fn subsoil_block(self) -> &'static str {
        match self {
            Biome::Plains | Biome::Forest => "dirt",
            Biome::Desert | Biome::Ocean => "sand",
        }
    }

    /// Multiplier applied to the configured tree probability.
    pub fn tree_density(self) -> f32 {
        match self {
            Biome::Forest => 4.0,
            Biome::Plains => 1.0,
            Biome::Desert | Biome::Ocean => 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeightData {
    pub height: i32,
    pub biome: Biome,
    pub flora_density: f32,
}

impl HeightData {
    pub const UNLOADED: HeightData = HeightData {
        height: UNLOADED_HEIGHT,
        biome: Biome::Plains,
        flora_density: 0.0,
    };

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.height != UNLOADED_HEIGHT
    }
}

impl Default for HeightData {
    fn default() -> Self {
        Self::UNLOADED
    }
}

/// Per-(x, z) samples for one chunk column, indexed `z * CHUNK_SIZE + x`.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnHeights {
    samples: Box<[HeightData]>,
}

impl ColumnHeights {
    pub fn unloaded() -> Self {
        Self {
            samples: vec![HeightData::UNLOADED; CHUNK_LAYER].into_boxed_slice(),
        }
    }

    pub fn uniform(sample: HeightData) -> Self {
        Self {
            samples: vec![sample; CHUNK_LAYER].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn get(&self, x: usize, z: usize) -> &HeightData {
        &self.samples[z * CHUNK_SIZE + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, z: usize, sample: HeightData) {
        self.samples[z * CHUNK_SIZE + x] = sample;
    }

    pub fn is_complete(&self) -> bool {
        self.samples.iter().all(HeightData::is_loaded)
    }

    pub fn max_height(&self) -> Option<i32> {
        self.samples
            .iter()
            .filter(|s| s.is_loaded())
            .map(|s| s.height)
            .max()
    }
}

impl Default for ColumnHeights {
    fn default() -> Self {
        Self::unloaded()
    }
}
