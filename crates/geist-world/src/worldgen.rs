use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use geist_blocks::BlockRegistry;

use crate::column::Biome;
use crate::generation::{FlatGenerator, NoiseGenerator, TerrainGenerator};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldGenConfig {
    #[serde(default = "default_seed")]
    pub seed: i32,
    #[serde(default = "default_mode")]
    pub mode: WorldGenMode,
    #[serde(default)]
    pub flat: FlatParams,
    #[serde(default)]
    pub noise: NoiseParams,
}

impl Default for WorldGenConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            mode: default_mode(),
            flat: FlatParams::default(),
            noise: NoiseParams::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorldGenMode {
    Noise,
    Flat,
}

fn default_seed() -> i32 {
    1337
}
fn default_mode() -> WorldGenMode {
    WorldGenMode::Noise
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlatParams {
    #[serde(default = "default_flat_height")]
    pub height: i32,
    #[serde(default)]
    pub biome: Biome,
}
fn default_flat_height() -> i32 {
    64
}
impl Default for FlatParams {
    fn default() -> Self {
        Self {
            height: default_flat_height(),
            biome: Biome::Plains,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NoiseParams {
    #[serde(default = "default_height_freq")]
    pub frequency: f32,
    #[serde(default = "default_biome_freq")]
    pub biome_frequency: f32,
    #[serde(default = "default_min_height")]
    pub min_height: i32,
    #[serde(default = "default_max_height")]
    pub max_height: i32,
    #[serde(default = "default_sea_level")]
    pub sea_level: i32,
    #[serde(default = "default_tree_probability")]
    pub tree_probability: f32,
}
fn default_height_freq() -> f32 {
    0.008
}
fn default_biome_freq() -> f32 {
    0.002
}
fn default_min_height() -> i32 {
    40
}
fn default_max_height() -> i32 {
    100
}
fn default_sea_level() -> i32 {
    56
}
fn default_tree_probability() -> f32 {
    0.01
}
impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            frequency: default_height_freq(),
            biome_frequency: default_biome_freq(),
            min_height: default_min_height(),
            max_height: default_max_height(),
            sea_level: default_sea_level(),
            tree_probability: default_tree_probability(),
        }
    }
}

impl WorldGenConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: WorldGenConfig = toml::from_str(s)?;
        Ok(cfg)
    }

    pub fn build_generator(
        &self,
        reg: &BlockRegistry,
    ) -> Result<Arc<dyn TerrainGenerator>, Box<dyn Error>> {
        let generator: Arc<dyn TerrainGenerator> = match self.mode {
            WorldGenMode::Flat => Arc::new(FlatGenerator::new(reg, self.flat.height, self.flat.biome)?),
            WorldGenMode::Noise => Arc::new(NoiseGenerator::new(reg, self.seed, self.noise.clone())?),
        };
        log::info!(
            target: "grid",
            "worldgen mode={:?} seed={}",
            self.mode,
            self.seed
        );
        Ok(generator)
    }
}
