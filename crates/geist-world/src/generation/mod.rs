//! Terrain generators consumed by the chunk runtime as pure functions of chunk
//! position and column height data.

mod flat;
mod noise;
pub mod trees;

pub use flat::FlatGenerator;
pub use noise::NoiseGenerator;

use geist_blocks::{AIR, BlockId, BlockRegistry};
use serde::{Deserialize, Serialize};

use crate::column::{Biome, ColumnHeights};
use crate::coord::{CHUNK_SIZE, CHUNK_VOLUME, ChunkCoord, ColumnCoord, voxel_index};
use crate::error::WorldError;

/// How far generation of a chunk has progressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GenLevel {
    #[default]
    Terrain = 0,
    Flora = 1,
    Script = 2,
    Done = 3,
}

impl GenLevel {
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> GenLevel {
        match v {
            0 => GenLevel::Terrain,
            1 => GenLevel::Flora,
            2 => GenLevel::Script,
            _ => GenLevel::Done,
        }
    }
}

/// A tree requested by terrain generation, placed later once neighbors exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloraPlacement {
    /// World position of the lowest trunk block.
    pub base: (i32, i32, i32),
    pub trunk_height: u8,
    pub leaf_radius: u8,
}

#[derive(Clone, Debug)]
pub struct GeneratedChunk {
    pub blocks: Vec<BlockId>,
    /// Empty means all zero.
    pub tertiary: Vec<u16>,
    pub flora: Vec<FloraPlacement>,
    pub level: GenLevel,
}

pub trait TerrainGenerator: Send + Sync {
    /// Fill the per-column samples for every chunk stacked at `column`.
    fn generate_heightmap(&self, column: ColumnCoord, out: &mut ColumnHeights);

    /// Produce voxel data for `coord`. `upto` bounds how far generation goes;
    /// the returned level is `Done` unless flora is still waiting to be placed.
    fn generate_chunk(
        &self,
        coord: ChunkCoord,
        heights: &ColumnHeights,
        upto: GenLevel,
    ) -> Result<GeneratedChunk, WorldError>;
}

/// Block ids every generator writes, resolved once from the registry.
#[derive(Clone, Copy, Debug)]
pub struct Palette {
    pub stone: BlockId,
    pub dirt: BlockId,
    pub grass: BlockId,
    pub sand: BlockId,
    pub water: BlockId,
}

const SUBSOIL_DEPTH: i32 = 3;

impl Palette {
    pub fn resolve(reg: &BlockRegistry) -> Result<Self, String> {
        let id = |name: &str| {
            reg.id_by_name(name)
                .ok_or_else(|| format!("block registry has no '{name}' block"))
        };
        Ok(Self {
            stone: id("stone")?,
            dirt: id("dirt")?,
            grass: id("grass")?,
            sand: id("sand")?,
            water: id("water")?,
        })
    }

    fn surface(&self, biome: Biome) -> BlockId {
        match biome.surface_block() {
            "grass" => self.grass,
            _ => self.sand,
        }
    }

    fn subsoil(&self, biome: Biome) -> BlockId {
        match biome.subsoil_block() {
            "dirt" => self.dirt,
            _ => self.sand,
        }
    }

    /// Block at world height `wy` of a column whose surface sits at `height`.
    pub fn column_block(&self, wy: i32, height: i32, biome: Biome, sea_level: Option<i32>) -> BlockId {
        if wy > height {
            match sea_level {
                Some(sea) if wy <= sea => self.water,
                _ => AIR,
            }
        } else if wy == height {
            self.surface(biome)
        } else if wy >= height - SUBSOIL_DEPTH {
            self.subsoil(biome)
        } else {
            self.stone
        }
    }
}

pub(crate) fn fill_terrain(
    coord: ChunkCoord,
    heights: &ColumnHeights,
    palette: &Palette,
    sea_level: Option<i32>,
) -> Result<Vec<BlockId>, WorldError> {
    let mut blocks = vec![AIR; CHUNK_VOLUME];
    let (_, oy, _) = coord.origin();
    for z in 0..CHUNK_SIZE {
        for x in 0..CHUNK_SIZE {
            let sample = heights.get(x, z);
            if !sample.is_loaded() {
                return Err(WorldError::Generation {
                    coord,
                    reason: format!("column sample ({x}, {z}) has no height"),
                });
            }
            for y in 0..CHUNK_SIZE {
                let wy = oy + y as i32;
                blocks[voxel_index(x, y, z)] =
                    palette.column_block(wy, sample.height, sample.biome, sea_level);
            }
        }
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::HeightData;

    #[test]
    fn plains_column_layers() {
        let reg = BlockRegistry::builtin();
        let p = Palette::resolve(&reg).unwrap();
        assert_eq!(p.column_block(65, 64, Biome::Plains, None), AIR);
        assert_eq!(p.column_block(64, 64, Biome::Plains, None), p.grass);
        assert_eq!(p.column_block(61, 64, Biome::Plains, None), p.dirt);
        assert_eq!(p.column_block(60, 64, Biome::Plains, None), p.stone);
        assert_eq!(p.column_block(50, 40, Biome::Ocean, Some(56)), p.water);
    }

    #[test]
    fn unloaded_samples_fail_generation() {
        let reg = BlockRegistry::builtin();
        let p = Palette::resolve(&reg).unwrap();
        let mut h = ColumnHeights::uniform(HeightData {
            height: 10,
            biome: Biome::Plains,
            flora_density: 0.0,
        });
        h.set(3, 3, HeightData::UNLOADED);
        let err = fill_terrain(ChunkCoord::new(0, 0, 0), &h, &p, None).unwrap_err();
        assert!(matches!(err, WorldError::Generation { .. }));
    }

    #[test]
    fn gen_level_round_trips_through_u8() {
        for l in [GenLevel::Terrain, GenLevel::Flora, GenLevel::Script, GenLevel::Done] {
            assert_eq!(GenLevel::from_u8(l.as_u8()), l);
        }
    }
}
