use geist_blocks::BlockRegistry;

use super::{GenLevel, GeneratedChunk, Palette, TerrainGenerator, fill_terrain};
use crate::column::{Biome, ColumnHeights, HeightData};
use crate::coord::{ChunkCoord, ColumnCoord};
use crate::error::WorldError;

/// Constant-height terrain with one biome everywhere. No flora.
#[derive(Clone, Debug)]
pub struct FlatGenerator {
    height: i32,
    biome: Biome,
    palette: Palette,
}

impl FlatGenerator {
    pub fn new(reg: &BlockRegistry, height: i32, biome: Biome) -> Result<Self, String> {
        Ok(Self {
            height,
            biome,
            palette: Palette::resolve(reg)?,
        })
    }

    pub fn height(&self) -> i32 {
        self.height
    }
}

impl TerrainGenerator for FlatGenerator {
    fn generate_heightmap(&self, _column: ColumnCoord, out: &mut ColumnHeights) {
        *out = ColumnHeights::uniform(HeightData {
            height: self.height,
            biome: self.biome,
            flora_density: 0.0,
        });
    }

    fn generate_chunk(
        &self,
        coord: ChunkCoord,
        heights: &ColumnHeights,
        _upto: GenLevel,
    ) -> Result<GeneratedChunk, WorldError> {
        let blocks = fill_terrain(coord, heights, &self.palette, None)?;
        Ok(GeneratedChunk {
            blocks,
            tertiary: Vec::new(),
            flora: Vec::new(),
            level: GenLevel::Done,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{CHUNK_SIZE, voxel_index};
    use geist_blocks::AIR;

    #[test]
    fn plains_surface_at_height_64() {
        let reg = BlockRegistry::builtin();
        let g = FlatGenerator::new(&reg, 64, Biome::Plains).unwrap();
        let coord = ChunkCoord::new(0, 2, 0);
        let mut h = ColumnHeights::unloaded();
        g.generate_heightmap(coord.column(), &mut h);
        assert!(h.is_complete());
        let out = g.generate_chunk(coord, &h, GenLevel::Done).unwrap();
        assert_eq!(out.level, GenLevel::Done);
        let grass = reg.id_by_name("grass").unwrap();
        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                assert_eq!(out.blocks[voxel_index(x, 0, z)], grass);
                for y in 1..CHUNK_SIZE {
                    assert_eq!(out.blocks[voxel_index(x, y, z)], AIR);
                }
            }
        }
        let below = g
            .generate_chunk(coord.with_y(1), &h, GenLevel::Done)
            .unwrap();
        let dirt = reg.id_by_name("dirt").unwrap();
        let stone = reg.id_by_name("stone").unwrap();
        assert_eq!(below.blocks[voxel_index(0, 31, 0)], dirt);
        assert_eq!(below.blocks[voxel_index(0, 0, 0)], stone);
    }
}
