use fastnoise_lite::{FastNoiseLite, NoiseType};
use geist_blocks::BlockRegistry;

use super::trees::roll_tree;
use super::{GenLevel, GeneratedChunk, Palette, TerrainGenerator, fill_terrain};
use crate::column::{Biome, ColumnHeights, HeightData};
use crate::coord::{CHUNK_SIZE, CHUNK_SIZE_I32, ChunkCoord, ColumnCoord};
use crate::error::WorldError;
use crate::worldgen::NoiseParams;

/// OpenSimplex2 heightmap with a second field choosing the biome.
pub struct NoiseGenerator {
    seed: i32,
    params: NoiseParams,
    palette: Palette,
}

impl NoiseGenerator {
    pub fn new(reg: &BlockRegistry, seed: i32, params: NoiseParams) -> Result<Self, String> {
        if params.max_height < params.min_height {
            return Err(format!(
                "noise max_height {} is below min_height {}",
                params.max_height, params.min_height
            ));
        }
        Ok(Self {
            seed,
            params,
            palette: Palette::resolve(reg)?,
        })
    }

    fn terrain_noise(&self) -> FastNoiseLite {
        let mut n = FastNoiseLite::with_seed(self.seed);
        n.set_noise_type(Some(NoiseType::OpenSimplex2));
        n.set_frequency(Some(self.params.frequency));
        n
    }

    fn biome_noise(&self) -> FastNoiseLite {
        let mut n = FastNoiseLite::with_seed(self.seed ^ 0x1203_5F31);
        n.set_noise_type(Some(NoiseType::OpenSimplex2));
        n.set_frequency(Some(self.params.biome_frequency));
        n
    }

    fn pick_biome(&self, height: i32, b: f32) -> Biome {
        if height < self.params.sea_level {
            Biome::Ocean
        } else if b > 0.45 {
            Biome::Desert
        } else if b < -0.3 {
            Biome::Forest
        } else {
            Biome::Plains
        }
    }
}

impl TerrainGenerator for NoiseGenerator {
    fn generate_heightmap(&self, column: ColumnCoord, out: &mut ColumnHeights) {
        let terrain = self.terrain_noise();
        let biomes = self.biome_noise();
        let span = (self.params.max_height - self.params.min_height) as f32;
        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let wx = (column.cx * CHUNK_SIZE_I32 + x as i32) as f32;
                let wz = (column.cz * CHUNK_SIZE_I32 + z as i32) as f32;
                let n = ((terrain.get_noise_2d(wx, wz) + 1.0) * 0.5).clamp(0.0, 1.0);
                let height = self.params.min_height + (n * span).round() as i32;
                let biome = self.pick_biome(height, biomes.get_noise_2d(wx, wz));
                out.set(
                    x,
                    z,
                    HeightData {
                        height,
                        biome,
                        flora_density: self.params.tree_probability * biome.tree_density(),
                    },
                );
            }
        }
    }

    fn generate_chunk(
        &self,
        coord: ChunkCoord,
        heights: &ColumnHeights,
        upto: GenLevel,
    ) -> Result<GeneratedChunk, WorldError> {
        let blocks = fill_terrain(coord, heights, &self.palette, Some(self.params.sea_level))?;
        let mut flora = Vec::new();
        if upto >= GenLevel::Flora {
            let (ox, oy, oz) = coord.origin();
            for z in 0..CHUNK_SIZE {
                for x in 0..CHUNK_SIZE {
                    let s = heights.get(x, z);
                    if s.height < oy || s.height >= oy + CHUNK_SIZE_I32 {
                        continue;
                    }
                    if s.biome.surface_block() != "grass" {
                        continue;
                    }
                    let (wx, wz) = (ox + x as i32, oz + z as i32);
                    if let Some(t) = roll_tree(self.seed as u32, wx, s.height, wz, s.flora_density) {
                        flora.push(t);
                    }
                }
            }
        }
        let level = if flora.is_empty() {
            GenLevel::Done
        } else {
            GenLevel::Terrain
        };
        Ok(GeneratedChunk {
            blocks,
            tertiary: Vec::new(),
            flora,
            level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(tree_probability: f32) -> NoiseGenerator {
        let reg = BlockRegistry::builtin();
        let params = NoiseParams {
            tree_probability,
            ..NoiseParams::default()
        };
        NoiseGenerator::new(&reg, 1337, params).unwrap()
    }

    #[test]
    fn heights_stay_in_configured_band() {
        let g = generator(0.0);
        let mut h = ColumnHeights::unloaded();
        g.generate_heightmap(ColumnCoord { cx: 3, cz: -2 }, &mut h);
        assert!(h.is_complete());
        let p = NoiseParams::default();
        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let s = h.get(x, z);
                assert!(s.height >= p.min_height && s.height <= p.max_height);
            }
        }
    }

    #[test]
    fn same_seed_same_chunk() {
        let g = generator(0.2);
        let coord = ChunkCoord::new(1, 2, 1);
        let mut h = ColumnHeights::unloaded();
        g.generate_heightmap(coord.column(), &mut h);
        let a = g.generate_chunk(coord, &h, GenLevel::Done).unwrap();
        let b = g.generate_chunk(coord, &h, GenLevel::Done).unwrap();
        assert_eq!(a.blocks, b.blocks);
        assert_eq!(a.flora, b.flora);
        let terrain_only = g.generate_chunk(coord, &h, GenLevel::Terrain).unwrap();
        assert!(terrain_only.flora.is_empty());
        assert_eq!(terrain_only.level, GenLevel::Done);
    }
}
