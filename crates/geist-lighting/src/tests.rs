use super::*;
use std::sync::Arc;

use geist_blocks::{AIR, BlockId, BlockRegistry};
use geist_chunk::{Chunk, ChunkGrid, ChunkHandle};
use geist_storage::{SizeClass, VoxelRecyclers};
use geist_world::{Biome, CHUNK_VOLUME, ChunkCoord, ColumnHeights, Face, HeightData, voxel_coords, voxel_index};

struct Bench {
    reg: BlockRegistry,
    engine: LightEngine,
    rec: VoxelRecyclers,
    grid: ChunkGrid,
}

impl Bench {
    fn new() -> Self {
        let reg = BlockRegistry::builtin();
        let engine = LightEngine::new(Arc::new(LightTable::from_registry(&reg)));
        Self {
            reg,
            engine,
            rec: VoxelRecyclers::new(SizeClass(CHUNK_VOLUME), 32),
            grid: ChunkGrid::new(),
        }
    }

    fn id(&self, name: &str) -> BlockId {
        self.reg.id_by_name(name).unwrap()
    }

    /// Insert, fill, and light a chunk, exchanging borders with lit neighbors.
    fn lit_chunk(&self, coord: ChunkCoord, sky: bool, fill: impl Fn(usize, usize, usize) -> BlockId) -> ChunkHandle {
        let chunk = self.grid.insert(coord, |gd| Arc::new(Chunk::new(coord, gd, &self.rec)));
        let blocks: Vec<BlockId> = (0..CHUNK_VOLUME)
            .map(|i| {
                let (x, y, z) = voxel_coords(i);
                fill(x, y, z)
            })
            .collect();
        chunk.lock_data().fill_blocks(&blocks);
        chunk.set_accessible(true);
        let heights = ColumnHeights::uniform(HeightData {
            height: if sky { -10_000 } else { 10_000 },
            biome: Biome::Plains,
            flora_density: 0.0,
        });
        // The first chunk of a column fixes its heightmap, as generation does.
        chunk.grid_data().heights_or_init(|| heights.clone());
        let out = self.engine.initial_light(&chunk, &heights);
        chunk.set_lit(true);
        let mut inbox = out.messages;
        inbox.extend(self.engine.exchange_borders(&self.grid, &chunk));
        self.engine.settle(&self.grid, [Arc::clone(&chunk)], inbox);
        chunk
    }

    fn field(&self, chunk: &ChunkHandle, c: LightComponent) -> Vec<u8> {
        let data = chunk.lock_data();
        (0..CHUNK_VOLUME).map(|i| data.light(i, c)).collect()
    }
}

fn manhattan(a: (usize, usize, usize), b: (usize, usize, usize)) -> i32 {
    (a.0 as i32 - b.0 as i32).abs() + (a.1 as i32 - b.1 as i32).abs() + (a.2 as i32 - b.2 as i32).abs()
}

#[test]
fn lamp_reaches_exactly_its_manhattan_range() {
    let b = Bench::new();
    let chunk = b.lit_chunk(ChunkCoord::new(0, 0, 0), false, |_, _, _| AIR);
    let at = (16, 16, 16);
    let lamp = b.id("lamp");
    b.engine
        .set_block(&b.grid, &chunk, voxel_index(at.0, at.1, at.2), lamp)
        .unwrap();
    let red = b.field(&chunk, LightComponent::Red);
    let blue = b.field(&chunk, LightComponent::Blue);
    for i in 0..CHUNK_VOLUME {
        let d = manhattan(voxel_coords(i), at);
        let expect = (15 - d).max(0) as u8;
        assert_eq!(red[i], expect, "voxel {:?}", voxel_coords(i));
        assert_eq!(blue[i], expect);
    }
    assert!(b.field(&chunk, LightComponent::Sun).iter().all(|&v| v == 0));
}

#[test]
fn removing_lamp_returns_to_dark() {
    let b = Bench::new();
    let chunk = b.lit_chunk(ChunkCoord::new(0, 0, 0), false, |_, _, _| AIR);
    let i = voxel_index(5, 20, 9);
    let (old, _) = b.engine.set_block(&b.grid, &chunk, i, b.id("lamp")).unwrap();
    assert_eq!(old, AIR);
    b.engine.set_block(&b.grid, &chunk, i, AIR).unwrap();
    for c in LightComponent::ALL {
        assert!(b.field(&chunk, c).iter().all(|&v| v == 0));
    }
    assert!(chunk.lock_data().queues().is_empty());
}

#[test]
fn removing_lamp_under_sky_restores_sky_only_field() {
    let b = Bench::new();
    let stone = b.id("stone");
    let chunk = b.lit_chunk(ChunkCoord::new(0, 0, 0), true, |_, y, _| if y < 10 { stone } else { AIR });
    let before = b.field(&chunk, LightComponent::Sun);
    assert_eq!(before[voxel_index(3, 10, 3)], MAX_LIGHT);
    assert_eq!(before[voxel_index(3, 9, 3)], 0);

    let i = voxel_index(12, 15, 12);
    b.engine.set_block(&b.grid, &chunk, i, b.id("lamp")).unwrap();
    let shaded = b.field(&chunk, LightComponent::Sun);
    assert_eq!(shaded[i], 0);
    assert_eq!(shaded[voxel_index(12, 14, 12)], MAX_LIGHT - 1);
    assert_eq!(shaded[voxel_index(12, 16, 12)], MAX_LIGHT);

    b.engine.set_block(&b.grid, &chunk, i, AIR).unwrap();
    assert_eq!(b.field(&chunk, LightComponent::Sun), before);
    assert!(b.field(&chunk, LightComponent::Green).iter().all(|&v| v == 0));
}

#[test]
fn water_attenuates_falling_sunlight() {
    let b = Bench::new();
    let (stone, water) = (b.id("stone"), b.id("water"));
    let chunk = b.lit_chunk(ChunkCoord::new(0, 0, 0), true, |_, y, _| match y {
        0..4 => stone,
        4..8 => water,
        _ => AIR,
    });
    let sun = b.field(&chunk, LightComponent::Sun);
    assert_eq!(sun[voxel_index(5, 8, 5)], MAX_LIGHT);
    assert_eq!(sun[voxel_index(5, 7, 5)], MAX_LIGHT - 2);
    assert_eq!(sun[voxel_index(5, 4, 5)], MAX_LIGHT - 8);
    assert_eq!(sun[voxel_index(5, 3, 5)], 0);
}

#[test]
fn lamp_light_crosses_into_lit_neighbor_and_back_out() {
    let b = Bench::new();
    let a = b.lit_chunk(ChunkCoord::new(0, 0, 0), false, |_, _, _| AIR);
    let east = b.lit_chunk(ChunkCoord::new(1, 0, 0), false, |_, _, _| AIR);
    let i = voxel_index(30, 16, 16);
    let (_, report) = b.engine.set_block(&b.grid, &a, i, b.id("torch_red")).unwrap();
    assert!(report.touched.contains(&east.coord()));
    let red = b.field(&east, LightComponent::Red);
    assert_eq!(red[voxel_index(0, 16, 16)], 12);
    assert_eq!(red[voxel_index(11, 16, 16)], 1);
    assert_eq!(red[voxel_index(12, 16, 16)], 0);
    assert_eq!(b.field(&east, LightComponent::Green)[voxel_index(0, 16, 16)], 1);

    b.engine.set_block(&b.grid, &a, i, AIR).unwrap();
    assert!(b.field(&east, LightComponent::Red).iter().all(|&v| v == 0));
    assert!(b.field(&a, LightComponent::Red).iter().all(|&v| v == 0));
}

#[test]
fn late_neighbor_pulls_light_through_border_exchange() {
    let b = Bench::new();
    let a = b.lit_chunk(ChunkCoord::new(0, 0, 0), false, |_, _, _| AIR);
    b.engine
        .set_block(&b.grid, &a, voxel_index(16, 16, 31), b.id("lamp"))
        .unwrap();
    let north = b.lit_chunk(ChunkCoord::new(0, 0, 1), false, |_, _, _| AIR);
    let red = b.field(&north, LightComponent::Red);
    assert_eq!(red[voxel_index(16, 16, 0)], 14);
    assert_eq!(red[voxel_index(16, 16, 13)], 1);
    assert_eq!(red[voxel_index(16, 16, 14)], 0);
}

#[test]
fn heightmap_sky_is_retracted_under_a_lit_roof() {
    let b = Bench::new();
    let stone = b.id("stone");
    let roof = b.lit_chunk(ChunkCoord::new(0, 1, 0), true, |_, y, _| if y == 0 { stone } else { AIR });
    assert_eq!(b.field(&roof, LightComponent::Sun)[voxel_index(0, 1, 0)], MAX_LIGHT);
    // Below a solid layer, but its own heightmap claims open sky.
    let below = b.lit_chunk(ChunkCoord::new(0, 0, 0), true, |_, _, _| AIR);
    assert!(b.field(&below, LightComponent::Sun).iter().all(|&v| v == 0));
}

#[test]
fn opening_a_roof_lets_full_sun_fall_through() {
    let b = Bench::new();
    let stone = b.id("stone");
    let roof = b.lit_chunk(ChunkCoord::new(0, 1, 0), true, |_, y, _| if y == 0 { stone } else { AIR });
    let below = b.lit_chunk(ChunkCoord::new(0, 0, 0), false, |_, _, _| AIR);
    let hole = voxel_index(8, 0, 8);
    b.engine.set_block(&b.grid, &roof, hole, AIR).unwrap();
    let sun = b.field(&below, LightComponent::Sun);
    assert_eq!(sun[voxel_index(8, 31, 8)], MAX_LIGHT);
    assert_eq!(sun[voxel_index(8, 0, 8)], MAX_LIGHT);
    assert_eq!(sun[voxel_index(9, 0, 8)], MAX_LIGHT - 1);
    // Closing it again puts everything back in the dark.
    b.engine.set_block(&b.grid, &roof, hole, stone).unwrap();
    assert!(b.field(&below, LightComponent::Sun).iter().all(|&v| v == 0));
}

#[test]
fn reopening_the_top_layer_lets_full_sun_back_in() {
    let b = Bench::new();
    let chunk = b.lit_chunk(ChunkCoord::new(0, 0, 0), true, |_, _, _| AIR);
    let before = b.field(&chunk, LightComponent::Sun);
    assert_eq!(before[voxel_index(8, 0, 8)], MAX_LIGHT);
    let top = voxel_index(8, 31, 8);

    b.engine.set_block(&b.grid, &chunk, top, b.id("stone")).unwrap();
    let shaded = b.field(&chunk, LightComponent::Sun);
    assert_eq!(shaded[voxel_index(8, 30, 8)], MAX_LIGHT - 1);
    assert_eq!(shaded[voxel_index(8, 0, 8)], MAX_LIGHT - 1);

    b.engine.set_block(&b.grid, &chunk, top, AIR).unwrap();
    assert_eq!(b.field(&chunk, LightComponent::Sun), before);
}

#[test]
fn reopening_the_top_layer_under_covered_heightmap_stays_dark() {
    let b = Bench::new();
    let stone = b.id("stone");
    let chunk = b.lit_chunk(ChunkCoord::new(0, 0, 0), false, |_, y, _| if y == 31 { stone } else { AIR });
    let top = voxel_index(8, 31, 8);
    b.engine.set_block(&b.grid, &chunk, top, AIR).unwrap();
    assert!(b.field(&chunk, LightComponent::Sun).iter().all(|&v| v == 0));
}

#[test]
fn messages_to_unlit_chunks_are_dropped() {
    let b = Bench::new();
    let a = b.lit_chunk(ChunkCoord::new(0, 0, 0), false, |_, _, _| AIR);
    let c = ChunkCoord::new(0, 0, 0).neighbor(Face::NegX);
    let pending = b.grid.insert(c, |gd| Arc::new(Chunk::new(c, gd, &b.rec)));
    let (_, report) = b
        .engine
        .set_block(&b.grid, &a, voxel_index(0, 3, 3), b.id("lamp"))
        .unwrap();
    assert!(report.dropped > 0);
    assert!(b.field(&pending, LightComponent::Red).iter().all(|&v| v == 0));
}

#[test]
fn table_treats_unknown_ids_as_opaque() {
    let reg = BlockRegistry::builtin();
    let t = LightTable::from_registry(&reg);
    assert!(!t.passable(9999, LightComponent::Sun));
    assert!(t.passable(AIR, LightComponent::Red));
    let leaves = reg.id_by_name("leaves").unwrap();
    assert!(t.passable(leaves, LightComponent::Sun));
    assert_eq!(transmit(&t, MAX_LIGHT, Face::NegY, LightComponent::Sun, leaves), MAX_LIGHT - 2);
    assert_eq!(transmit(&t, MAX_LIGHT, Face::NegY, LightComponent::Sun, AIR), MAX_LIGHT);
    assert_eq!(transmit(&t, MAX_LIGHT, Face::PosX, LightComponent::Sun, AIR), MAX_LIGHT - 1);
}
