use std::sync::Arc;

use geist_blocks::{AIR, BlockId, BlockRegistry};
use geist_chunk::{Chunk, ChunkGrid, ChunkHandle};
use geist_lighting::{LightComponent, LightEngine, LightTable, MAX_LIGHT, transmit};
use geist_storage::{SizeClass, VoxelRecyclers};
use geist_world::{Biome, CHUNK_VOLUME, ChunkCoord, ColumnHeights, Face, HeightData, voxel_coords, voxel_index};
use proptest::prelude::*;

fn lit_air_chunk(engine: &LightEngine, grid: &ChunkGrid, rec: &VoxelRecyclers, sky: bool, floor: BlockId) -> ChunkHandle {
    lit_air_chunk_at(engine, grid, rec, ChunkCoord::new(0, 0, 0), sky, floor)
}

fn lit_air_chunk_at(
    engine: &LightEngine,
    grid: &ChunkGrid,
    rec: &VoxelRecyclers,
    coord: ChunkCoord,
    sky: bool,
    floor: BlockId,
) -> ChunkHandle {
    let chunk = grid.insert(coord, |gd| Arc::new(Chunk::new(coord, gd, rec)));
    let blocks: Vec<BlockId> = (0..CHUNK_VOLUME)
        .map(|i| if voxel_coords(i).1 < 4 { floor } else { AIR })
        .collect();
    chunk.lock_data().fill_blocks(&blocks);
    chunk.set_accessible(true);
    let heights = ColumnHeights::uniform(HeightData {
        height: if sky { -1 } else { 10_000 },
        biome: Biome::Plains,
        flora_density: 0.0,
    });
    chunk.grid_data().heights_or_init(|| heights.clone());
    let out = engine.initial_light(&chunk, &heights);
    chunk.set_lit(true);
    let mut inbox = out.messages;
    inbox.extend(engine.exchange_borders(grid, &chunk));
    engine.settle(grid, [Arc::clone(&chunk)], inbox);
    chunk
}

struct Pair {
    engine: LightEngine,
    grid: ChunkGrid,
    _rec: VoxelRecyclers,
    west: ChunkHandle,
    east: ChunkHandle,
}

impl Pair {
    /// Two lit chunks sharing the x = 32 border.
    fn new(table: &Arc<LightTable>, sky: bool, floor: BlockId) -> Self {
        let engine = LightEngine::new(Arc::clone(table));
        let rec = VoxelRecyclers::new(SizeClass(CHUNK_VOLUME), 16);
        let grid = ChunkGrid::new();
        let west = lit_air_chunk_at(&engine, &grid, &rec, ChunkCoord::new(0, 0, 0), sky, floor);
        let east = lit_air_chunk_at(&engine, &grid, &rec, ChunkCoord::new(1, 0, 0), sky, floor);
        Self {
            engine,
            grid,
            _rec: rec,
            west,
            east,
        }
    }

    fn set(&self, (east, i): (bool, usize), id: BlockId) {
        let chunk = if east { &self.east } else { &self.west };
        self.engine.set_block(&self.grid, chunk, i, id).unwrap();
    }

    fn fields(&self) -> (Vec<[u8; 4]>, Vec<[u8; 4]>) {
        (fields(&self.west), fields(&self.east))
    }
}

fn fields(chunk: &ChunkHandle) -> Vec<[u8; 4]> {
    let data = chunk.lock_data();
    (0..CHUNK_VOLUME)
        .map(|i| LightComponent::ALL.map(|c| data.light(i, c)))
        .collect()
}

/// Every voxel equals the best of its own emission, its sky input, and what
/// its neighbors pass into it.
fn check_local_fixed_point(chunk: &ChunkHandle, table: &LightTable, sky: bool) -> Result<(), String> {
    let data = chunk.lock_data();
    for i in 0..CHUNK_VOLUME {
        let b = data.block(i);
        for c in LightComponent::ALL {
            let v = data.light(i, c);
            if v > MAX_LIGHT {
                return Err(format!("{:?} {:?} out of range: {v}", voxel_coords(i), c));
            }
            let mut best = table.emission(b, c);
            for face in Face::ALL {
                match face.step(i) {
                    Some(n) => {
                        best = best.max(transmit(table, data.light(n, c), face.opposite(), c, b));
                    }
                    None if sky && face == Face::PosY && c == LightComponent::Sun => {
                        best = best.max(transmit(table, MAX_LIGHT, Face::NegY, c, b));
                    }
                    None => {}
                }
            }
            if v != best {
                return Err(format!("{:?} {:?}: stored {v}, expected {best}", voxel_coords(i), c));
            }
        }
    }
    Ok(())
}

fn pos() -> impl Strategy<Value = (usize, usize, usize)> {
    (0usize..32, 4usize..32, 0usize..32)
}

/// A voxel within reach of the west/east border, on either side of it.
fn border_pos() -> impl Strategy<Value = (bool, usize)> {
    (any::<bool>(), 0usize..8, 4usize..32, 0usize..32).prop_map(|(east, d, y, z)| {
        let x = if east { d } else { 31 - d };
        (east, voxel_index(x, y, z))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn lamps_settle_to_local_fixed_point(
        sky in any::<bool>(),
        lamps in proptest::collection::vec((pos(), any::<bool>()), 1..5),
        removals in proptest::collection::vec(any::<bool>(), 5),
    ) {
        let reg = BlockRegistry::builtin();
        let table = Arc::new(LightTable::from_registry(&reg));
        let engine = LightEngine::new(Arc::clone(&table));
        let rec = VoxelRecyclers::new(SizeClass(CHUNK_VOLUME), 16);
        let grid = ChunkGrid::new();
        let stone = reg.id_by_name("stone").unwrap();
        let chunk = lit_air_chunk(&engine, &grid, &rec, sky, stone);
        let baseline = fields(&chunk);

        let mut placed = Vec::new();
        for ((x, y, z), red) in lamps {
            let id = reg.id_by_name(if red { "torch_red" } else { "lamp" }).unwrap();
            let i = voxel_index(x, y, z);
            engine.set_block(&grid, &chunk, i, id).unwrap();
            placed.push((i, id));
        }
        prop_assert_eq!(check_local_fixed_point(&chunk, &table, sky), Ok(()));

        let lit = fields(&chunk);
        let gone: Vec<_> = placed
            .iter()
            .zip(removals.iter().cycle())
            .filter(|(_, r)| **r)
            .map(|(p, _)| *p)
            .collect();
        for &(i, _) in &gone {
            engine.set_block(&grid, &chunk, i, AIR).unwrap();
        }
        prop_assert_eq!(check_local_fixed_point(&chunk, &table, sky), Ok(()));

        // Putting the same sources back restores the same field.
        for &(i, _) in &gone {
            let id = placed.iter().rev().find(|(j, _)| *j == i).map(|(_, id)| *id).unwrap();
            engine.set_block(&grid, &chunk, i, id).unwrap();
        }
        prop_assert!(fields(&chunk) == lit);

        for &(i, _) in &placed {
            engine.set_block(&grid, &chunk, i, AIR).unwrap();
        }
        prop_assert!(fields(&chunk) == baseline);
    }

    #[test]
    fn removals_across_a_border_match_a_world_built_from_survivors(
        sky in any::<bool>(),
        lamps in proptest::collection::vec((border_pos(), any::<bool>()), 2..6),
        keep in proptest::collection::vec(any::<bool>(), 6),
    ) {
        let reg = BlockRegistry::builtin();
        let table = Arc::new(LightTable::from_registry(&reg));
        let stone = reg.id_by_name("stone").unwrap();
        let lamp_id = |red: bool| reg.id_by_name(if red { "torch_red" } else { "lamp" }).unwrap();

        // One source per voxel; the last placement at a voxel wins.
        let mut sources: Vec<((bool, usize), BlockId)> = Vec::new();
        for (at, red) in lamps {
            sources.retain(|(p, _)| *p != at);
            sources.push((at, lamp_id(red)));
        }
        let survivors: Vec<_> = sources
            .iter()
            .zip(keep.iter().cycle())
            .filter(|(_, k)| **k)
            .map(|(s, _)| *s)
            .collect();

        let edited = Pair::new(&table, sky, stone);
        for &(at, id) in &sources {
            edited.set(at, id);
        }
        for &(at, _) in &sources {
            if !survivors.iter().any(|(p, _)| *p == at) {
                edited.set(at, AIR);
            }
        }

        let fresh = Pair::new(&table, sky, stone);
        for &(at, id) in &survivors {
            fresh.set(at, id);
        }
        prop_assert!(edited.fields() == fresh.fields());
        prop_assert!(edited.west.lock_data().queues().is_empty());
        prop_assert!(edited.east.lock_data().queues().is_empty());
    }
}
