use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use geist_blocks::BlockId;
use geist_world::{ChunkCoord, ColumnCoord, Face, WorldError};
use hashbrown::HashMap;

use crate::chunk::{ChunkGridData, ChunkHandle};

/// Stable index of a slot. A stale id (slot reused since) never resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotId {
    index: u32,
    generation: u32,
}

struct ChunkSlot {
    coord: ChunkCoord,
    chunk: ChunkHandle,
    neighbors: [Option<SlotId>; 6],
    num_neighbors: u8,
    distance2: i64,
}

enum Entry {
    Occupied { generation: u32, slot: ChunkSlot },
    Vacant { generation: u32 },
}

#[derive(Default)]
struct GridInner {
    entries: Vec<Entry>,
    free: Vec<u32>,
    by_coord: HashMap<ChunkCoord, SlotId>,
    columns: HashMap<ColumnCoord, Arc<ChunkGridData>>,
}

impl GridInner {
    fn slot(&self, id: SlotId) -> Option<&ChunkSlot> {
        match self.entries.get(id.index as usize)? {
            Entry::Occupied { generation, slot } if *generation == id.generation => Some(slot),
            _ => None,
        }
    }

    fn slot_mut(&mut self, id: SlotId) -> Option<&mut ChunkSlot> {
        match self.entries.get_mut(id.index as usize)? {
            Entry::Occupied { generation, slot } if *generation == id.generation => Some(slot),
            _ => None,
        }
    }

    fn alloc(&mut self, slot: ChunkSlot) -> SlotId {
        if let Some(index) = self.free.pop() {
            let generation = match self.entries[index as usize] {
                Entry::Vacant { generation } => generation,
                Entry::Occupied { generation, .. } => generation.wrapping_add(1),
            };
            self.entries[index as usize] = Entry::Occupied { generation, slot };
            SlotId { index, generation }
        } else {
            let index = self.entries.len() as u32;
            self.entries.push(Entry::Occupied { generation: 0, slot });
            SlotId {
                index,
                generation: 0,
            }
        }
    }

    fn vacate(&mut self, id: SlotId) -> Option<ChunkSlot> {
        let entry = self.entries.get_mut(id.index as usize)?;
        match entry {
            Entry::Occupied { generation, .. } if *generation == id.generation => {
                let next = Entry::Vacant {
                    generation: generation.wrapping_add(1),
                };
                match std::mem::replace(entry, next) {
                    Entry::Occupied { slot, .. } => {
                        self.free.push(id.index);
                        Some(slot)
                    }
                    Entry::Vacant { .. } => None,
                }
            }
            _ => None,
        }
    }

    fn occupied(&self) -> impl Iterator<Item = (SlotId, &ChunkSlot)> {
        self.entries.iter().enumerate().filter_map(|(i, e)| match e {
            Entry::Occupied { generation, slot } => Some((
                SlotId {
                    index: i as u32,
                    generation: *generation,
                },
                slot,
            )),
            Entry::Vacant { .. } => None,
        })
    }
}

/// Sparse 3D grid of live chunks with symmetric face-neighbor links.
///
/// All link patching happens under one structural lock. Chunk data locks are
/// never taken while it is held: handles are cloned out and the guard dropped first.
#[derive(Default)]
pub struct ChunkGrid {
    inner: RwLock<GridInner>,
}

impl ChunkGrid {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, GridInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GridInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a chunk at `coord`, built by `make` with the column's shared data,
    /// and link it both ways to any present neighbors. Returns the existing
    /// chunk if the position is already occupied.
    pub fn insert(
        &self,
        coord: ChunkCoord,
        make: impl FnOnce(Arc<ChunkGridData>) -> ChunkHandle,
    ) -> ChunkHandle {
        let mut g = self.write();
        if let Some(id) = g.by_coord.get(&coord).copied() {
            if let Some(slot) = g.slot(id) {
                return Arc::clone(&slot.chunk);
            }
        }
        let column = Arc::clone(
            g.columns
                .entry(coord.column())
                .or_insert_with(|| Arc::new(ChunkGridData::new(coord.column()))),
        );
        column.retain();
        let chunk = make(column);
        let id = g.alloc(ChunkSlot {
            coord,
            chunk: Arc::clone(&chunk),
            neighbors: [None; 6],
            num_neighbors: 0,
            distance2: i64::MAX,
        });
        g.by_coord.insert(coord, id);
        let mut links = [None; 6];
        for face in Face::ALL {
            let Some(nid) = g.by_coord.get(&coord.neighbor(face)).copied() else {
                continue;
            };
            if let Some(ns) = g.slot_mut(nid) {
                ns.neighbors[face.opposite().index()] = Some(id);
                ns.num_neighbors += 1;
                ns.chunk.set_num_neighbors(ns.num_neighbors);
                links[face.index()] = Some(nid);
            }
        }
        if let Some(slot) = g.slot_mut(id) {
            slot.neighbors = links;
            slot.num_neighbors = links.iter().flatten().count() as u8;
            slot.chunk.set_num_neighbors(slot.num_neighbors);
        }
        log::trace!(target: "grid", "insert {} slot={:?}", coord, id);
        chunk
    }

    /// Unlink `coord` from its neighbors, then drop its slot. The handle is
    /// returned to the caller, who decides when storage may be released.
    pub fn remove(&self, coord: ChunkCoord) -> Option<ChunkHandle> {
        let mut g = self.write();
        let id = g.by_coord.remove(&coord)?;
        let links = g.slot(id)?.neighbors;
        for face in Face::ALL {
            if let Some(nid) = links[face.index()] {
                if let Some(ns) = g.slot_mut(nid) {
                    ns.neighbors[face.opposite().index()] = None;
                    ns.num_neighbors = ns.num_neighbors.saturating_sub(1);
                    ns.chunk.set_num_neighbors(ns.num_neighbors);
                }
            }
        }
        let slot = g.vacate(id)?;
        let column = coord.column();
        let left = g
            .columns
            .get(&column)
            .map(|c| c.release())
            .unwrap_or(0);
        if left == 0 {
            g.columns.remove(&column);
        }
        slot.chunk.set_num_neighbors(0);
        log::trace!(target: "grid", "remove {} column_refs={}", coord, left);
        Some(slot.chunk)
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<ChunkHandle> {
        let g = self.read();
        let id = *g.by_coord.get(&coord)?;
        g.slot(id).map(|s| Arc::clone(&s.chunk))
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.read().by_coord.contains_key(&coord)
    }

    pub fn neighbor(&self, coord: ChunkCoord, face: Face) -> Option<ChunkHandle> {
        let g = self.read();
        let id = *g.by_coord.get(&coord)?;
        let nid = g.slot(id)?.neighbors[face.index()]?;
        g.slot(nid).map(|s| Arc::clone(&s.chunk))
    }

    /// All six neighbors of a present chunk (all `None` if it is absent).
    /// A link that no longer resolves is reported instead of followed.
    pub fn neighbors(&self, coord: ChunkCoord) -> Result<[Option<ChunkHandle>; 6], WorldError> {
        let g = self.read();
        let mut out: [Option<ChunkHandle>; 6] = Default::default();
        let Some(slot) = g.by_coord.get(&coord).and_then(|id| g.slot(*id)) else {
            return Ok(out);
        };
        for face in Face::ALL {
            if let Some(nid) = slot.neighbors[face.index()] {
                let ns = g
                    .slot(nid)
                    .ok_or(WorldError::InconsistentNeighborState { coord, face })?;
                out[face.index()] = Some(Arc::clone(&ns.chunk));
            }
        }
        Ok(out)
    }

    pub fn num_neighbors(&self, coord: ChunkCoord) -> Option<u8> {
        let g = self.read();
        let id = *g.by_coord.get(&coord)?;
        g.slot(id).map(|s| s.num_neighbors)
    }

    /// Refresh the cached squared camera distance of every slot and its chunk.
    pub fn update_distances(&self, camera: ChunkCoord) {
        let mut g = self.write();
        for e in g.entries.iter_mut() {
            if let Entry::Occupied { slot, .. } = e {
                slot.distance2 = slot.coord.distance_sq(camera);
                slot.chunk.set_distance2(slot.distance2);
            }
        }
    }

    pub fn distance2(&self, coord: ChunkCoord) -> Option<i64> {
        let g = self.read();
        let id = *g.by_coord.get(&coord)?;
        g.slot(id).map(|s| s.distance2)
    }

    /// Check that every link is mutual, points at the right position, and
    /// that no present neighbor is left unlinked.
    pub fn check_symmetry(&self) -> Result<(), WorldError> {
        let g = self.read();
        for (id, slot) in g.occupied() {
            let coord = slot.coord;
            if g.by_coord.get(&coord) != Some(&id) {
                return Err(WorldError::InconsistentNeighborState {
                    coord,
                    face: Face::PosX,
                });
            }
            for face in Face::ALL {
                let bad = WorldError::InconsistentNeighborState { coord, face };
                let expect = g.by_coord.get(&coord.neighbor(face)).copied();
                match slot.neighbors[face.index()] {
                    Some(nid) => {
                        let ns = g.slot(nid).ok_or(bad)?;
                        if Some(nid) != expect || ns.neighbors[face.opposite().index()] != Some(id) {
                            return Err(WorldError::InconsistentNeighborState { coord, face });
                        }
                    }
                    None if expect.is_some() => return Err(bad),
                    None => {}
                }
            }
            let linked = slot.neighbors.iter().flatten().count() as u8;
            if linked != slot.num_neighbors {
                return Err(WorldError::InconsistentNeighborState {
                    coord,
                    face: Face::PosX,
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().by_coord.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn coords(&self) -> Vec<ChunkCoord> {
        self.read().by_coord.keys().copied().collect()
    }

    pub fn handles(&self) -> Vec<ChunkHandle> {
        self.read().occupied().map(|(_, s)| Arc::clone(&s.chunk)).collect()
    }

    pub fn column_data(&self, column: ColumnCoord) -> Option<Arc<ChunkGridData>> {
        self.read().columns.get(&column).cloned()
    }

    pub fn column_count(&self) -> usize {
        self.read().columns.len()
    }

    /// Block one step across `face` from `index` in chunk `coord`, reading the
    /// neighbor chunk when the step leaves it. `None` if that chunk is absent.
    pub fn block_across(&self, coord: ChunkCoord, face: Face, index: usize) -> Option<BlockId> {
        match face.step(index) {
            Some(i) => {
                let c = self.get(coord)?;
                let b = c.lock_data().block(i);
                Some(b)
            }
            None => {
                let n = self.neighbor(coord, face)?;
                let b = n.lock_data().block(face.wrap(index));
                Some(b)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use geist_storage::{SizeClass, VoxelRecyclers};
    use geist_world::{CHUNK_VOLUME, voxel_index};

    fn add(grid: &ChunkGrid, rec: &VoxelRecyclers, c: ChunkCoord) -> ChunkHandle {
        grid.insert(c, |gd| Arc::new(Chunk::new(c, gd, rec)))
    }

    #[test]
    fn insert_links_both_sides_and_remove_unlinks() {
        let rec = VoxelRecyclers::new(SizeClass(CHUNK_VOLUME), 4);
        let grid = ChunkGrid::new();
        let a = ChunkCoord::new(0, 0, 0);
        let b = a.neighbor(Face::PosX);
        add(&grid, &rec, a);
        add(&grid, &rec, b);
        assert_eq!(grid.neighbor(a, Face::PosX).unwrap().coord(), b);
        assert_eq!(grid.neighbor(b, Face::NegX).unwrap().coord(), a);
        assert_eq!(grid.num_neighbors(a), Some(1));
        grid.check_symmetry().unwrap();
        let gone = grid.remove(b).unwrap();
        assert_eq!(gone.coord(), b);
        assert!(grid.neighbor(a, Face::PosX).is_none());
        assert_eq!(grid.get(a).unwrap().num_neighbors(), 0);
        grid.check_symmetry().unwrap();
    }

    #[test]
    fn column_data_is_shared_and_refcounted() {
        let rec = VoxelRecyclers::new(SizeClass(CHUNK_VOLUME), 4);
        let grid = ChunkGrid::new();
        let lo = add(&grid, &rec, ChunkCoord::new(2, 0, 3));
        let hi = add(&grid, &rec, ChunkCoord::new(2, 1, 3));
        assert!(Arc::ptr_eq(lo.grid_data(), hi.grid_data()));
        assert_eq!(lo.grid_data().ref_count(), 2);
        grid.remove(ChunkCoord::new(2, 0, 3));
        assert_eq!(hi.grid_data().ref_count(), 1);
        assert_eq!(grid.column_count(), 1);
        grid.remove(ChunkCoord::new(2, 1, 3));
        assert_eq!(grid.column_count(), 0);
    }

    #[test]
    fn reinserting_existing_coord_returns_same_chunk() {
        let rec = VoxelRecyclers::new(SizeClass(CHUNK_VOLUME), 4);
        let grid = ChunkGrid::new();
        let c = ChunkCoord::new(0, 0, 0);
        let first = add(&grid, &rec, c);
        let second = add(&grid, &rec, c);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.grid_data().ref_count(), 1);
    }

    #[test]
    fn block_across_reads_neighbor_chunk() {
        let rec = VoxelRecyclers::new(SizeClass(CHUNK_VOLUME), 4);
        let grid = ChunkGrid::new();
        let a = ChunkCoord::new(0, 0, 0);
        add(&grid, &rec, a);
        let up = add(&grid, &rec, a.neighbor(Face::PosY));
        up.lock_data().set_block(voxel_index(4, 0, 4), 7);
        assert_eq!(grid.block_across(a, Face::PosY, voxel_index(4, 31, 4)), Some(7));
        assert_eq!(grid.block_across(a, Face::NegY, voxel_index(4, 0, 4)), None);
    }

    #[test]
    fn distances_follow_camera() {
        let rec = VoxelRecyclers::new(SizeClass(CHUNK_VOLUME), 4);
        let grid = ChunkGrid::new();
        let c = add(&grid, &rec, ChunkCoord::new(3, 0, 4));
        grid.update_distances(ChunkCoord::new(0, 0, 0));
        assert_eq!(c.distance2(), 25);
        assert_eq!(grid.distance2(c.coord()), Some(25));
    }
}
