use std::collections::VecDeque;
use std::sync::Arc;

use geist_blocks::BlockId;
use geist_chunk::{ChunkGrid, ChunkHandle, LightComponent, MAX_LIGHT};
use geist_world::{ChunkCoord, ColumnHeights, Face, voxel_coords};
use hashbrown::HashSet;

use crate::message::LightMessage;
use crate::propagate::{self, Propagation, transmit};
use crate::table::LightTable;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SettleReport {
    /// Chunks whose light values changed.
    pub touched: Vec<ChunkCoord>,
    pub delivered: usize,
    /// Messages addressed to chunks that are absent or not lit yet.
    pub dropped: usize,
}

/// Drives propagation across chunks. Per-chunk work runs under that chunk's
/// data lock only; no two chunk locks are ever held together.
pub struct LightEngine {
    table: Arc<LightTable>,
}

impl LightEngine {
    pub fn new(table: Arc<LightTable>) -> Self {
        Self { table }
    }

    #[inline]
    pub fn table(&self) -> &LightTable {
        &self.table
    }

    /// Recompute a chunk's light from scratch, without reading any neighbor.
    pub fn initial_light(&self, chunk: &ChunkHandle, heights: &ColumnHeights) -> Propagation {
        let mut data = chunk.lock_data();
        data.clear_light();
        propagate::initial_light(&mut *data, &self.table, chunk.coord(), heights)
    }

    /// Run queued light work to a global fixed point, starting from `chunks`
    /// and the messages in `inbox`.
    pub fn settle(
        &self,
        grid: &ChunkGrid,
        chunks: impl IntoIterator<Item = ChunkHandle>,
        inbox: Vec<LightMessage>,
    ) -> SettleReport {
        let mut report = SettleReport::default();
        let mut work: VecDeque<ChunkHandle> = VecDeque::new();
        let mut queued: HashSet<ChunkCoord> = HashSet::new();
        let mut touched: HashSet<ChunkCoord> = HashSet::new();
        for c in chunks {
            if queued.insert(c.coord()) {
                work.push_back(c);
            }
        }
        for msg in inbox {
            self.deliver(grid, &msg, &mut work, &mut queued, &mut touched, &mut report);
        }
        while let Some(chunk) = work.pop_front() {
            queued.remove(&chunk.coord());
            if !chunk.is_lit() || chunk.is_released() {
                continue;
            }
            let out = {
                let mut data = chunk.lock_data();
                propagate::propagate(&mut *data, &self.table, chunk.coord())
            };
            if out.writes > 0 {
                touched.insert(chunk.coord());
            }
            for msg in out.messages {
                self.deliver(grid, &msg, &mut work, &mut queued, &mut touched, &mut report);
            }
        }
        report.touched = touched.into_iter().collect();
        log::trace!(
            target: "light",
            "settled touched={} delivered={} dropped={}",
            report.touched.len(),
            report.delivered,
            report.dropped
        );
        report
    }

    fn deliver(
        &self,
        grid: &ChunkGrid,
        msg: &LightMessage,
        work: &mut VecDeque<ChunkHandle>,
        queued: &mut HashSet<ChunkCoord>,
        touched: &mut HashSet<ChunkCoord>,
        report: &mut SettleReport,
    ) {
        let Some(target) = grid.get(msg.target) else {
            report.dropped += 1;
            return;
        };
        if !target.is_lit() || target.is_released() {
            report.dropped += 1;
            return;
        }
        let changed = {
            let mut data = target.lock_data();
            propagate::apply_message(&mut *data, &self.table, msg)
        };
        report.delivered += 1;
        if changed {
            touched.insert(msg.target);
        }
        if queued.insert(msg.target) {
            work.push_back(target);
        }
    }

    /// Messages that reconcile a newly lit chunk with every lit neighbor, in
    /// both directions. Full sunlight assumed from the heightmap is retracted
    /// where the chunk above does not actually supply it.
    pub fn exchange_borders(&self, grid: &ChunkGrid, chunk: &ChunkHandle) -> Vec<LightMessage> {
        let mut out = Vec::new();
        let coord = chunk.coord();
        let neighbors = match grid.neighbors(coord) {
            Ok(n) => n,
            Err(e) => {
                log::warn!(target: "light", "border exchange deferred: {e}");
                return out;
            }
        };
        for face in Face::ALL {
            let Some(n) = &neighbors[face.index()] else {
                continue;
            };
            if !n.is_lit() || n.is_released() {
                continue;
            }
            let mine = read_plane(chunk, face);
            let theirs = read_plane(n, face.opposite());
            self.border_messages(&theirs, &mine, face.opposite(), coord, &mut out);
            self.border_messages(&mine, &theirs, face, n.coord(), &mut out);
        }
        out
    }

    fn border_messages(
        &self,
        src: &[PlaneVoxel],
        dst: &[PlaneVoxel],
        travel: Face,
        target: ChunkCoord,
        out: &mut Vec<LightMessage>,
    ) {
        for (s, d) in src.iter().zip(dst) {
            if travel == Face::NegY && d.light[0] == MAX_LIGHT {
                let inbound = transmit(&self.table, s.light[0], travel, LightComponent::Sun, d.block);
                if inbound < MAX_LIGHT {
                    out.push(LightMessage {
                        target,
                        component: LightComponent::Sun,
                        index: d.index as u32,
                        level: MAX_LIGHT,
                        travel,
                        removal: true,
                    });
                }
            }
            for c in LightComponent::ALL {
                let level = s.light[c.index()];
                if level > 1 {
                    out.push(LightMessage {
                        target,
                        component: c,
                        index: d.index as u32,
                        level,
                        travel,
                        removal: false,
                    });
                }
            }
        }
    }

    /// Replace one block and settle the resulting light. Returns the previous
    /// block, or `None` if the chunk's data is not accessible yet.
    pub fn set_block(
        &self,
        grid: &ChunkGrid,
        chunk: &ChunkHandle,
        index: usize,
        id: BlockId,
    ) -> Option<(BlockId, SettleReport)> {
        if !chunk.is_accessible() || chunk.is_released() {
            return None;
        }
        let lit = chunk.is_lit();
        let old = {
            let mut data = chunk.lock_data();
            let old = data.block(index);
            if old == id {
                return Some((old, SettleReport::default()));
            }
            data.set_block(index, id);
            if lit {
                propagate::on_block_changed(&mut *data, &self.table, index, old, id);
            }
            old
        };
        chunk.mark_dirty();
        if !lit {
            return Some((old, SettleReport::default()));
        }
        let mut inbox = Vec::new();
        let coord = chunk.coord();
        for face in Face::ALL {
            if face.step(index).is_some() {
                continue;
            }
            let Some(n) = grid.neighbor(coord, face).filter(|n| n.is_lit()) else {
                if face == Face::PosY && open_sky(chunk, index) {
                    inbox.push(LightMessage {
                        target: coord,
                        component: LightComponent::Sun,
                        index: index as u32,
                        level: MAX_LIGHT,
                        travel: Face::NegY,
                        removal: false,
                    });
                }
                continue;
            };
            let levels = {
                let data = n.lock_data();
                let j = face.wrap(index);
                LightComponent::ALL.map(|c| data.light(j, c))
            };
            for c in LightComponent::ALL {
                let level = levels[c.index()];
                if level > 1 {
                    inbox.push(LightMessage {
                        target: coord,
                        component: c,
                        index: index as u32,
                        level,
                        travel: face.opposite(),
                        removal: false,
                    });
                }
            }
        }
        let mut report = self.settle(grid, [Arc::clone(chunk)], inbox);
        if !report.touched.contains(&coord) {
            report.touched.push(coord);
        }
        Some((old, report))
    }
}

/// Top-plane voxel `index` with no lit chunk above: the column heightmap
/// decides, as it did when the chunk was first lit. Without samples the
/// column is treated as covered.
fn open_sky(chunk: &ChunkHandle, index: usize) -> bool {
    let (x, _, z) = voxel_coords(index);
    chunk
        .grid_data()
        .heights()
        .is_some_and(|h| propagate::sky_exposed(h, chunk.coord(), x, z))
}

struct PlaneVoxel {
    index: usize,
    block: BlockId,
    light: [u8; 4],
}

fn read_plane(chunk: &ChunkHandle, face: Face) -> Vec<PlaneVoxel> {
    let data = chunk.lock_data();
    face.plane()
        .map(|i| PlaneVoxel {
            index: i,
            block: data.block(i),
            light: LightComponent::ALL.map(|c| data.light(i, c)),
        })
        .collect()
}
