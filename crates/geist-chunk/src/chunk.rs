use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use geist_storage::VoxelRecyclers;
use geist_world::{ChunkCoord, ColumnCoord, ColumnHeights, FloraPlacement, GenLevel};

use crate::data::{ChunkData, ChunkSnapshot};
use crate::state::ChunkState;

/// Height/biome samples shared by every chunk stacked in one column.
pub struct ChunkGridData {
    column: ColumnCoord,
    heights: OnceLock<ColumnHeights>,
    ref_count: AtomicUsize,
}

impl ChunkGridData {
    pub fn new(column: ColumnCoord) -> Self {
        Self {
            column,
            heights: OnceLock::new(),
            ref_count: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn column(&self) -> ColumnCoord {
        self.column
    }

    /// `None` until the first generation task of the column samples it.
    #[inline]
    pub fn heights(&self) -> Option<&ColumnHeights> {
        self.heights.get()
    }

    /// Runs `init` at most once per column; later callers wait for and reuse the result.
    pub fn heights_or_init(&self, init: impl FnOnce() -> ColumnHeights) -> &ColumnHeights {
        self.heights.get_or_init(init)
    }

    #[inline]
    pub fn ref_count(&self) -> usize {
        self.ref_count.load(Ordering::Acquire)
    }

    pub(crate) fn retain(&self) -> usize {
        self.ref_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn release(&self) -> usize {
        self.ref_count.fetch_sub(1, Ordering::AcqRel) - 1
    }
}

/// Work that can be in flight on a worker thread for one chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TaskKind {
    Load = 1,
    Generate = 2,
    Light = 3,
    Mesh = 4,
    WaterMesh = 5,
    Save = 6,
}

/// In-flight tag of a chunk whose storage was released. No task can claim
/// the slot afterwards.
const RELEASED: u8 = u8::MAX;

impl TaskKind {
    fn from_tag(tag: u8) -> Option<TaskKind> {
        match tag {
            1 => Some(TaskKind::Load),
            2 => Some(TaskKind::Generate),
            3 => Some(TaskKind::Light),
            4 => Some(TaskKind::Mesh),
            5 => Some(TaskKind::WaterMesh),
            6 => Some(TaskKind::Save),
            _ => None,
        }
    }
}

pub type ChunkHandle = Arc<Chunk>;

pub struct Chunk {
    coord: ChunkCoord,
    grid_data: Arc<ChunkGridData>,
    state: AtomicU8,
    data: Mutex<ChunkData>,
    in_flight: AtomicU8,
    abandoned: AtomicBool,
    accessible: AtomicBool,
    dirty: AtomicBool,
    lit: AtomicBool,
    has_liquid: AtomicBool,
    mesh_ready: AtomicBool,
    water_mesh_ready: AtomicBool,
    gen_level: AtomicU8,
    num_neighbors: AtomicU8,
    distance2: AtomicI64,
    flora: Mutex<Vec<FloraPlacement>>,
}

impl Chunk {
    pub fn new(coord: ChunkCoord, grid_data: Arc<ChunkGridData>, recyclers: &VoxelRecyclers) -> Self {
        Self {
            coord,
            grid_data,
            state: AtomicU8::new(ChunkState::Load.as_u8()),
            data: Mutex::new(ChunkData::new(recyclers)),
            in_flight: AtomicU8::new(0),
            abandoned: AtomicBool::new(false),
            accessible: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            lit: AtomicBool::new(false),
            has_liquid: AtomicBool::new(false),
            mesh_ready: AtomicBool::new(false),
            water_mesh_ready: AtomicBool::new(false),
            gen_level: AtomicU8::new(GenLevel::Terrain.as_u8()),
            num_neighbors: AtomicU8::new(0),
            distance2: AtomicI64::new(i64::MAX),
            flora: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    #[inline]
    pub fn grid_data(&self) -> &Arc<ChunkGridData> {
        &self.grid_data
    }

    #[inline]
    pub fn state(&self) -> ChunkState {
        ChunkState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, next: ChunkState) {
        let prev = ChunkState::from_u8(self.state.swap(next.as_u8(), Ordering::AcqRel));
        if prev != next {
            log::debug!(target: "scheduler", "chunk {} {:?} -> {:?}", self.coord, prev, next);
        }
    }

    /// Lock the voxel channels. Hold only for one read or write batch.
    pub fn lock_data(&self) -> MutexGuard<'_, ChunkData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ChunkSnapshot {
        self.lock_data().snapshot(self.coord)
    }

    /// Claim the in-flight slot for a worker task. Fails if another task holds it,
    /// or if the chunk is abandoned and the task is not its final save.
    pub fn begin_task(self: &Arc<Self>, kind: TaskKind) -> Option<TaskTicket> {
        if self.is_abandoned() && kind != TaskKind::Save {
            return None;
        }
        self.in_flight
            .compare_exchange(0, kind as u8, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(TaskTicket {
            chunk: Arc::clone(self),
            kind,
        })
    }

    /// Surrender a ticket from the completion path. Returns whether the chunk
    /// was abandoned while the task ran, in which case the result must be discarded.
    pub fn end_task(&self, ticket: TaskTicket) -> bool {
        debug_assert!(std::ptr::eq(Arc::as_ptr(&ticket.chunk), self));
        drop(ticket);
        self.is_abandoned()
    }

    #[inline]
    pub fn in_flight(&self) -> Option<TaskKind> {
        TaskKind::from_tag(self.in_flight.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::Acquire)
    }

    pub fn mark_abandoned(&self) {
        self.abandoned.store(true, Ordering::Release);
    }

    /// Return every dense buffer to the pools. Refused while a task is in
    /// flight or after an earlier release. Claims the in-flight slot for good,
    /// so a racing `begin_task` either wins first or fails.
    pub fn release_storage(&self) -> bool {
        if self
            .in_flight
            .compare_exchange(0, RELEASED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let n = self.lock_data().release();
        self.accessible.store(false, Ordering::Release);
        self.lit.store(false, Ordering::Release);
        self.set_state(ChunkState::Inactive);
        log::trace!(target: "grid", "chunk {} released {} buffers", self.coord, n);
        true
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) == RELEASED
    }

    #[inline]
    pub fn is_accessible(&self) -> bool {
        self.accessible.load(Ordering::Acquire)
    }

    pub fn set_accessible(&self, v: bool) {
        self.accessible.store(v, Ordering::Release);
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    /// Initial lighting has completed and the chunk takes part in cross-chunk propagation.
    #[inline]
    pub fn is_lit(&self) -> bool {
        self.lit.load(Ordering::Acquire)
    }

    pub fn set_lit(&self, v: bool) {
        self.lit.store(v, Ordering::Release);
    }

    #[inline]
    pub fn has_liquid(&self) -> bool {
        self.has_liquid.load(Ordering::Acquire)
    }

    pub fn set_has_liquid(&self, v: bool) {
        self.has_liquid.store(v, Ordering::Release);
    }

    #[inline]
    pub fn mesh_ready(&self) -> bool {
        self.mesh_ready.load(Ordering::Acquire)
    }

    #[inline]
    pub fn water_mesh_ready(&self) -> bool {
        self.water_mesh_ready.load(Ordering::Acquire)
    }

    pub fn set_mesh_ready(&self, water: bool, v: bool) {
        if water {
            self.water_mesh_ready.store(v, Ordering::Release);
        } else {
            self.mesh_ready.store(v, Ordering::Release);
        }
    }

    #[inline]
    pub fn gen_level(&self) -> GenLevel {
        GenLevel::from_u8(self.gen_level.load(Ordering::Acquire))
    }

    pub fn set_gen_level(&self, level: GenLevel) {
        self.gen_level.store(level.as_u8(), Ordering::Release);
    }

    #[inline]
    pub fn num_neighbors(&self) -> u8 {
        self.num_neighbors.load(Ordering::Acquire)
    }

    pub(crate) fn set_num_neighbors(&self, n: u8) {
        self.num_neighbors.store(n, Ordering::Release);
    }

    #[inline]
    pub fn distance2(&self) -> i64 {
        self.distance2.load(Ordering::Relaxed)
    }

    pub(crate) fn set_distance2(&self, d: i64) {
        self.distance2.store(d, Ordering::Relaxed);
    }

    pub fn set_flora(&self, flora: Vec<FloraPlacement>) {
        *self.flora.lock().unwrap_or_else(PoisonError::into_inner) = flora;
    }

    pub fn pending_flora(&self) -> Vec<FloraPlacement> {
        self.flora.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn take_flora(&self) -> Vec<FloraPlacement> {
        std::mem::take(&mut *self.flora.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn has_pending_flora(&self) -> bool {
        !self
            .flora
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("coord", &self.coord)
            .field("state", &self.state())
            .field("in_flight", &self.in_flight())
            .field("abandoned", &self.is_abandoned())
            .finish()
    }
}

/// Proof that a worker task owns the chunk's in-flight slot. Holds a strong
/// handle, so the chunk outlives the task; dropping it clears the slot.
pub struct TaskTicket {
    chunk: ChunkHandle,
    kind: TaskKind,
}

impl TaskTicket {
    #[inline]
    pub fn chunk(&self) -> &ChunkHandle {
        &self.chunk
    }

    #[inline]
    pub fn kind(&self) -> TaskKind {
        self.kind
    }
}

impl Drop for TaskTicket {
    fn drop(&mut self) {
        self.chunk.in_flight.store(0, Ordering::Release);
    }
}

impl std::fmt::Debug for TaskTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TaskTicket({:?} {})", self.kind, self.chunk.coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geist_storage::SizeClass;
    use geist_world::CHUNK_VOLUME;

    fn chunk() -> ChunkHandle {
        let rec = VoxelRecyclers::new(SizeClass(CHUNK_VOLUME), 4);
        let gd = Arc::new(ChunkGridData::new(ColumnCoord { cx: 0, cz: 0 }));
        Arc::new(Chunk::new(ChunkCoord::new(0, 0, 0), gd, &rec))
    }

    #[test]
    fn one_task_at_a_time() {
        let c = chunk();
        let t = c.begin_task(TaskKind::Light).unwrap();
        assert!(c.begin_task(TaskKind::Mesh).is_none());
        assert_eq!(c.in_flight(), Some(TaskKind::Light));
        assert!(!c.release_storage());
        assert!(!c.end_task(t));
        assert_eq!(c.in_flight(), None);
        assert!(c.release_storage());
        assert_eq!(c.state(), ChunkState::Inactive);
    }

    #[test]
    fn released_chunk_refuses_every_task() {
        let c = chunk();
        c.mark_abandoned();
        assert!(c.release_storage());
        assert!(c.is_released());
        assert_eq!(c.in_flight(), None);
        assert!(c.begin_task(TaskKind::Save).is_none());
        assert!(c.begin_task(TaskKind::Light).is_none());
        assert!(!c.release_storage());
    }

    #[test]
    fn release_and_claim_race_has_one_winner() {
        for _ in 0..64 {
            let c = chunk();
            let racer = Arc::clone(&c);
            let claim = std::thread::spawn(move || racer.begin_task(TaskKind::Save));
            let released = c.release_storage();
            let ticket = claim.join().unwrap();
            assert_ne!(released, ticket.is_some());
            assert_eq!(c.is_released(), released);
        }
    }

    #[test]
    fn abandoned_chunks_only_accept_save() {
        let c = chunk();
        let t = c.begin_task(TaskKind::Generate).unwrap();
        c.mark_abandoned();
        assert!(c.end_task(t));
        assert!(c.begin_task(TaskKind::Light).is_none());
        let s = c.begin_task(TaskKind::Save).unwrap();
        assert_eq!(s.kind(), TaskKind::Save);
    }

    #[test]
    fn column_heights_initialise_once() {
        let gd = ChunkGridData::new(ColumnCoord { cx: 1, cz: 1 });
        assert!(gd.heights().is_none());
        let mut calls = 0;
        gd.heights_or_init(|| {
            calls += 1;
            ColumnHeights::unloaded()
        });
        gd.heights_or_init(|| {
            calls += 1;
            ColumnHeights::unloaded()
        });
        assert_eq!(calls, 1);
    }
}
