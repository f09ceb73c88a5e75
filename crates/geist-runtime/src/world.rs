use std::sync::Arc;
use std::time::{Duration, Instant};

use geist_blocks::{AIR, BlockId, BlockRegistry};
use geist_chunk::{Chunk, ChunkGrid, ChunkHandle, ChunkState, LampColor, TaskKind};
use geist_lighting::{LightEngine, LightMessage, LightTable, SettleReport};
use geist_storage::{RecyclerStats, SizeClass, VoxelRecyclers};
use geist_world::generation::trees::{TreePart, tree_blocks};
use geist_io::ChunkStore;
use geist_world::{CHUNK_VOLUME, ChunkCoord, Face, GenLevel, TerrainGenerator, WorldError};
use hashbrown::{HashMap, HashSet};

use crate::config::RuntimeConfig;
use crate::event::WorldEvent;
use crate::mesh::{ChunkMesher, FaceCountMesher};
use crate::scheduler::ChunkScheduler;
use crate::task::{ChunkTask, TaskEnv, TaskOutcome, TaskResult};
use crate::workers::TaskExecutor;

/// Session-scoped tables and pools shared by the world and its workers.
pub struct WorldContext {
    pub registry: Arc<BlockRegistry>,
    pub engine: Arc<LightEngine>,
    pub recyclers: VoxelRecyclers,
    pub config: RuntimeConfig,
    log_block: BlockId,
    leaves_block: BlockId,
}

impl WorldContext {
    pub fn new(registry: Arc<BlockRegistry>, config: RuntimeConfig) -> Result<Self, String> {
        let find = |part: TreePart| {
            registry
                .id_by_name(part.block_name())
                .ok_or_else(|| format!("block registry has no '{}'", part.block_name()))
        };
        let log_block = find(TreePart::Log)?;
        let leaves_block = find(TreePart::Leaves)?;
        let table = Arc::new(LightTable::from_registry(&registry));
        let recyclers = if config.recycler_max_free > 0 {
            VoxelRecyclers::new(SizeClass(CHUNK_VOLUME), config.recycler_max_free)
        } else {
            VoxelRecyclers::for_chunks(SizeClass(CHUNK_VOLUME), config.view_volume())
        };
        Ok(Self {
            engine: Arc::new(LightEngine::new(table)),
            registry,
            recyclers,
            config,
            log_block,
            leaves_block,
        })
    }

    /// Worker environment with the default face-count mesher.
    pub fn task_env(
        &self,
        generator: Arc<dyn TerrainGenerator>,
        store: Arc<dyn ChunkStore>,
    ) -> TaskEnv {
        let mesher: Arc<dyn ChunkMesher> = Arc::new(FaceCountMesher::new(&self.registry));
        TaskEnv {
            generator,
            store,
            engine: Arc::clone(&self.engine),
            mesher,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub completed: usize,
    pub dispatched: usize,
    pub evicted: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub saved: usize,
    pub failed: usize,
    /// Dirty chunks still unsaved when the deadline passed.
    pub remaining: usize,
}

#[derive(Clone, Debug, Default)]
pub struct WorldStats {
    pub chunks: usize,
    pub columns: usize,
    pub evicting: usize,
    pub pending: usize,
    pub delayed: usize,
    pub parked: usize,
    pub outstanding_tasks: usize,
    /// Live chunks per `ChunkState`, indexed by its discriminant.
    pub states: [usize; 9],
    pub shorts: RecyclerStats,
    pub bytes: RecyclerStats,
    pub light_delivered: usize,
    pub light_dropped: usize,
    pub saves_ok: usize,
    pub saves_failed: usize,
}

enum Dispatch {
    Submitted,
    Ran,
    Busy,
    Parked,
    Skipped,
}

/// Owns the chunk grid and drives every chunk through its lifecycle. All
/// state transitions and cross-chunk light work happen on the thread that
/// owns this value; workers only fill chunk data through task tickets.
pub struct ChunkWorld {
    ctx: WorldContext,
    grid: ChunkGrid,
    scheduler: ChunkScheduler,
    executor: Arc<dyn TaskExecutor>,
    center: Option<ChunkCoord>,
    evicting: HashMap<ChunkCoord, ChunkHandle>,
    /// Positions asked for while their previous chunk was still evicting.
    readd: HashSet<ChunkCoord>,
    relight: HashSet<ChunkCoord>,
    events: Vec<WorldEvent>,
    light_delivered: usize,
    light_dropped: usize,
    saves_ok: usize,
    saves_failed: usize,
}

impl ChunkWorld {
    pub fn new(ctx: WorldContext, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            ctx,
            grid: ChunkGrid::new(),
            scheduler: ChunkScheduler::new(),
            executor,
            center: None,
            evicting: HashMap::new(),
            readd: HashSet::new(),
            relight: HashSet::new(),
            events: Vec::new(),
            light_delivered: 0,
            light_dropped: 0,
            saves_ok: 0,
            saves_failed: 0,
        }
    }

    #[inline]
    pub fn grid(&self) -> &ChunkGrid {
        &self.grid
    }

    #[inline]
    pub fn scheduler(&self) -> &ChunkScheduler {
        &self.scheduler
    }

    #[inline]
    pub fn context(&self) -> &WorldContext {
        &self.ctx
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<ChunkHandle> {
        self.grid.get(coord)
    }

    pub fn is_evicting(&self, coord: ChunkCoord) -> bool {
        self.evicting.contains_key(&coord)
    }

    fn lookup(&self, coord: ChunkCoord) -> Option<ChunkHandle> {
        self.grid
            .get(coord)
            .or_else(|| self.evicting.get(&coord).cloned())
    }

    fn distance2(&self, coord: ChunkCoord) -> i64 {
        match self.grid.distance2(coord) {
            Some(d) if d != i64::MAX => d,
            _ => self.center.map(|c| coord.distance_sq(c)).unwrap_or(0),
        }
    }

    fn within(&self, coord: ChunkCoord, slack: i32) -> bool {
        let Some(c) = self.center else {
            return false;
        };
        let r = self.ctx.config.view_radius + slack;
        let vr = self.ctx.config.vertical_radius + slack;
        (coord.cx - c.cx).abs() <= r && (coord.cz - c.cz).abs() <= r && (coord.cy - c.cy).abs() <= vr
    }

    fn advance(&mut self, chunk: &ChunkHandle, state: ChunkState) {
        chunk.set_state(state);
        let d2 = self.distance2(chunk.coord());
        self.scheduler.enqueue(chunk.coord(), state, d2);
    }

    /// Create the chunk at `coord` (if absent) and start its lifecycle. While
    /// the previous chunk there is still evicting, returns `None` and
    /// recreates the chunk once that eviction (and its save) completes.
    pub fn load_chunk(&mut self, coord: ChunkCoord) -> Option<ChunkHandle> {
        if self.evicting.contains_key(&coord) {
            log::debug!(target: "scheduler", "load {} deferred until its eviction finishes", coord);
            self.readd.insert(coord);
            return None;
        }
        Some(self.add_chunk(coord))
    }

    fn add_chunk(&mut self, coord: ChunkCoord) -> ChunkHandle {
        debug_assert!(!self.evicting.contains_key(&coord));
        if let Some(chunk) = self.grid.get(coord) {
            return chunk;
        }
        let recyclers = &self.ctx.recyclers;
        let chunk = self
            .grid
            .insert(coord, |grid_data| Arc::new(Chunk::new(coord, grid_data, recyclers)));
        self.advance(&chunk, ChunkState::Load);
        self.wake_around(coord);
        chunk
    }

    /// Re-enqueue chunks parked waiting on the chunk at `coord`: face
    /// neighbors, and the edge and corner ones a tree can reach into.
    fn wake_around(&mut self, coord: ChunkCoord) {
        for dy in -1..=1 {
            for dz in -1..=1 {
                for dx in -1..=1 {
                    if (dx, dy, dz) == (0, 0, 0) {
                        continue;
                    }
                    let n = coord.offset(dx, dy, dz);
                    if let Some(state) = self.scheduler.unpark(n) {
                        let d2 = self.distance2(n);
                        self.scheduler.enqueue(n, state, d2);
                    }
                }
            }
        }
    }

    /// Recentre the view: evict chunks that left it (with one chunk of
    /// slack) and create the ones that entered it. A position whose previous
    /// chunk is still being evicted is picked up by a later call.
    pub fn update_view(&mut self, center: ChunkCoord) {
        self.center = Some(center);
        for coord in self.grid.coords() {
            if !self.within(coord, 1) {
                self.evict(coord);
            }
        }
        let r = self.ctx.config.view_radius;
        let vr = self.ctx.config.vertical_radius;
        let mut added = 0;
        for dy in -vr..=vr {
            for dz in -r..=r {
                for dx in -r..=r {
                    let coord = center.offset(dx, dy, dz);
                    if self.grid.contains(coord) || self.evicting.contains_key(&coord) {
                        continue;
                    }
                    self.add_chunk(coord);
                    added += 1;
                }
            }
        }
        self.grid.update_distances(center);
        let grid = &self.grid;
        self.scheduler
            .reprioritize(|c| grid.distance2(c).unwrap_or(i64::MAX));
        log::info!(
            target: "scheduler",
            "view recentred on {} added={} live={} evicting={}",
            center,
            added,
            self.grid.len(),
            self.evicting.len()
        );
    }

    /// Unlink a chunk from the grid. Its storage is released once no task
    /// holds it and any dirty data has been saved.
    pub fn evict(&mut self, coord: ChunkCoord) -> bool {
        self.readd.remove(&coord);
        let Some(chunk) = self.grid.remove(coord) else {
            return false;
        };
        chunk.mark_abandoned();
        self.scheduler.forget(coord);
        self.relight.remove(&coord);
        log::debug!(
            target: "scheduler",
            "evict {} state={:?} in_flight={:?} dirty={}",
            coord,
            chunk.state(),
            chunk.in_flight(),
            chunk.is_dirty()
        );
        self.evicting.insert(coord, chunk);
        true
    }

    pub fn evict_all(&mut self) -> usize {
        let coords = self.grid.coords();
        coords.into_iter().filter(|c| self.evict(*c)).count()
    }

    pub fn pending_evictions(&self) -> usize {
        self.evicting.len()
    }

    /// Apply finished tasks, dispatch up to the configured budget, and
    /// finish evictions whose chunks are idle.
    pub fn tick(&mut self) -> TickReport {
        let now = Instant::now();
        let mut report = TickReport {
            completed: self.drain_completions(),
            ..TickReport::default()
        };
        self.scheduler.promote_due(now);
        let mut busy = Vec::new();
        while report.dispatched < self.ctx.config.dispatch_budget {
            let Some((coord, state)) = self.scheduler.pop() else {
                break;
            };
            match self.dispatch(coord, state) {
                Dispatch::Submitted => report.dispatched += 1,
                Dispatch::Busy => busy.push((coord, state)),
                Dispatch::Ran | Dispatch::Parked | Dispatch::Skipped => {}
            }
        }
        for (coord, state) in busy {
            let d2 = self.distance2(coord);
            self.scheduler.enqueue(coord, state, d2);
        }
        report.evicted = self.process_evictions();
        report
    }

    fn drain_completions(&mut self) -> usize {
        let outcomes = self.executor.drain();
        let n = outcomes.len();
        for outcome in outcomes {
            self.complete(outcome);
        }
        n
    }

    fn submit(&self, chunk: &ChunkHandle, kind: TaskKind) -> Dispatch {
        match chunk.begin_task(kind) {
            Some(ticket) => {
                log::trace!(target: "scheduler", "dispatch {:?} {}", kind, chunk.coord());
                self.executor.submit(ChunkTask::new(ticket));
                Dispatch::Submitted
            }
            None if chunk.is_abandoned() && kind != TaskKind::Save => Dispatch::Skipped,
            None => Dispatch::Busy,
        }
    }

    fn dispatch(&mut self, coord: ChunkCoord, state: ChunkState) -> Dispatch {
        let Some(chunk) = self.lookup(coord) else {
            return Dispatch::Skipped;
        };
        if chunk.is_released() {
            return Dispatch::Skipped;
        }
        match state {
            ChunkState::Load => self.submit(&chunk, TaskKind::Load),
            ChunkState::Generate => self.submit(&chunk, TaskKind::Generate),
            ChunkState::Light => self.submit(&chunk, TaskKind::Light),
            ChunkState::Save => self.submit(&chunk, TaskKind::Save),
            ChunkState::Trees => {
                if chunk.in_flight().is_some() {
                    return Dispatch::Busy;
                }
                if !self.neighbors_ready(&chunk, |n| n.is_accessible())
                    || !self.flora_targets_ready(&chunk)
                {
                    self.scheduler.park(coord, state);
                    return Dispatch::Parked;
                }
                self.place_flora(&chunk);
                Dispatch::Ran
            }
            ChunkState::Mesh | ChunkState::WaterMesh => {
                if !chunk.is_lit() || !self.neighbors_ready(&chunk, |n| n.is_lit()) {
                    self.scheduler.park(coord, state);
                    return Dispatch::Parked;
                }
                let kind = if state == ChunkState::Mesh {
                    TaskKind::Mesh
                } else {
                    TaskKind::WaterMesh
                };
                self.submit(&chunk, kind)
            }
            ChunkState::Draw | ChunkState::Inactive => Dispatch::Skipped,
        }
    }

    /// All six neighbors present and passing `ready`. A half-linked neighbor
    /// counts as not ready; the chunk is retried when a neighbor changes.
    fn neighbors_ready(&self, chunk: &ChunkHandle, ready: impl Fn(&Chunk) -> bool) -> bool {
        match self.grid.neighbors(chunk.coord()) {
            Ok(ns) => ns.iter().all(|n| n.as_deref().is_some_and(&ready)),
            Err(e) => {
                log::warn!(target: "scheduler", "deferring {}: {e}", chunk.coord());
                false
            }
        }
    }

    /// Every other chunk the pending trees write into has voxel data.
    fn flora_targets_ready(&self, chunk: &ChunkHandle) -> bool {
        let coord = chunk.coord();
        let targets: HashSet<ChunkCoord> = chunk
            .pending_flora()
            .iter()
            .flat_map(tree_blocks)
            .map(|((wx, wy, wz), _)| ChunkCoord::from_world(wx, wy, wz))
            .filter(|&c| c != coord)
            .collect();
        let missing = targets
            .iter()
            .filter(|&&c| !self.grid.get(c).is_some_and(|t| t.is_accessible()))
            .count();
        if missing > 0 {
            log::trace!(target: "scheduler", "flora {} waits on {} chunks", coord, missing);
        }
        missing == 0
    }

    /// Place queued trees into this chunk and whatever live neighbors they reach.
    fn place_flora(&mut self, chunk: &ChunkHandle) {
        let coord = chunk.coord();
        let flora = chunk.take_flora();
        let mut touched: HashSet<ChunkCoord> = HashSet::new();
        let mut placed = 0usize;
        for tree in &flora {
            for ((wx, wy, wz), part) in tree_blocks(tree) {
                let Some(target) = self.grid.get(ChunkCoord::from_world(wx, wy, wz)) else {
                    continue;
                };
                if !target.is_accessible() {
                    continue;
                }
                let index = ChunkCoord::local_index(wx, wy, wz);
                let current = target.lock_data().block(index);
                let id = match part {
                    TreePart::Log => self.ctx.log_block,
                    TreePart::Leaves => self.ctx.leaves_block,
                };
                let replaceable = current == AIR
                    || (part == TreePart::Log && current == self.ctx.leaves_block);
                if !replaceable {
                    continue;
                }
                if let Some((_, report)) = self.edit(&target, index, id) {
                    touched.insert(target.coord());
                    touched.extend(report.touched);
                    placed += 1;
                }
            }
        }
        chunk.set_gen_level(GenLevel::Done);
        chunk.mark_dirty();
        log::debug!(target: "scheduler", "flora {} trees={} blocks={}", coord, flora.len(), placed);
        self.advance(chunk, ChunkState::Mesh);
        touched.remove(&coord);
        for t in touched {
            self.remesh(t);
        }
    }

    fn edit(
        &mut self,
        chunk: &ChunkHandle,
        index: usize,
        id: BlockId,
    ) -> Option<(BlockId, SettleReport)> {
        if chunk.in_flight() == Some(TaskKind::Light) {
            self.relight.insert(chunk.coord());
        }
        let out = self
            .ctx
            .engine
            .set_block(&self.grid, chunk, index, id)?;
        if self.ctx.engine.table().is_liquid(id) {
            chunk.set_has_liquid(true);
        }
        self.light_delivered += out.1.delivered;
        self.light_dropped += out.1.dropped;
        Some(out)
    }

    /// Send a chunk that was already meshed back through meshing.
    fn remesh(&mut self, coord: ChunkCoord) {
        let Some(chunk) = self.grid.get(coord) else {
            return;
        };
        let state = chunk.state();
        if state < ChunkState::Mesh || state > ChunkState::Draw {
            return;
        }
        chunk.set_mesh_ready(false, false);
        chunk.set_mesh_ready(true, false);
        self.advance(&chunk, ChunkState::Mesh);
    }

    fn complete(&mut self, outcome: TaskOutcome) {
        let TaskOutcome {
            ticket,
            result,
            t_total_ms,
        } = outcome;
        let chunk = Arc::clone(ticket.chunk());
        let kind = ticket.kind();
        let coord = chunk.coord();
        let abandoned = chunk.end_task(ticket);
        log::trace!(target: "scheduler", "complete {:?} {} {}ms", kind, coord, t_total_ms);
        if abandoned {
            match result {
                TaskResult::Saved => self.saved(&chunk),
                TaskResult::Failed(err) if kind == TaskKind::Save => self.save_failed(&chunk, err),
                _ => log::debug!(target: "scheduler", "discarding {:?} result for evicted {}", kind, coord),
            }
            return;
        }
        match result {
            TaskResult::Failed(err) => self.task_failed(&chunk, kind, err),
            TaskResult::Loaded(Some(loaded)) => {
                if loaded.flora.is_empty() {
                    chunk.set_gen_level(GenLevel::Done);
                } else {
                    log::debug!(target: "io", "chunk {} reloaded with {} trees unplaced", coord, loaded.flora.len());
                    chunk.set_gen_level(loaded.level);
                    chunk.set_flora(loaded.flora);
                }
                chunk.set_has_liquid(loaded.has_liquid);
                chunk.set_accessible(true);
                self.scheduler.clear_failures(coord, ChunkState::Load);
                self.advance(&chunk, ChunkState::Light);
                self.wake_around(coord);
            }
            TaskResult::Loaded(None) => {
                self.scheduler.clear_failures(coord, ChunkState::Load);
                self.advance(&chunk, ChunkState::Generate);
            }
            TaskResult::Generated {
                level,
                flora,
                has_liquid,
            } => {
                chunk.set_gen_level(level);
                chunk.set_has_liquid(has_liquid);
                chunk.set_flora(flora);
                chunk.mark_dirty();
                chunk.set_accessible(true);
                self.scheduler.clear_failures(coord, ChunkState::Generate);
                self.advance(&chunk, ChunkState::Light);
                self.wake_around(coord);
            }
            TaskResult::Lit { messages } => self.light_finished(&chunk, messages),
            TaskResult::Meshed(mesh) => {
                chunk.set_mesh_ready(mesh.water, true);
                if !mesh.water && chunk.has_liquid() {
                    self.advance(&chunk, ChunkState::WaterMesh);
                } else {
                    chunk.set_state(ChunkState::Draw);
                    self.events.push(WorldEvent::ChunkDrawable { coord, mesh });
                }
            }
            TaskResult::Saved => self.saved(&chunk),
        }
    }

    fn light_finished(&mut self, chunk: &ChunkHandle, messages: Vec<LightMessage>) {
        let coord = chunk.coord();
        if self.relight.remove(&coord) {
            log::debug!(target: "light", "chunk {} edited while lighting, relighting", coord);
            self.advance(chunk, ChunkState::Light);
            return;
        }
        chunk.set_lit(true);
        let mut inbox = messages;
        inbox.extend(self.ctx.engine.exchange_borders(&self.grid, chunk));
        let report = self
            .ctx
            .engine
            .settle(&self.grid, [Arc::clone(chunk)], inbox);
        self.light_delivered += report.delivered;
        self.light_dropped += report.dropped;
        for t in report.touched {
            if t != coord {
                self.remesh(t);
            }
        }
        let next = if chunk.has_pending_flora() {
            ChunkState::Trees
        } else {
            ChunkState::Mesh
        };
        self.advance(chunk, next);
        self.wake_around(coord);
    }

    fn task_failed(&mut self, chunk: &ChunkHandle, kind: TaskKind, err: WorldError) {
        let coord = chunk.coord();
        let d2 = self.distance2(coord);
        match kind {
            TaskKind::Load if err.is_retryable() => {
                let attempt = self.scheduler.note_failure(coord, ChunkState::Load);
                let delay = self.ctx.config.backoff(attempt);
                log::warn!(target: "io", "load {} failed (attempt {attempt}), retry in {:?}: {err}", coord, delay);
                self.scheduler
                    .retry_later(coord, ChunkState::Load, d2, delay, Instant::now());
            }
            TaskKind::Load => {
                log::warn!(target: "io", "discarding unreadable chunk {}: {err}", coord);
                self.advance(chunk, ChunkState::Generate);
            }
            TaskKind::Generate => {
                let attempt = self.scheduler.note_failure(coord, ChunkState::Generate);
                if attempt > self.ctx.config.generation_retry_limit {
                    log::error!(target: "scheduler", "chunk {} stuck in generate after {attempt} attempts: {err}", coord);
                    self.scheduler.mark_stuck(coord);
                    self.events.push(WorldEvent::ChunkStuck {
                        coord,
                        reason: err.to_string(),
                    });
                } else {
                    log::warn!(target: "scheduler", "generate {} failed (attempt {attempt}): {err}", coord);
                    self.scheduler.enqueue(coord, ChunkState::Generate, d2);
                }
            }
            TaskKind::Light | TaskKind::Mesh | TaskKind::WaterMesh => {
                log::warn!(target: "scheduler", "{:?} {} failed, re-enqueued: {err}", kind, coord);
                self.scheduler.enqueue(coord, chunk.state(), d2);
            }
            TaskKind::Save => self.save_failed(chunk, err),
        }
    }

    fn saved(&mut self, chunk: &ChunkHandle) {
        chunk.clear_dirty();
        self.saves_ok += 1;
        self.scheduler.clear_failures(chunk.coord(), ChunkState::Save);
    }

    /// The chunk stays dirty. Evicting chunks retry with backoff; live
    /// chunks are retried by the next save pass.
    fn save_failed(&mut self, chunk: &ChunkHandle, err: WorldError) {
        let coord = chunk.coord();
        self.saves_failed += 1;
        let attempt = self.scheduler.note_failure(coord, ChunkState::Save);
        self.events.push(WorldEvent::SaveFailed {
            coord,
            attempt,
            reason: err.to_string(),
        });
        if attempt > self.ctx.config.save_retry_limit {
            log::error!(target: "io", "giving up on saving {} after {attempt} attempts: {err}", coord);
            self.events.push(WorldEvent::SaveAbandoned { coord });
            return;
        }
        log::warn!(target: "io", "save {} failed (attempt {attempt}): {err}", coord);
        if self.evicting.contains_key(&coord) {
            let delay = self.ctx.config.backoff(attempt);
            self.scheduler
                .retry_later(coord, ChunkState::Save, 0, delay, Instant::now());
        }
    }

    fn process_evictions(&mut self) -> usize {
        let coords: Vec<ChunkCoord> = self.evicting.keys().copied().collect();
        let mut finished = 0;
        for coord in coords {
            let Some(chunk) = self.evicting.get(&coord).cloned() else {
                continue;
            };
            if chunk.in_flight().is_some() || self.scheduler.is_pending(coord) {
                continue;
            }
            let needs_save = chunk.is_dirty() && chunk.is_accessible();
            let attempts = self.scheduler.failures(coord, ChunkState::Save);
            if needs_save && attempts <= self.ctx.config.save_retry_limit {
                chunk.set_state(ChunkState::Save);
                self.submit(&chunk, TaskKind::Save);
                continue;
            }
            if needs_save {
                log::error!(target: "io", "evicting {} with unsaved changes", coord);
            }
            if !chunk.release_storage() {
                continue;
            }
            self.evicting.remove(&coord);
            self.scheduler.clear_failures(coord, ChunkState::Save);
            self.events.push(WorldEvent::ChunkEvicted { coord });
            finished += 1;
            if self.readd.remove(&coord) {
                self.add_chunk(coord);
            }
        }
        finished
    }

    /// Drive the lifecycle until `coord` has voxel data, blocking on worker
    /// completions. Used where data is needed right away (spawn lookup).
    pub fn generate_blocking(
        &mut self,
        coord: ChunkCoord,
        timeout: Duration,
    ) -> Result<ChunkHandle, WorldError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.grid.get(coord) {
                Some(chunk) if chunk.is_accessible() => return Ok(chunk),
                Some(_) => {}
                None if self.evicting.contains_key(&coord) => {}
                None => {
                    self.add_chunk(coord);
                }
            }
            if self.scheduler.is_stuck(coord) {
                return Err(WorldError::Generation {
                    coord,
                    reason: "generation retries exhausted".into(),
                });
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(WorldError::Generation {
                    coord,
                    reason: format!("not generated within {timeout:?}"),
                });
            }
            let seen = self.executor.signal().count();
            let report = self.tick();
            if report.completed == 0 && report.dispatched == 0 {
                let wait = (deadline - now).min(Duration::from_millis(10));
                self.executor.signal().wait_past(seen, wait);
            }
        }
    }

    /// Replace the block at a world position, relight, and remesh what changed.
    /// Returns the previous block, or `None` if that chunk has no data yet.
    pub fn set_block(&mut self, wx: i32, wy: i32, wz: i32, id: BlockId) -> Option<BlockId> {
        let coord = ChunkCoord::from_world(wx, wy, wz);
        let chunk = self.grid.get(coord)?;
        let index = ChunkCoord::local_index(wx, wy, wz);
        let (old, report) = self.edit(&chunk, index, id)?;
        let mut remesh: HashSet<ChunkCoord> = report.touched.into_iter().collect();
        remesh.insert(coord);
        for face in Face::ALL {
            if face.step(index).is_none() {
                remesh.insert(coord.neighbor(face));
            }
        }
        for c in remesh {
            self.remesh(c);
        }
        Some(old)
    }

    pub fn block_at(&self, wx: i32, wy: i32, wz: i32) -> Option<BlockId> {
        let chunk = self.grid.get(ChunkCoord::from_world(wx, wy, wz))?;
        if !chunk.is_accessible() {
            return None;
        }
        let index = ChunkCoord::local_index(wx, wy, wz);
        Some(chunk.lock_data().block(index))
    }

    /// Sunlight and lamp light at a world position, once its chunk is lit.
    pub fn light_at(&self, wx: i32, wy: i32, wz: i32) -> Option<(u8, LampColor)> {
        let chunk = self.grid.get(ChunkCoord::from_world(wx, wy, wz))?;
        if !chunk.is_lit() {
            return None;
        }
        let index = ChunkCoord::local_index(wx, wy, wz);
        let data = chunk.lock_data();
        Some((data.sunlight(index), data.lamp(index)))
    }

    /// Save every dirty live chunk, waiting up to `timeout`. Other work is
    /// not dispatched meanwhile, so busy chunks become idle and get saved.
    pub fn save_all(&mut self, timeout: Duration) -> SaveSummary {
        let deadline = Instant::now() + timeout;
        let (ok0, failed0) = (self.saves_ok, self.saves_failed);
        let mut attempted: HashSet<ChunkCoord> = HashSet::new();
        let mut summary = SaveSummary::default();
        loop {
            self.drain_completions();
            let mut waiting = 0;
            for chunk in self.grid.handles() {
                let coord = chunk.coord();
                if attempted.contains(&coord) {
                    if chunk.in_flight().is_some() {
                        waiting += 1;
                    }
                    continue;
                }
                if !chunk.is_dirty() || !chunk.is_accessible() {
                    continue;
                }
                if let Dispatch::Submitted = self.submit(&chunk, TaskKind::Save) {
                    attempted.insert(coord);
                }
                waiting += 1;
            }
            if waiting == 0 {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                summary.remaining = waiting;
                break;
            }
            let seen = self.executor.signal().count();
            let wait = (deadline - now).min(Duration::from_millis(10));
            self.executor.signal().wait_past(seen, wait);
        }
        summary.saved = self.saves_ok - ok0;
        summary.failed = self.saves_failed - failed0;
        if summary.failed > 0 || summary.remaining > 0 {
            log::warn!(
                target: "io",
                "save pass: saved={} failed={} unsaved={}",
                summary.saved,
                summary.failed,
                summary.remaining
            );
        } else {
            log::info!(target: "io", "save pass: saved={}", summary.saved);
        }
        summary
    }

    pub fn stats(&self) -> WorldStats {
        let mut states = [0usize; 9];
        for chunk in self.grid.handles() {
            states[chunk.state().as_u8() as usize] += 1;
        }
        WorldStats {
            chunks: self.grid.len(),
            columns: self.grid.column_count(),
            evicting: self.evicting.len(),
            pending: self.scheduler.len(),
            delayed: self.scheduler.delayed_len(),
            parked: self.scheduler.parked_len(),
            outstanding_tasks: self.executor.outstanding(),
            states,
            shorts: self.ctx.recyclers.shorts.stats(),
            bytes: self.ctx.recyclers.bytes.stats(),
            light_delivered: self.light_delivered,
            light_dropped: self.light_dropped,
            saves_ok: self.saves_ok,
            saves_failed: self.saves_failed,
        }
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }
}
