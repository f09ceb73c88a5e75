use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use geist_chunk::{ChunkHandle, TaskKind, TaskTicket};
use geist_io::{ChunkStore, VoxelBuffer};
use geist_lighting::{LightEngine, LightMessage};
use geist_world::{ColumnHeights, FloraPlacement, GenLevel, TerrainGenerator, WorldError};

use crate::mesh::{ChunkMesh, ChunkMesher};

/// The collaborators a worker needs. Shared by every lane.
pub struct TaskEnv {
    pub generator: Arc<dyn TerrainGenerator>,
    pub store: Arc<dyn ChunkStore>,
    pub engine: Arc<LightEngine>,
    pub mesher: Arc<dyn ChunkMesher>,
}

/// One unit of work for a chunk. Owning the ticket keeps the chunk alive and
/// its in-flight tag set until the outcome is handed back.
#[derive(Debug)]
pub struct ChunkTask {
    pub ticket: TaskTicket,
    pub submitted: Instant,
}

impl ChunkTask {
    pub fn new(ticket: TaskTicket) -> Self {
        Self {
            ticket,
            submitted: Instant::now(),
        }
    }

    #[inline]
    pub fn kind(&self) -> TaskKind {
        self.ticket.kind()
    }
}

#[derive(Debug)]
pub enum TaskResult {
    /// `None` when the store had nothing for this chunk.
    Loaded(Option<LoadedChunk>),
    Generated {
        level: GenLevel,
        flora: Vec<FloraPlacement>,
        has_liquid: bool,
    },
    /// Messages for neighbors produced by the local pass.
    Lit { messages: Vec<LightMessage> },
    Meshed(ChunkMesh),
    Saved,
    Failed(WorldError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedChunk {
    pub level: GenLevel,
    pub has_liquid: bool,
    /// Trees still owed to a chunk saved before they were placed.
    pub flora: Vec<FloraPlacement>,
}

#[derive(Debug)]
pub struct TaskOutcome {
    pub ticket: TaskTicket,
    pub result: TaskResult,
    pub t_total_ms: u32,
}

fn elapsed_ms(t0: Instant) -> u32 {
    t0.elapsed().as_millis().min(u128::from(u32::MAX)) as u32
}

fn column_heights<'a>(env: &TaskEnv, chunk: &'a ChunkHandle) -> &'a ColumnHeights {
    let grid_data = chunk.grid_data();
    grid_data.heights_or_init(|| {
        let mut h = ColumnHeights::unloaded();
        env.generator.generate_heightmap(grid_data.column(), &mut h);
        h
    })
}

fn load(env: &TaskEnv, chunk: &ChunkHandle) -> Result<TaskResult, WorldError> {
    let Some(buf) = env.store.load(chunk.coord())? else {
        return Ok(TaskResult::Loaded(None));
    };
    let table = env.engine.table();
    let has_liquid = {
        let mut data = chunk.lock_data();
        data.fill_blocks(&buf.blocks);
        data.fill_tertiary(&buf.tertiary);
        data.compact();
        data.any_block(|b| table.is_liquid(b))
    };
    // Flora is not persisted; generation is deterministic, so re-derive it.
    let flora = if buf.gen_level < GenLevel::Done {
        let heights = column_heights(env, chunk);
        env.generator
            .generate_chunk(chunk.coord(), heights, GenLevel::Done)?
            .flora
    } else {
        Vec::new()
    };
    Ok(TaskResult::Loaded(Some(LoadedChunk {
        level: buf.gen_level,
        has_liquid,
        flora,
    })))
}

fn generate(env: &TaskEnv, chunk: &ChunkHandle) -> Result<TaskResult, WorldError> {
    let heights = column_heights(env, chunk);
    let generated = env
        .generator
        .generate_chunk(chunk.coord(), heights, GenLevel::Done)?;
    let table = env.engine.table();
    let has_liquid = {
        let mut data = chunk.lock_data();
        data.fill_blocks(&generated.blocks);
        data.fill_tertiary(&generated.tertiary);
        data.compact();
        data.any_block(|b| table.is_liquid(b))
    };
    Ok(TaskResult::Generated {
        level: generated.level,
        flora: generated.flora,
        has_liquid,
    })
}

fn save(env: &TaskEnv, chunk: &ChunkHandle) -> Result<TaskResult, WorldError> {
    let buf = {
        let data = chunk.lock_data();
        let mut tertiary = data.tertiary_vec();
        if tertiary.iter().all(|&v| v == 0) {
            tertiary.clear();
        }
        VoxelBuffer {
            blocks: data.blocks_vec(),
            tertiary,
            gen_level: chunk.gen_level(),
        }
    };
    env.store.save(chunk.coord(), &buf)?;
    Ok(TaskResult::Saved)
}

/// Execute a task on the calling thread. Never touches chunk lifecycle state;
/// that is applied by the owning thread when the outcome comes back.
pub fn run_task(task: ChunkTask, env: &TaskEnv) -> TaskOutcome {
    let t0 = Instant::now();
    let chunk = Arc::clone(task.ticket.chunk());
    let kind = task.kind();
    log::trace!(
        target: "workers",
        "run {:?} {} queued_ms={}",
        kind,
        chunk.coord(),
        elapsed_ms(task.submitted)
    );
    let result = match kind {
        TaskKind::Load => load(env, &chunk),
        TaskKind::Generate => generate(env, &chunk),
        TaskKind::Light => {
            let heights = column_heights(env, &chunk);
            let out = env.engine.initial_light(&chunk, heights);
            Ok(TaskResult::Lit {
                messages: out.messages,
            })
        }
        TaskKind::Mesh | TaskKind::WaterMesh => {
            let snapshot = chunk.snapshot();
            Ok(TaskResult::Meshed(
                env.mesher.build(&snapshot, kind == TaskKind::WaterMesh),
            ))
        }
        TaskKind::Save => save(env, &chunk),
    };
    TaskOutcome {
        ticket: task.ticket,
        result: result.unwrap_or_else(TaskResult::Failed),
        t_total_ms: elapsed_ms(t0),
    }
}

/// Lets the owning thread sleep until some worker finishes a task.
#[derive(Default)]
pub struct CompletionSignal {
    completed: Mutex<u64>,
    cv: Condvar,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        let mut n = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        *n += 1;
        self.cv.notify_all();
    }

    /// Completions signalled so far.
    pub fn count(&self) -> u64 {
        *self.completed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the count moves past `seen` or `timeout` elapses.
    /// Returns the count observed on wake.
    pub fn wait_past(&self, seen: u64, timeout: Duration) -> u64 {
        let guard = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |n| *n <= seen)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn waiter_wakes_on_notify() {
        let signal = Arc::new(CompletionSignal::new());
        let seen = signal.count();
        let s2 = Arc::clone(&signal);
        let h = thread::spawn(move || s2.notify());
        let now = signal.wait_past(seen, Duration::from_secs(5));
        h.join().unwrap();
        assert_eq!(now, seen + 1);
    }

    #[test]
    fn wait_times_out_without_notify() {
        let signal = CompletionSignal::new();
        assert_eq!(signal.wait_past(0, Duration::from_millis(5)), 0);
    }
}
