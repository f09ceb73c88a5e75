use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{Receiver, Sender, TryRecvError, select, unbounded};
use geist_chunk::TaskKind;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

use crate::task::{ChunkTask, CompletionSignal, TaskEnv, TaskOutcome, run_task};

/// Where chunk tasks run. Outcomes are collected and handed back to the
/// owning thread through `drain`.
pub trait TaskExecutor: Send + Sync {
    fn submit(&self, task: ChunkTask);

    fn drain(&self) -> Vec<TaskOutcome>;

    fn signal(&self) -> &Arc<CompletionSignal>;

    /// Tasks submitted but not yet drained.
    fn outstanding(&self) -> usize;
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Lane {
    Io,
    Light,
    Bg,
}

impl Lane {
    pub fn for_kind(kind: TaskKind) -> Lane {
        match kind {
            TaskKind::Load | TaskKind::Save => Lane::Io,
            TaskKind::Light => Lane::Light,
            TaskKind::Generate | TaskKind::Mesh | TaskKind::WaterMesh => Lane::Bg,
        }
    }
}

#[derive(Default)]
struct LaneCounters {
    queued: AtomicUsize,
    inflight: AtomicUsize,
}

#[derive(Clone)]
struct WorkerCtx {
    env: Arc<TaskEnv>,
    tx: Sender<TaskOutcome>,
    signal: Arc<CompletionSignal>,
}

impl WorkerCtx {
    fn process(&self, task: ChunkTask, counters: &LaneCounters) {
        counters.queued.fetch_sub(1, Ordering::Relaxed);
        counters.inflight.fetch_add(1, Ordering::Relaxed);
        let out = run_task(task, &self.env);
        counters.inflight.fetch_sub(1, Ordering::Relaxed);
        // Receiver gone means the world is shutting down; the ticket drops here.
        let _ = self.tx.send(out);
        self.signal.notify();
    }
}

/// Fixed worker threads split into lanes: `io` runs loads and saves, `light`
/// runs initial lighting, `bg` runs generation and meshing and also drains
/// the light lane when it has nothing else to do.
pub struct WorkerPool {
    job_tx_io: Sender<ChunkTask>,
    job_tx_light: Sender<ChunkTask>,
    job_tx_bg: Sender<ChunkTask>,
    res_rx: Receiver<TaskOutcome>,
    _io_pool: Option<Arc<ThreadPool>>,
    light_pool: Option<Arc<ThreadPool>>,
    bg_pool: Option<Arc<ThreadPool>>,
    io: Arc<LaneCounters>,
    light: Arc<LaneCounters>,
    bg: Arc<LaneCounters>,
    outstanding: AtomicUsize,
    signal: Arc<CompletionSignal>,
    pub w_io: usize,
    pub w_light: usize,
    pub w_bg: usize,
}

impl WorkerPool {
    pub fn new(
        (w_io, w_light, w_bg): (usize, usize, usize),
        env: Arc<TaskEnv>,
        signal: Arc<CompletionSignal>,
    ) -> Result<Self, ThreadPoolBuildError> {
        let (job_tx_io, job_rx_io) = unbounded::<ChunkTask>();
        let (job_tx_light, job_rx_light) = unbounded::<ChunkTask>();
        let (job_tx_bg, job_rx_bg) = unbounded::<ChunkTask>();
        let (res_tx, res_rx) = unbounded::<TaskOutcome>();
        let w_io = w_io.max(1);
        let ctx = WorkerCtx {
            env,
            tx: res_tx,
            signal: Arc::clone(&signal),
        };
        let io = Arc::new(LaneCounters::default());
        let light = Arc::new(LaneCounters::default());
        let bg = Arc::new(LaneCounters::default());

        let io_pool = {
            let pool = Arc::new(
                ThreadPoolBuilder::new()
                    .num_threads(w_io)
                    .thread_name(|i| format!("geist-io-{i}"))
                    .build()?,
            );
            for _ in 0..w_io {
                let rx = job_rx_io.clone();
                let ctx = ctx.clone();
                let io = Arc::clone(&io);
                pool.spawn(move || {
                    while let Ok(task) = rx.recv() {
                        ctx.process(task, &io);
                    }
                });
            }
            Some(pool)
        };

        let light_pool = if w_light > 0 {
            let pool = Arc::new(
                ThreadPoolBuilder::new()
                    .num_threads(w_light)
                    .thread_name(|i| format!("geist-light-{i}"))
                    .build()?,
            );
            for _ in 0..w_light {
                let rx = job_rx_light.clone();
                let ctx = ctx.clone();
                let light = Arc::clone(&light);
                pool.spawn(move || {
                    while let Ok(task) = rx.recv() {
                        ctx.process(task, &light);
                    }
                });
            }
            Some(pool)
        } else {
            None
        };

        let bg_pool = if w_bg > 0 {
            let pool = Arc::new(
                ThreadPoolBuilder::new()
                    .num_threads(w_bg)
                    .thread_name(|i| format!("geist-bg-{i}"))
                    .build()?,
            );
            for _ in 0..w_bg {
                let bg_rx = job_rx_bg.clone();
                let light_rx = job_rx_light.clone();
                let ctx = ctx.clone();
                let bg = Arc::clone(&bg);
                let light = Arc::clone(&light);
                pool.spawn(move || bg_loop(&ctx, &bg_rx, &light_rx, &bg, &light));
            }
            Some(pool)
        } else {
            None
        };

        log::info!(
            target: "workers",
            "worker lanes io={} light={} bg={}",
            w_io,
            w_light,
            w_bg
        );
        Ok(Self {
            job_tx_io,
            job_tx_light,
            job_tx_bg,
            res_rx,
            _io_pool: io_pool,
            light_pool,
            bg_pool,
            io,
            light,
            bg,
            outstanding: AtomicUsize::new(0),
            signal,
            w_io,
            w_light,
            w_bg,
        })
    }

    fn send(&self, lane: Lane, task: ChunkTask) {
        let (tx, counters) = match lane {
            Lane::Io => (&self.job_tx_io, &self.io),
            Lane::Light => (&self.job_tx_light, &self.light),
            Lane::Bg => (&self.job_tx_bg, &self.bg),
        };
        counters.queued.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = tx.send(task) {
            counters.queued.fetch_sub(1, Ordering::Relaxed);
            self.outstanding.fetch_sub(1, Ordering::Relaxed);
            log::warn!(target: "workers", "lane {:?} closed, dropping {:?}", lane, e.0);
        }
    }

    /// `(queued, inflight)` for io, light and bg lanes.
    pub fn queue_debug_counts(&self) -> [(usize, usize); 3] {
        [&self.io, &self.light, &self.bg].map(|c| {
            (
                c.queued.load(Ordering::Relaxed),
                c.inflight.load(Ordering::Relaxed),
            )
        })
    }
}

fn bg_loop(
    ctx: &WorkerCtx,
    bg_rx: &Receiver<ChunkTask>,
    light_rx: &Receiver<ChunkTask>,
    bg: &LaneCounters,
    light: &LaneCounters,
) {
    loop {
        match bg_rx.try_recv() {
            Ok(task) => {
                ctx.process(task, bg);
                continue;
            }
            Err(TryRecvError::Disconnected) => {
                while let Ok(task) = light_rx.recv() {
                    ctx.process(task, light);
                }
                break;
            }
            Err(TryRecvError::Empty) => {}
        }

        match light_rx.try_recv() {
            Ok(task) => {
                ctx.process(task, light);
                continue;
            }
            Err(TryRecvError::Disconnected) => match bg_rx.recv() {
                Ok(task) => {
                    ctx.process(task, bg);
                    continue;
                }
                Err(_) => break,
            },
            Err(TryRecvError::Empty) => {}
        }

        select! {
            recv(bg_rx) -> res => match res {
                Ok(task) => ctx.process(task, bg),
                Err(_) => {
                    while let Ok(task) = light_rx.recv() {
                        ctx.process(task, light);
                    }
                    break;
                }
            },
            recv(light_rx) -> res => {
                if let Ok(task) = res {
                    ctx.process(task, light);
                }
            },
        }
    }
}

impl TaskExecutor for WorkerPool {
    fn submit(&self, task: ChunkTask) {
        self.outstanding.fetch_add(1, Ordering::Relaxed);
        let lane = match Lane::for_kind(task.kind()) {
            Lane::Light if self.light_pool.is_none() && self.bg_pool.is_some() => Lane::Bg,
            Lane::Light if self.light_pool.is_none() => Lane::Io,
            Lane::Bg if self.bg_pool.is_none() => Lane::Io,
            lane => lane,
        };
        log::trace!(target: "workers", "submit {:?} -> {:?}", task.ticket, lane);
        self.send(lane, task);
    }

    fn drain(&self) -> Vec<TaskOutcome> {
        let out: Vec<TaskOutcome> = self.res_rx.try_iter().collect();
        self.outstanding.fetch_sub(out.len(), Ordering::Relaxed);
        out
    }

    fn signal(&self) -> &Arc<CompletionSignal> {
        &self.signal
    }

    fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }
}

/// Runs each task to completion inside `submit`. Deterministic; used by
/// tests and single-threaded tools.
pub struct InlineExecutor {
    env: Arc<TaskEnv>,
    done: Mutex<Vec<TaskOutcome>>,
    signal: Arc<CompletionSignal>,
}

impl InlineExecutor {
    pub fn new(env: Arc<TaskEnv>) -> Self {
        Self {
            env,
            done: Mutex::new(Vec::new()),
            signal: Arc::new(CompletionSignal::new()),
        }
    }
}

impl TaskExecutor for InlineExecutor {
    fn submit(&self, task: ChunkTask) {
        let out = run_task(task, &self.env);
        self.done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(out);
        self.signal.notify();
    }

    fn drain(&self) -> Vec<TaskOutcome> {
        std::mem::take(&mut *self.done.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn signal(&self) -> &Arc<CompletionSignal> {
        &self.signal
    }

    fn outstanding(&self) -> usize {
        self.done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Holds submitted tasks until the caller runs them, so completion order can
/// be forced against other world operations.
pub struct ManualExecutor {
    env: Arc<TaskEnv>,
    pending: Mutex<VecDeque<ChunkTask>>,
    done: Mutex<Vec<TaskOutcome>>,
    signal: Arc<CompletionSignal>,
}

impl ManualExecutor {
    pub fn new(env: Arc<TaskEnv>) -> Self {
        Self {
            env,
            pending: Mutex::new(VecDeque::new()),
            done: Mutex::new(Vec::new()),
            signal: Arc::new(CompletionSignal::new()),
        }
    }

    pub fn pending(&self) -> Vec<(TaskKind, geist_world::ChunkCoord)> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|t| (t.kind(), t.ticket.chunk().coord()))
            .collect()
    }

    /// Run the oldest held task. Returns false if none was held.
    pub fn run_next(&self) -> bool {
        let task = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let Some(task) = task else {
            return false;
        };
        let out = run_task(task, &self.env);
        self.done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(out);
        self.signal.notify();
        true
    }

    pub fn run_all(&self) -> usize {
        let mut n = 0;
        while self.run_next() {
            n += 1;
        }
        n
    }
}

impl TaskExecutor for ManualExecutor {
    fn submit(&self, task: ChunkTask) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(task);
    }

    fn drain(&self) -> Vec<TaskOutcome> {
        std::mem::take(&mut *self.done.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn signal(&self) -> &Arc<CompletionSignal> {
        &self.signal
    }

    fn outstanding(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
            + self
                .done
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
    }
}
