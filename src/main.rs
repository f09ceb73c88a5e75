#![forbid(unsafe_code)]

mod config;

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use geist_blocks::{AIR, BlockId, BlockRegistry};
use geist_chunk::ChunkState;
use geist_io::{ChunkStore, DirStore, MemoryStore};
use geist_runtime::{
    ChunkWorld, CompletionSignal, TaskExecutor, WorkerPool, WorldContext, WorldEvent, WorldStats,
};
use geist_world::{CHUNK_SIZE_I32, ChunkCoord, WorldGenMode};

use crate::config::SessionConfig;

#[derive(Parser, Debug)]
#[command(name = "geist-voxels", version, about = "Headless voxel chunk streaming session")]
struct Args {
    /// Session TOML with optional [world] and [runtime] tables
    #[arg(long)]
    config: Option<PathBuf>,
    /// Horizontal view radius in chunks
    #[arg(long)]
    radius: Option<i32>,
    #[arg(long, default_value_t = 400)]
    ticks: u32,
    #[arg(long)]
    seed: Option<i32>,
    /// Use the flat generator at this surface height
    #[arg(long)]
    flat_height: Option<i32>,
    /// Persist chunks under this directory instead of in memory
    #[arg(long)]
    save_dir: Option<PathBuf>,
    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log: String,
}

const CAMERA_CY: i32 = 2;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log))
        .format_timestamp_millis()
        .init();
    if let Err(e) = run(args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn session_config(args: &Args) -> Result<SessionConfig, Box<dyn Error>> {
    let mut cfg = match &args.config {
        Some(path) => SessionConfig::load_from_path(path)?,
        None => SessionConfig::default(),
    };
    if let Some(r) = args.radius {
        cfg.runtime.view_radius = r;
    }
    if let Some(seed) = args.seed {
        cfg.world.seed = seed;
    }
    if let Some(h) = args.flat_height {
        cfg.world.mode = WorldGenMode::Flat;
        cfg.world.flat.height = h;
    }
    if args.save_dir.is_some() {
        cfg.save_dir = args.save_dir.clone();
    }
    Ok(cfg)
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let cfg = session_config(&args)?;
    let registry = Arc::new(match &cfg.blocks {
        Some(path) => BlockRegistry::load_from_path(path)?,
        None => BlockRegistry::builtin(),
    });
    log::info!("block registry: {} types", registry.len());
    let generator = cfg.world.build_generator(&registry)?;
    let store: Arc<dyn ChunkStore> = match &cfg.save_dir {
        Some(dir) => {
            let store = DirStore::open(dir)?;
            log::info!(target: "io", "saving chunks under {}", store.root().display());
            Arc::new(store)
        }
        None => Arc::new(MemoryStore::new()),
    };

    let lanes = cfg.runtime.lane_workers();
    let ctx = WorldContext::new(Arc::clone(&registry), cfg.runtime.clone())?;
    let env = Arc::new(ctx.task_env(generator, store));
    let pool = Arc::new(WorkerPool::new(lanes, env, Arc::new(CompletionSignal::new()))?);
    log::info!(
        target: "workers",
        "lanes io={} light={} bg={}",
        lanes.0,
        lanes.1,
        lanes.2
    );
    let mut world = ChunkWorld::new(ctx, pool.clone());

    let ticks = args.ticks.max(1);
    let step_every = (ticks / 4).max(1);
    let lamp = registry.id_by_name("lamp");
    let mut lamp_at: Option<(i32, i32, i32)> = None;
    let mut drawable = 0usize;
    let mut center = None;
    let started = Instant::now();

    for i in 0..ticks {
        let c = ChunkCoord::new((i / step_every) as i32, CAMERA_CY, 0);
        if center != Some(c) {
            world.update_view(c);
            center = Some(c);
        }
        let seen = pool.signal().count();
        world.tick();
        drawable += handle_events(&mut world);

        if i == ticks / 2 {
            match lamp {
                Some(id) => lamp_at = place_lamp(&mut world, c, id),
                None => log::warn!(target: "light", "palette has no 'lamp'; skipping edit"),
            }
        }
        if i == ticks * 3 / 4 {
            if let Some((x, y, z)) = lamp_at.take() {
                world.set_block(x, y, z, AIR);
                log::info!(
                    target: "light",
                    "lamp removed at ({},{},{}); light beside it now {:?}",
                    x,
                    y,
                    z,
                    world.light_at(x + 1, y, z)
                );
            }
        }
        if (i + 1) % step_every == 0 {
            report(&world.stats(), drawable);
        }
        pool.signal().wait_past(seen, Duration::from_millis(2));
    }
    log::info!(
        "streamed {} ticks in {:.1}s",
        ticks,
        started.elapsed().as_secs_f32()
    );

    let summary = world.save_all(SHUTDOWN_TIMEOUT);
    let evicted = world.evict_all();
    let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
    while world.pending_evictions() > 0 && Instant::now() < deadline {
        let seen = pool.signal().count();
        world.tick();
        handle_events(&mut world);
        pool.signal().wait_past(seen, Duration::from_millis(5));
    }
    let stats = world.stats();
    report(&stats, drawable);
    log::info!(
        "shutdown: saved={} failed={} evicted={} left={}",
        summary.saved,
        summary.failed,
        evicted,
        world.pending_evictions()
    );
    if world.pending_evictions() > 0 {
        return Err(format!("{} chunks never finished evicting", world.pending_evictions()).into());
    }
    Ok(())
}

/// Logs problem events and returns how many chunks became drawable.
fn handle_events(world: &mut ChunkWorld) -> usize {
    let mut drawable = 0;
    for ev in world.drain_events() {
        match ev {
            WorldEvent::ChunkDrawable { .. } => drawable += 1,
            WorldEvent::SaveFailed {
                coord,
                attempt,
                reason,
            } => log::warn!(target: "io", "save {:?} attempt {} failed: {}", coord, attempt, reason),
            WorldEvent::SaveAbandoned { coord } => {
                log::error!(target: "io", "gave up saving {:?}", coord)
            }
            WorldEvent::ChunkStuck { coord, reason } => {
                log::error!(target: "scheduler", "chunk {:?} stuck: {}", coord, reason)
            }
            WorldEvent::ChunkEvicted { .. } => {}
        }
    }
    drawable
}

/// Puts a lamp on the first air cell above the terrain in the middle of
/// `center`'s column.
fn place_lamp(world: &mut ChunkWorld, center: ChunkCoord, lamp: BlockId) -> Option<(i32, i32, i32)> {
    let x = center.cx * CHUNK_SIZE_I32 + CHUNK_SIZE_I32 / 2;
    let z = center.cz * CHUNK_SIZE_I32 + CHUNK_SIZE_I32 / 2;
    let vr = world.context().config.vertical_radius;
    let top = (center.cy + vr + 1) * CHUNK_SIZE_I32 - 2;
    let bottom = (center.cy - vr) * CHUNK_SIZE_I32;
    let surface = (bottom..=top)
        .rev()
        .find(|&y| matches!(world.block_at(x, y, z), Some(id) if id != AIR))?;
    let y = surface + 1;
    if world.block_at(x, y, z) != Some(AIR) {
        return None;
    }
    world.set_block(x, y, z, lamp);
    log::info!(
        target: "light",
        "lamp placed at ({},{},{}); light beside it {:?}",
        x,
        y,
        z,
        world.light_at(x + 1, y, z)
    );
    Some((x, y, z))
}

fn report(stats: &WorldStats, drawable: usize) {
    let states: Vec<String> = stats
        .states
        .iter()
        .enumerate()
        .filter(|&(_, &n)| n > 0)
        .map(|(i, n)| format!("{:?}={}", ChunkState::from_u8(i as u8), n))
        .collect();
    log::info!(
        target: "scheduler",
        "chunks={} columns={} drawable={} pending={} delayed={} parked={} tasks={} evicting={} [{}]",
        stats.chunks,
        stats.columns,
        drawable,
        stats.pending,
        stats.delayed,
        stats.parked,
        stats.outstanding_tasks,
        stats.evicting,
        states.join(" ")
    );
    log::info!(
        target: "storage",
        "recyclers shorts {}/{} recycled ({} fallback, {} free) bytes {}/{} recycled ({} free)",
        stats.shorts.recycled,
        stats.shorts.checkouts,
        stats.shorts.fallback_allocations,
        stats.shorts.free,
        stats.bytes.recycled,
        stats.bytes.checkouts,
        stats.bytes.free
    );
    log::info!(
        target: "light",
        "messages delivered={} dropped={} saves ok={} failed={}",
        stats.light_delivered,
        stats.light_dropped,
        stats.saves_ok,
        stats.saves_failed
    );
}
