//! Chunk lifecycle scheduling, worker lanes, and the world that owns them.
#![forbid(unsafe_code)]

pub mod config;
pub mod event;
pub mod mesh;
pub mod scheduler;
pub mod task;
pub mod workers;
pub mod world;

pub use config::RuntimeConfig;
pub use event::WorldEvent;
pub use mesh::{ChunkMesh, ChunkMesher, FaceCountMesher};
pub use scheduler::ChunkScheduler;
pub use task::{
    ChunkTask, CompletionSignal, LoadedChunk, TaskEnv, TaskOutcome, TaskResult, run_task,
};
pub use workers::{InlineExecutor, Lane, ManualExecutor, TaskExecutor, WorkerPool};
pub use world::{ChunkWorld, SaveSummary, TickReport, WorldContext, WorldStats};
