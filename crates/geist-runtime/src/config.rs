use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Worker counts per lane; 0 picks from `available_parallelism`.
    #[serde(default)]
    pub io_workers: usize,
    #[serde(default)]
    pub light_workers: usize,
    #[serde(default)]
    pub bg_workers: usize,
    /// Horizontal view radius in chunks.
    #[serde(default = "default_view_radius")]
    pub view_radius: i32,
    #[serde(default = "default_vertical_radius")]
    pub vertical_radius: i32,
    /// Tasks dispatched per tick.
    #[serde(default = "default_dispatch_budget")]
    pub dispatch_budget: usize,
    #[serde(default = "default_generation_retry_limit")]
    pub generation_retry_limit: u32,
    #[serde(default = "default_io_backoff_base_ms")]
    pub io_backoff_base_ms: u64,
    #[serde(default = "default_io_backoff_max_ms")]
    pub io_backoff_max_ms: u64,
    #[serde(default = "default_save_retry_limit")]
    pub save_retry_limit: u32,
    /// Free buffers kept per recycler; 0 sizes it from the view volume.
    #[serde(default)]
    pub recycler_max_free: usize,
}

fn default_view_radius() -> i32 {
    4
}
fn default_vertical_radius() -> i32 {
    2
}
fn default_dispatch_budget() -> usize {
    64
}
fn default_generation_retry_limit() -> u32 {
    3
}
fn default_io_backoff_base_ms() -> u64 {
    50
}
fn default_io_backoff_max_ms() -> u64 {
    2000
}
fn default_save_retry_limit() -> u32 {
    3
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            io_workers: 0,
            light_workers: 0,
            bg_workers: 0,
            view_radius: default_view_radius(),
            vertical_radius: default_vertical_radius(),
            dispatch_budget: default_dispatch_budget(),
            generation_retry_limit: default_generation_retry_limit(),
            io_backoff_base_ms: default_io_backoff_base_ms(),
            io_backoff_max_ms: default_io_backoff_max_ms(),
            save_retry_limit: default_save_retry_limit(),
            recycler_max_free: 0,
        }
    }
}

impl RuntimeConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: RuntimeConfig = toml::from_str(s)?;
        Ok(cfg)
    }

    /// `(io, light, bg)` worker counts with automatic lanes resolved.
    pub fn lane_workers(&self) -> (usize, usize, usize) {
        let total: usize = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8);
        let io = if self.io_workers > 0 { self.io_workers } else { 1 };
        let remaining = total.saturating_sub(io);
        let light = if self.light_workers > 0 {
            self.light_workers
        } else if remaining >= 2 {
            1
        } else {
            0
        };
        let bg = if self.bg_workers > 0 {
            self.bg_workers
        } else {
            remaining.saturating_sub(light).max(1)
        };
        (io, light, bg)
    }

    /// Chunks inside the view box.
    pub fn view_volume(&self) -> usize {
        let w = (2 * self.view_radius.max(0) + 1) as usize;
        let h = (2 * self.vertical_radius.max(0) + 1) as usize;
        w * w * h
    }

    /// Delay before retry number `attempt` (1-based) of a transient IO failure.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let ms = self
            .io_backoff_base_ms
            .saturating_mul(1u64 << shift)
            .min(self.io_backoff_max_ms);
        Duration::from_millis(ms)
    }
}
