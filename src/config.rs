use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use geist_runtime::RuntimeConfig;
use geist_world::WorldGenConfig;

/// Everything one headless session reads from its TOML file. Every table is
/// optional; missing keys fall back to the per-crate defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub world: WorldGenConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Block palette file; the builtin palette when absent.
    #[serde(default)]
    pub blocks: Option<PathBuf>,
    /// Directory for saved chunks; saves stay in memory when absent.
    #[serde(default)]
    pub save_dir: Option<PathBuf>,
}

impl SessionConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: SessionConfig = toml::from_str(s)?;
        Ok(cfg)
    }
}
