//! Block ids, block properties, and the registry consumed by generation and lighting.
#![forbid(unsafe_code)]

pub mod config;
pub mod registry;
pub mod types;

pub use registry::BlockRegistry;
pub use types::{AIR, BlockId, BlockType};
