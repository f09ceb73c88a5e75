//! Chunk coordinates, column height data, terrain generation, and the world error taxonomy.
#![forbid(unsafe_code)]

pub mod column;
pub mod coord;
pub mod error;
pub mod generation;
pub mod worldgen;

pub use column::{Biome, ColumnHeights, HeightData, UNLOADED_HEIGHT};
pub use coord::{
    CHUNK_LAYER, CHUNK_SIZE, CHUNK_SIZE_I32, CHUNK_VOLUME, ChunkCoord, ColumnCoord, Face,
    voxel_coords, voxel_index,
};
pub use error::WorldError;
pub use generation::{
    FlatGenerator, FloraPlacement, GenLevel, GeneratedChunk, NoiseGenerator, TerrainGenerator,
};
pub use worldgen::{WorldGenConfig, WorldGenMode};
