use geist_blocks::BlockId;
use geist_world::{CHUNK_VOLUME, ChunkCoord, GenLevel, WorldError};
use serde::{Deserialize, Serialize};

/// Persisted channels of one chunk. Light is recomputed after load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoxelBuffer {
    pub blocks: Vec<BlockId>,
    /// Empty means all zero.
    pub tertiary: Vec<u16>,
    pub gen_level: GenLevel,
}

const MAGIC: u32 = 0x4745_4348;
const VERSION: u16 = 1;

#[derive(Serialize, Deserialize)]
struct SavedChunk {
    magic: u32,
    version: u16,
    coord: ChunkCoord,
    gen_level: GenLevel,
    blocks: Vec<(u16, u32)>,
    tertiary: Vec<(u16, u32)>,
}

fn encode_runs(values: &[u16]) -> Vec<(u16, u32)> {
    let mut runs: Vec<(u16, u32)> = Vec::new();
    for &v in values {
        match runs.last_mut() {
            Some((last, n)) if *last == v => *n += 1,
            _ => runs.push((v, 1)),
        }
    }
    runs
}

fn decode_runs(runs: &[(u16, u32)], coord: ChunkCoord) -> Result<Vec<u16>, WorldError> {
    let total: u64 = runs.iter().map(|(_, n)| u64::from(*n)).sum();
    if total != 0 && total != CHUNK_VOLUME as u64 {
        return Err(WorldError::Corrupt {
            coord,
            reason: format!("run lengths cover {total} voxels"),
        });
    }
    let mut out = Vec::with_capacity(total as usize);
    for &(v, n) in runs {
        out.extend(std::iter::repeat_n(v, n as usize));
    }
    Ok(out)
}

impl VoxelBuffer {
    pub(crate) fn encode(&self, coord: ChunkCoord) -> Result<Vec<u8>, WorldError> {
        if self.blocks.len() != CHUNK_VOLUME {
            return Err(WorldError::Corrupt {
                coord,
                reason: format!("refusing to save {} block ids", self.blocks.len()),
            });
        }
        let saved = SavedChunk {
            magic: MAGIC,
            version: VERSION,
            coord,
            gen_level: self.gen_level,
            blocks: encode_runs(&self.blocks),
            tertiary: encode_runs(&self.tertiary),
        };
        bincode::serialize(&saved).map_err(|e| WorldError::Corrupt {
            coord,
            reason: e.to_string(),
        })
    }

    pub(crate) fn decode(bytes: &[u8], coord: ChunkCoord) -> Result<Self, WorldError> {
        let saved: SavedChunk = bincode::deserialize(bytes).map_err(|e| WorldError::Corrupt {
            coord,
            reason: e.to_string(),
        })?;
        if saved.magic != MAGIC || saved.version != VERSION {
            return Err(WorldError::Corrupt {
                coord,
                reason: format!("bad header {:#x} v{}", saved.magic, saved.version),
            });
        }
        if saved.coord != coord {
            return Err(WorldError::Corrupt {
                coord,
                reason: format!("file holds chunk {}", saved.coord),
            });
        }
        let blocks = decode_runs(&saved.blocks, coord)?;
        if blocks.len() != CHUNK_VOLUME {
            return Err(WorldError::Corrupt {
                coord,
                reason: "missing block ids".into(),
            });
        }
        Ok(Self {
            blocks,
            tertiary: decode_runs(&saved.tertiary, coord)?,
            gen_level: saved.gen_level,
        })
    }
}
