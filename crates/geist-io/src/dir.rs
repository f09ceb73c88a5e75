use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use geist_world::{ChunkCoord, WorldError};

use crate::{ChunkStore, VoxelBuffer};

/// One file per chunk under a save directory, replaced atomically on save.
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        log::info!(target: "io", "chunk store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, c: ChunkCoord) -> PathBuf {
        self.root.join(format!("c.{}.{}.{}.bin", c.cx, c.cy, c.cz))
    }
}

impl ChunkStore for DirStore {
    fn load(&self, coord: ChunkCoord) -> Result<Option<VoxelBuffer>, WorldError> {
        let path = self.path_for(coord);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(WorldError::TransientIo { coord, source }),
        };
        VoxelBuffer::decode(&bytes, coord).map(Some)
    }

    fn save(&self, coord: ChunkCoord, buf: &VoxelBuffer) -> Result<(), WorldError> {
        let bytes = buf.encode(coord)?;
        let path = self.path_for(coord);
        let tmp = path.with_extension("bin.tmp");
        let write = || -> io::Result<()> {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&bytes)?;
            f.sync_all()?;
            fs::rename(&tmp, &path)
        };
        write().map_err(|source| {
            let _ = fs::remove_file(&tmp);
            WorldError::TransientIo { coord, source }
        })?;
        log::trace!(target: "io", "saved {} ({} bytes)", coord, bytes.len());
        Ok(())
    }
}
