use geist_blocks::{BlockId, BlockRegistry};
use geist_chunk::MeshReader;
use geist_world::{CHUNK_VOLUME, ChunkCoord, Face};

/// Summary of a built chunk mesh. Geometry itself stays with the mesher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkMesh {
    pub coord: ChunkCoord,
    pub water: bool,
    pub quads: u32,
    /// Sum of the brightest light component over every emitted face.
    pub light_sum: u64,
}

/// Builds geometry from finalized chunk data. Never mutates the chunk.
pub trait ChunkMesher: Send + Sync {
    fn build(&self, view: &dyn MeshReader, water: bool) -> ChunkMesh;
}

/// Emits one quad per exposed block face. Faces on the chunk boundary are
/// always emitted; seams are resolved by the renderer.
pub struct FaceCountMesher {
    occluder: Vec<bool>,
    visible: Vec<bool>,
    liquid: Vec<bool>,
}

impl FaceCountMesher {
    pub fn new(reg: &BlockRegistry) -> Self {
        let span = reg.id_span();
        let mut occluder = vec![false; span];
        let mut visible = vec![false; span];
        let mut liquid = vec![false; span];
        for ty in reg.iter() {
            let i = ty.id as usize;
            occluder[i] = ty.solid && ty.blocks_sunlight;
            visible[i] = ty.solid && !ty.liquid;
            liquid[i] = ty.liquid;
        }
        Self {
            occluder,
            visible,
            liquid,
        }
    }

    #[inline]
    fn flag(table: &[bool], id: BlockId) -> bool {
        table.get(id as usize).copied().unwrap_or(false)
    }

    #[inline]
    fn brightness(view: &dyn MeshReader, index: usize) -> u8 {
        let lamp = view.lamp(index);
        view.sunlight(index).max(lamp.r()).max(lamp.g()).max(lamp.b())
    }
}

impl ChunkMesher for FaceCountMesher {
    fn build(&self, view: &dyn MeshReader, water: bool) -> ChunkMesh {
        let mut mesh = ChunkMesh {
            coord: view.coord(),
            water,
            ..ChunkMesh::default()
        };
        for i in 0..CHUNK_VOLUME {
            let here = view.block(i);
            let emits = if water {
                Self::flag(&self.liquid, here)
            } else {
                Self::flag(&self.visible, here)
            };
            if !emits {
                continue;
            }
            for face in Face::ALL {
                let (hidden, lit) = match face.step(i) {
                    Some(j) => {
                        let nb = view.block(j);
                        let hidden = Self::flag(&self.occluder, nb)
                            || (water && Self::flag(&self.liquid, nb));
                        (hidden, Self::brightness(view, j))
                    }
                    None => (false, Self::brightness(view, i)),
                };
                if hidden {
                    continue;
                }
                mesh.quads += 1;
                mesh.light_sum += u64::from(lit);
            }
        }
        mesh
    }
}
