use std::fmt;

use serde::{Deserialize, Serialize};

pub const CHUNK_SIZE: usize = 32;
pub const CHUNK_SIZE_I32: i32 = CHUNK_SIZE as i32;
pub const CHUNK_LAYER: usize = CHUNK_SIZE * CHUNK_SIZE;
pub const CHUNK_VOLUME: usize = CHUNK_LAYER * CHUNK_SIZE;

#[inline]
pub fn voxel_index(x: usize, y: usize, z: usize) -> usize {
    (y * CHUNK_SIZE + z) * CHUNK_SIZE + x
}

#[inline]
pub fn voxel_coords(index: usize) -> (usize, usize, usize) {
    let x = index % CHUNK_SIZE;
    let z = (index / CHUNK_SIZE) % CHUNK_SIZE;
    let y = index / CHUNK_LAYER;
    (x, y, z)
}

/// The six face directions; `index()` is stable and used for neighbor arrays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Face {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::PosX,
        Face::NegX,
        Face::PosY,
        Face::NegY,
        Face::PosZ,
        Face::NegZ,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn opposite(self) -> Face {
        match self {
            Face::PosX => Face::NegX,
            Face::NegX => Face::PosX,
            Face::PosY => Face::NegY,
            Face::NegY => Face::PosY,
            Face::PosZ => Face::NegZ,
            Face::NegZ => Face::PosZ,
        }
    }

    #[inline]
    pub fn offset(self) -> (i32, i32, i32) {
        match self {
            Face::PosX => (1, 0, 0),
            Face::NegX => (-1, 0, 0),
            Face::PosY => (0, 1, 0),
            Face::NegY => (0, -1, 0),
            Face::PosZ => (0, 0, 1),
            Face::NegZ => (0, 0, -1),
        }
    }

    /// Step from `index` one voxel towards this face. `None` when the step leaves the chunk.
    #[inline]
    pub fn step(self, index: usize) -> Option<usize> {
        let (x, y, z) = voxel_coords(index);
        let last = CHUNK_SIZE - 1;
        match self {
            Face::PosX if x < last => Some(index + 1),
            Face::NegX if x > 0 => Some(index - 1),
            Face::PosY if y < last => Some(index + CHUNK_LAYER),
            Face::NegY if y > 0 => Some(index - CHUNK_LAYER),
            Face::PosZ if z < last => Some(index + CHUNK_SIZE),
            Face::NegZ if z > 0 => Some(index - CHUNK_SIZE),
            _ => None,
        }
    }

    /// Index of the voxel just across this face, inside the adjacent chunk.
    #[inline]
    pub fn wrap(self, index: usize) -> usize {
        let (x, y, z) = voxel_coords(index);
        let last = CHUNK_SIZE - 1;
        match self {
            Face::PosX => voxel_index(0, y, z),
            Face::NegX => voxel_index(last, y, z),
            Face::PosY => voxel_index(x, 0, z),
            Face::NegY => voxel_index(x, last, z),
            Face::PosZ => voxel_index(x, y, 0),
            Face::NegZ => voxel_index(x, y, last),
        }
    }

    /// Indices of the voxel plane lying on this face of a chunk.
    pub fn plane(self) -> impl Iterator<Item = usize> {
        let last = CHUNK_SIZE - 1;
        (0..CHUNK_LAYER).map(move |i| {
            let a = i % CHUNK_SIZE;
            let b = i / CHUNK_SIZE;
            match self {
                Face::PosX => voxel_index(last, b, a),
                Face::NegX => voxel_index(0, b, a),
                Face::PosY => voxel_index(a, last, b),
                Face::NegY => voxel_index(a, 0, b),
                Face::PosZ => voxel_index(a, b, last),
                Face::NegZ => voxel_index(a, b, 0),
            }
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cy: i32,
    pub cz: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(cx: i32, cy: i32, cz: i32) -> Self {
        Self { cx, cy, cz }
    }

    #[inline]
    pub fn with_y(self, cy: i32) -> Self {
        Self { cy, ..self }
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            cx: self.cx + dx,
            cy: self.cy + dy,
            cz: self.cz + dz,
        }
    }

    #[inline]
    pub fn neighbor(self, face: Face) -> Self {
        let (dx, dy, dz) = face.offset();
        self.offset(dx, dy, dz)
    }

    #[inline]
    pub fn column(self) -> ColumnCoord {
        ColumnCoord {
            cx: self.cx,
            cz: self.cz,
        }
    }

    #[inline]
    pub fn distance_sq(self, other: ChunkCoord) -> i64 {
        let dx = i64::from(self.cx - other.cx);
        let dy = i64::from(self.cy - other.cy);
        let dz = i64::from(self.cz - other.cz);
        dx * dx + dy * dy + dz * dz
    }

    /// World-space position of voxel (0, 0, 0).
    #[inline]
    pub fn origin(self) -> (i32, i32, i32) {
        (
            self.cx * CHUNK_SIZE_I32,
            self.cy * CHUNK_SIZE_I32,
            self.cz * CHUNK_SIZE_I32,
        )
    }

    #[inline]
    pub fn from_world(wx: i32, wy: i32, wz: i32) -> Self {
        Self::new(
            wx.div_euclid(CHUNK_SIZE_I32),
            wy.div_euclid(CHUNK_SIZE_I32),
            wz.div_euclid(CHUNK_SIZE_I32),
        )
    }

    /// Voxel index of a world position inside its owning chunk.
    #[inline]
    pub fn local_index(wx: i32, wy: i32, wz: i32) -> usize {
        voxel_index(
            wx.rem_euclid(CHUNK_SIZE_I32) as usize,
            wy.rem_euclid(CHUNK_SIZE_I32) as usize,
            wz.rem_euclid(CHUNK_SIZE_I32) as usize,
        )
    }
}

impl From<(i32, i32, i32)> for ChunkCoord {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

impl From<ChunkCoord> for (i32, i32, i32) {
    fn from(value: ChunkCoord) -> Self {
        (value.cx, value.cy, value.cz)
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.cx, self.cy, self.cz)
    }
}

/// An (x, z) column of vertically stacked chunks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnCoord {
    pub cx: i32,
    pub cz: i32,
}
