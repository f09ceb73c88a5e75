//! Pooled voxel channel storage: fixed-size array recycling and copy-on-write columns.
#![forbid(unsafe_code)]

mod container;
mod recycler;

pub use container::{Voxel, VoxelColumnStore};
pub use recycler::{ArrayRecycler, RecyclerStats, SizeClass, VoxelRecyclers};
