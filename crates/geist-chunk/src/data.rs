use geist_blocks::BlockId;
use geist_storage::{VoxelColumnStore, VoxelRecyclers};
use geist_world::{CHUNK_VOLUME, ChunkCoord};

use crate::light::{LampColor, LightComponent, LightQueues};

/// Voxel channels plus pending light work. Lives behind the chunk's data lock.
pub struct ChunkData {
    blocks: VoxelColumnStore<u16>,
    sunlight: VoxelColumnStore<u8>,
    lamp: VoxelColumnStore<u16>,
    tertiary: VoxelColumnStore<u16>,
    queues: LightQueues,
}

impl ChunkData {
    pub fn new(recyclers: &VoxelRecyclers) -> Self {
        Self {
            blocks: VoxelColumnStore::new(recyclers.shorts.clone(), 0),
            sunlight: VoxelColumnStore::new(recyclers.bytes.clone(), 0),
            lamp: VoxelColumnStore::new(recyclers.shorts.clone(), 0),
            tertiary: VoxelColumnStore::new(recyclers.shorts.clone(), 0),
            queues: LightQueues::default(),
        }
    }

    #[inline]
    pub fn block(&self, index: usize) -> BlockId {
        self.blocks.get(index)
    }

    #[inline]
    pub fn set_block(&mut self, index: usize, id: BlockId) {
        self.blocks.set(index, id);
    }

    #[inline]
    pub fn tertiary(&self, index: usize) -> u16 {
        self.tertiary.get(index)
    }

    #[inline]
    pub fn set_tertiary(&mut self, index: usize, v: u16) {
        self.tertiary.set(index, v);
    }

    #[inline]
    pub fn sunlight(&self, index: usize) -> u8 {
        self.sunlight.get(index)
    }

    #[inline]
    pub fn lamp(&self, index: usize) -> LampColor {
        LampColor(self.lamp.get(index))
    }

    #[inline]
    pub fn light(&self, index: usize, c: LightComponent) -> u8 {
        match c {
            LightComponent::Sun => self.sunlight.get(index),
            _ => self.lamp(index).get(c),
        }
    }

    #[inline]
    pub fn set_light(&mut self, index: usize, c: LightComponent, level: u8) {
        match c {
            LightComponent::Sun => self.sunlight.set(index, level),
            _ => {
                let v = self.lamp(index).with(c, level);
                self.lamp.set(index, v.0);
            }
        }
    }

    #[inline]
    pub fn queues(&self) -> &LightQueues {
        &self.queues
    }

    #[inline]
    pub fn queues_mut(&mut self) -> &mut LightQueues {
        &mut self.queues
    }

    pub fn fill_blocks(&mut self, ids: &[BlockId]) {
        self.blocks.fill_from(ids);
    }

    pub fn fill_tertiary(&mut self, values: &[u16]) {
        self.tertiary.fill_from(values);
    }

    /// Drop all light values and queued light work.
    pub fn clear_light(&mut self) {
        self.sunlight.release();
        self.lamp.release();
        self.queues.clear();
    }

    pub fn blocks_vec(&self) -> Vec<BlockId> {
        self.blocks.to_vec()
    }

    pub fn tertiary_vec(&self) -> Vec<u16> {
        self.tertiary.to_vec()
    }

    pub fn any_block(&self, mut pred: impl FnMut(BlockId) -> bool) -> bool {
        match self.blocks.uniform_value() {
            Some(id) => pred(id),
            None => (0..CHUNK_VOLUME).any(|i| pred(self.blocks.get(i))),
        }
    }

    /// Collapse channels whose dense buffers hold one value. Returns how many collapsed.
    pub fn compact(&mut self) -> usize {
        [
            self.blocks.compact(),
            self.sunlight.compact(),
            self.lamp.compact(),
            self.tertiary.compact(),
        ]
        .into_iter()
        .filter(|c| *c)
        .count()
    }

    /// Hand every dense buffer back to its pool.
    pub fn release(&mut self) -> usize {
        self.queues.clear();
        [
            self.blocks.release(),
            self.sunlight.release(),
            self.lamp.release(),
            self.tertiary.release(),
        ]
        .into_iter()
        .filter(|c| *c)
        .count()
    }

    pub fn dense_channels(&self) -> usize {
        [
            self.blocks.is_dense(),
            self.sunlight.is_dense(),
            self.lamp.is_dense(),
            self.tertiary.is_dense(),
        ]
        .into_iter()
        .filter(|c| *c)
        .count()
    }

    pub fn snapshot(&self, coord: ChunkCoord) -> ChunkSnapshot {
        ChunkSnapshot {
            coord,
            blocks: self.blocks.to_vec(),
            sunlight: self.sunlight.to_vec(),
            lamp: self.lamp.to_vec(),
        }
    }
}

/// What the lighting kernel may touch on a chunk.
pub trait LightWriter {
    fn block(&self, index: usize) -> BlockId;
    fn light(&self, index: usize, c: LightComponent) -> u8;
    fn set_light(&mut self, index: usize, c: LightComponent, level: u8);
    fn queues_mut(&mut self) -> &mut LightQueues;
}

impl LightWriter for ChunkData {
    #[inline]
    fn block(&self, index: usize) -> BlockId {
        ChunkData::block(self, index)
    }

    #[inline]
    fn light(&self, index: usize, c: LightComponent) -> u8 {
        ChunkData::light(self, index, c)
    }

    #[inline]
    fn set_light(&mut self, index: usize, c: LightComponent, level: u8) {
        ChunkData::set_light(self, index, c, level)
    }

    #[inline]
    fn queues_mut(&mut self) -> &mut LightQueues {
        ChunkData::queues_mut(self)
    }
}

/// Read-only view handed to meshers.
pub trait MeshReader {
    fn coord(&self) -> ChunkCoord;
    fn block(&self, index: usize) -> BlockId;
    fn sunlight(&self, index: usize) -> u8;
    fn lamp(&self, index: usize) -> LampColor;
}

/// Dense copy of the mesh-visible channels, taken under the data lock.
#[derive(Clone, Debug)]
pub struct ChunkSnapshot {
    pub coord: ChunkCoord,
    blocks: Vec<BlockId>,
    sunlight: Vec<u8>,
    lamp: Vec<u16>,
}

impl MeshReader for ChunkSnapshot {
    fn coord(&self) -> ChunkCoord {
        self.coord
    }

    #[inline]
    fn block(&self, index: usize) -> BlockId {
        self.blocks[index]
    }

    #[inline]
    fn sunlight(&self, index: usize) -> u8 {
        self.sunlight[index]
    }

    #[inline]
    fn lamp(&self, index: usize) -> LampColor {
        LampColor(self.lamp[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geist_storage::SizeClass;

    #[test]
    fn channels_go_dense_independently() {
        let rec = VoxelRecyclers::new(SizeClass(CHUNK_VOLUME), 8);
        let mut d = ChunkData::new(&rec);
        d.set_light(10, LightComponent::Green, 9);
        assert_eq!(d.dense_channels(), 1);
        assert_eq!(d.lamp(10), LampColor::new(0, 9, 0));
        assert_eq!(d.light(10, LightComponent::Sun), 0);
        d.set_block(3, 4);
        assert_eq!(d.dense_channels(), 2);
        d.set_light(10, LightComponent::Green, 0);
        assert_eq!(d.compact(), 1);
        assert_eq!(d.release(), 1);
        assert_eq!(d.dense_channels(), 0);
        assert_eq!(rec.shorts.stats().free, 2);
    }
}
