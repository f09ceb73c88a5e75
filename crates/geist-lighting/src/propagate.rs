use geist_blocks::BlockId;
use geist_chunk::{LightComponent, LightNode, LightWriter, MAX_LIGHT};
use geist_world::{CHUNK_SIZE, CHUNK_SIZE_I32, CHUNK_VOLUME, ChunkCoord, ColumnHeights, Face, voxel_index};

use crate::message::LightMessage;
use crate::table::LightTable;

/// Value that a voxel holding `level` passes one step along `travel` into a voxel of `block`.
///
/// Full sunlight falling straight down through an unattenuating medium stays full.
#[inline]
pub fn transmit(table: &LightTable, level: u8, travel: Face, c: LightComponent, block: BlockId) -> u8 {
    if level == 0 || !table.passable(block, c) {
        return 0;
    }
    let att = table.attenuation(block);
    if c == LightComponent::Sun && travel == Face::NegY && level == MAX_LIGHT && att <= 1 {
        return MAX_LIGHT;
    }
    level.saturating_sub(att)
}

#[derive(Debug, Default)]
pub struct Propagation {
    pub messages: Vec<LightMessage>,
    pub writes: usize,
}

#[inline]
fn push_add<W: LightWriter + ?Sized>(w: &mut W, c: LightComponent, index: usize) {
    w.queues_mut().channel_mut(c).add.push_back(LightNode {
        index: index as u32,
        level: 0,
    });
}

#[inline]
fn push_remove<W: LightWriter + ?Sized>(w: &mut W, c: LightComponent, index: usize, level: u8) {
    w.queues_mut().channel_mut(c).remove.push_back(LightNode {
        index: index as u32,
        level,
    });
}

/// Raise voxel `n` from a neighbor holding `level`, queueing it on success.
fn add_into<W: LightWriter + ?Sized>(
    w: &mut W,
    table: &LightTable,
    c: LightComponent,
    n: usize,
    level: u8,
    travel: Face,
) -> bool {
    let cand = transmit(table, level, travel, c, w.block(n));
    if cand > w.light(n, c) {
        w.set_light(n, c, cand);
        push_add(w, c, n);
        true
    } else {
        false
    }
}

/// Retract light that voxel `n` may have received from a neighbor that held `old`.
fn remove_into<W: LightWriter + ?Sized>(
    w: &mut W,
    table: &LightTable,
    c: LightComponent,
    n: usize,
    old: u8,
    travel: Face,
) -> bool {
    let v = w.light(n, c);
    if v == 0 {
        return false;
    }
    let emission = table.emission(w.block(n), c);
    let sky_column = c == LightComponent::Sun && travel == Face::NegY && old == MAX_LIGHT && v == MAX_LIGHT;
    if sky_column || v < old {
        if emission > 0 {
            // Sources keep their own emission and re-spread it after the removal drains.
            w.set_light(n, c, emission);
            push_remove(w, c, n, v);
            push_add(w, c, n);
        } else {
            w.set_light(n, c, 0);
            push_remove(w, c, n, v);
        }
        true
    } else {
        push_add(w, c, n);
        false
    }
}

/// Drain the chunk's queues to a local fixed point. Removals of a component
/// are drained before its additions; work leaving the chunk becomes messages.
pub fn propagate<W: LightWriter + ?Sized>(w: &mut W, table: &LightTable, coord: ChunkCoord) -> Propagation {
    let mut out = Propagation::default();
    for c in LightComponent::ALL {
        while let Some(node) = w.queues_mut().channel_mut(c).remove.pop_front() {
            let i = node.index as usize;
            for face in Face::ALL {
                match face.step(i) {
                    Some(n) => {
                        if remove_into(w, table, c, n, node.level, face) {
                            out.writes += 1;
                        }
                    }
                    None => out.messages.push(LightMessage {
                        target: coord.neighbor(face),
                        component: c,
                        index: face.wrap(i) as u32,
                        level: node.level,
                        travel: face,
                        removal: true,
                    }),
                }
            }
        }
        while let Some(node) = w.queues_mut().channel_mut(c).add.pop_front() {
            let i = node.index as usize;
            let level = w.light(i, c);
            if level <= 1 {
                continue;
            }
            for face in Face::ALL {
                match face.step(i) {
                    Some(n) => {
                        if add_into(w, table, c, n, level, face) {
                            out.writes += 1;
                        }
                    }
                    None => out.messages.push(LightMessage {
                        target: coord.neighbor(face),
                        component: c,
                        index: face.wrap(i) as u32,
                        level,
                        travel: face,
                        removal: false,
                    }),
                }
            }
        }
    }
    out
}

/// Apply a message addressed to this chunk; the work lands in its queues.
pub fn apply_message<W: LightWriter + ?Sized>(w: &mut W, table: &LightTable, msg: &LightMessage) -> bool {
    let n = msg.index as usize;
    if n >= CHUNK_VOLUME {
        return false;
    }
    if msg.removal {
        remove_into(w, table, msg.component, n, msg.level, msg.travel)
    } else {
        add_into(w, table, msg.component, n, msg.level, msg.travel)
    }
}

/// Queue the light work caused by replacing `old` with `new` at `index`.
/// The block itself must already be written.
pub fn on_block_changed<W: LightWriter + ?Sized>(
    w: &mut W,
    table: &LightTable,
    index: usize,
    old: BlockId,
    new: BlockId,
) {
    if old == new {
        return;
    }
    for c in LightComponent::ALL {
        let cur = w.light(index, c);
        if cur > 0 {
            w.set_light(index, c, 0);
            push_remove(w, c, index, cur);
        }
        let e = table.emission(new, c);
        if e > 0 {
            w.set_light(index, c, e);
            push_add(w, c, index);
        }
        if table.passable(new, c) {
            for face in Face::ALL {
                if let Some(n) = face.step(index) {
                    if w.light(n, c) > 0 {
                        push_add(w, c, n);
                    }
                }
            }
        }
    }
}

/// Whether column `(x, z)` of chunk `coord` sees open sky through its top
/// face according to the heightmap. Unsampled columns count as open.
pub fn sky_exposed(heights: &ColumnHeights, coord: ChunkCoord, x: usize, z: usize) -> bool {
    let (_, oy, _) = coord.origin();
    let sample = heights.get(x, z);
    !(sample.is_loaded() && sample.height >= oy + CHUNK_SIZE_I32)
}

/// Light a freshly generated or loaded chunk on its own: sky columns from the
/// heightmap, then emitters, then a local flood. Light from neighbors arrives
/// later through border exchange.
pub fn initial_light<W: LightWriter + ?Sized>(
    w: &mut W,
    table: &LightTable,
    coord: ChunkCoord,
    heights: &ColumnHeights,
) -> Propagation {
    for z in 0..CHUNK_SIZE {
        for x in 0..CHUNK_SIZE {
            if !sky_exposed(heights, coord, x, z) {
                continue;
            }
            let mut level = MAX_LIGHT;
            for y in (0..CHUNK_SIZE).rev() {
                let i = voxel_index(x, y, z);
                level = transmit(table, level, Face::NegY, LightComponent::Sun, w.block(i));
                if level == 0 {
                    break;
                }
                w.set_light(i, LightComponent::Sun, level);
                push_add(w, LightComponent::Sun, i);
            }
        }
    }
    for i in 0..CHUNK_VOLUME {
        let b = w.block(i);
        if !table.is_emitter(b) {
            continue;
        }
        for c in [LightComponent::Red, LightComponent::Green, LightComponent::Blue] {
            let e = table.emission(b, c);
            if e > w.light(i, c) {
                w.set_light(i, c, e);
                push_add(w, c, i);
            }
        }
    }
    propagate(w, table, coord)
}
