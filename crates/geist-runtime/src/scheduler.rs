use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use geist_chunk::ChunkState;
use geist_world::ChunkCoord;
use hashbrown::{HashMap, HashSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    state: u8,
    distance2: i64,
    seq: u64,
    coord: (i32, i32, i32),
}

struct Delayed {
    due: Instant,
    coord: ChunkCoord,
    state: ChunkState,
    distance2: i64,
}

/// Transition bookkeeping for the chunk lifecycle. Holds coordinates and
/// target states only; running the work is the caller's job.
///
/// Lower states are served first; within a state, nearer chunks first.
#[derive(Default)]
pub struct ChunkScheduler {
    heap: BinaryHeap<Reverse<Key>>,
    pending: HashMap<ChunkCoord, (ChunkState, u64)>,
    delayed: Vec<Delayed>,
    parked: HashMap<ChunkCoord, ChunkState>,
    failures: HashMap<(ChunkCoord, ChunkState), u32>,
    stuck: HashSet<ChunkCoord>,
    seq: u64,
}

impl ChunkScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `coord` for `state`. No-op if it is already queued for the same
    /// or a lower (more urgent) state. Returns whether anything changed.
    pub fn enqueue(&mut self, coord: ChunkCoord, state: ChunkState, distance2: i64) -> bool {
        if let Some((queued, _)) = self.pending.get(&coord) {
            if queued.as_u8() <= state.as_u8() {
                return false;
            }
        }
        self.parked.remove(&coord);
        self.seq += 1;
        let seq = self.seq;
        self.pending.insert(coord, (state, seq));
        self.heap.push(Reverse(Key {
            state: state.as_u8(),
            distance2,
            seq,
            coord: (coord.cx, coord.cy, coord.cz),
        }));
        log::trace!(target: "scheduler", "enqueue {} {:?} d2={}", coord, state, distance2);
        true
    }

    /// Next ready entry, skipping ones superseded by a later enqueue.
    pub fn pop(&mut self) -> Option<(ChunkCoord, ChunkState)> {
        while let Some(Reverse(key)) = self.heap.pop() {
            let coord = ChunkCoord::new(key.coord.0, key.coord.1, key.coord.2);
            match self.pending.get(&coord) {
                Some(&(state, seq)) if seq == key.seq => {
                    self.pending.remove(&coord);
                    return Some((coord, state));
                }
                _ => continue,
            }
        }
        None
    }

    pub fn is_pending(&self, coord: ChunkCoord) -> bool {
        self.pending.contains_key(&coord) || self.delayed.iter().any(|d| d.coord == coord)
    }

    pub fn pending_state(&self, coord: ChunkCoord) -> Option<ChunkState> {
        self.pending.get(&coord).map(|(s, _)| *s)
    }

    /// Re-enqueue after `delay`.
    pub fn retry_later(
        &mut self,
        coord: ChunkCoord,
        state: ChunkState,
        distance2: i64,
        delay: Duration,
        now: Instant,
    ) {
        log::trace!(target: "scheduler", "retry {} {:?} in {:?}", coord, state, delay);
        self.delayed.push(Delayed {
            due: now + delay,
            coord,
            state,
            distance2,
        });
    }

    /// Move every delayed entry that is due into the ready heap.
    pub fn promote_due(&mut self, now: Instant) -> usize {
        let mut due = Vec::new();
        self.delayed.retain(|d| {
            if d.due <= now {
                due.push((d.coord, d.state, d.distance2));
                false
            } else {
                true
            }
        });
        let n = due.len();
        for (coord, state, d2) in due {
            self.enqueue(coord, state, d2);
        }
        n
    }

    /// Earliest pending retry, if any.
    pub fn next_due(&self) -> Option<Instant> {
        self.delayed.iter().map(|d| d.due).min()
    }

    /// Hold `coord` at `state` until a neighbor changes.
    pub fn park(&mut self, coord: ChunkCoord, state: ChunkState) {
        self.parked.insert(coord, state);
    }

    pub fn is_parked(&self, coord: ChunkCoord) -> bool {
        self.parked.contains_key(&coord)
    }

    /// Take `coord` out of the parked set, returning the state it waited at.
    pub fn unpark(&mut self, coord: ChunkCoord) -> Option<ChunkState> {
        self.parked.remove(&coord)
    }

    /// Count one more failure of `coord` at `state`; returns the new total.
    pub fn note_failure(&mut self, coord: ChunkCoord, state: ChunkState) -> u32 {
        let n = self.failures.entry((coord, state)).or_insert(0);
        *n += 1;
        *n
    }

    pub fn clear_failures(&mut self, coord: ChunkCoord, state: ChunkState) {
        self.failures.remove(&(coord, state));
    }

    pub fn failures(&self, coord: ChunkCoord, state: ChunkState) -> u32 {
        self.failures.get(&(coord, state)).copied().unwrap_or(0)
    }

    pub fn mark_stuck(&mut self, coord: ChunkCoord) {
        self.stuck.insert(coord);
    }

    pub fn is_stuck(&self, coord: ChunkCoord) -> bool {
        self.stuck.contains(&coord)
    }

    /// Drop every trace of `coord` except a delayed save retry.
    pub fn forget(&mut self, coord: ChunkCoord) {
        self.pending.remove(&coord);
        self.parked.remove(&coord);
        self.stuck.remove(&coord);
        self.delayed
            .retain(|d| d.coord != coord || d.state == ChunkState::Save);
        self.failures
            .retain(|(c, s), _| *c != coord || *s == ChunkState::Save);
    }

    /// Rebuild heap order after camera distances changed.
    pub fn reprioritize(&mut self, distance2: impl Fn(ChunkCoord) -> i64) {
        let mut heap = BinaryHeap::with_capacity(self.pending.len());
        for (&coord, &(state, seq)) in &self.pending {
            heap.push(Reverse(Key {
                state: state.as_u8(),
                distance2: distance2(coord),
                seq,
                coord: (coord.cx, coord.cy, coord.cz),
            }));
        }
        self.heap = heap;
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn delayed_len(&self) -> usize {
        self.delayed.len()
    }

    pub fn parked_len(&self) -> usize {
        self.parked.len()
    }
}
