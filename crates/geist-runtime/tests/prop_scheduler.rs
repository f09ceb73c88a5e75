use std::collections::HashMap;

use geist_chunk::ChunkState;
use geist_runtime::ChunkScheduler;
use geist_world::ChunkCoord;
use proptest::prelude::*;

fn entry() -> impl Strategy<Value = (i32, u8, i64)> {
    (0i32..6, 0u8..8, 0i64..50)
}

proptest! {
    #[test]
    fn pops_each_chunk_once_at_its_most_urgent_state(
        entries in prop::collection::vec(entry(), 1..60)
    ) {
        let mut sched = ChunkScheduler::new();
        let mut model: HashMap<ChunkCoord, (ChunkState, i64)> = HashMap::new();
        for &(x, s, d2) in &entries {
            let coord = ChunkCoord::new(x, 0, 0);
            let state = ChunkState::from_u8(s);
            let changed = sched.enqueue(coord, state, d2);
            let expect = match model.get(&coord) {
                Some(&(queued, _)) => state < queued,
                None => true,
            };
            prop_assert_eq!(changed, expect);
            if expect {
                model.insert(coord, (state, d2));
            }
        }
        prop_assert_eq!(sched.len(), model.len());

        let mut last: Option<(ChunkState, i64)> = None;
        let mut seen = 0;
        while let Some((coord, state)) = sched.pop() {
            let (want, d2) = model.remove(&coord).expect("popped a chunk twice");
            prop_assert_eq!(state, want);
            if let Some(prev) = last {
                prop_assert!(prev <= (state, d2));
            }
            last = Some((state, d2));
            seen += 1;
        }
        prop_assert!(model.is_empty());
        prop_assert!(seen > 0);
        prop_assert!(sched.is_empty());
    }
}
