use std::sync::Arc;

use geist_chunk::{Chunk, ChunkGrid};
use geist_storage::{SizeClass, VoxelRecyclers};
use geist_world::{CHUNK_VOLUME, ChunkCoord, Face};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Insert(i32, i32, i32),
    Remove(i32, i32, i32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-2i32..=2, -1i32..=1, -2i32..=2).prop_map(|(x, y, z)| Op::Insert(x, y, z)),
        (-2i32..=2, -1i32..=1, -2i32..=2).prop_map(|(x, y, z)| Op::Remove(x, y, z)),
    ]
}

proptest! {
    #[test]
    fn neighbor_links_stay_symmetric(ops in proptest::collection::vec(op(), 1..120)) {
        let rec = VoxelRecyclers::new(SizeClass(CHUNK_VOLUME), 4);
        let grid = ChunkGrid::new();
        let mut live = std::collections::HashSet::new();
        for op in ops {
            match op {
                Op::Insert(x, y, z) => {
                    let c = ChunkCoord::new(x, y, z);
                    grid.insert(c, |gd| Arc::new(Chunk::new(c, gd, &rec)));
                    live.insert(c);
                }
                Op::Remove(x, y, z) => {
                    let c = ChunkCoord::new(x, y, z);
                    let removed = grid.remove(c).is_some();
                    prop_assert_eq!(removed, live.remove(&c));
                }
            }
            prop_assert!(grid.check_symmetry().is_ok());
            prop_assert_eq!(grid.len(), live.len());
            for &c in &live {
                let ns = grid.neighbors(c).unwrap();
                for face in Face::ALL {
                    let expect = live.contains(&c.neighbor(face));
                    prop_assert_eq!(ns[face.index()].is_some(), expect);
                    if let Some(n) = &ns[face.index()] {
                        let back = grid.neighbor(n.coord(), face.opposite()).unwrap();
                        prop_assert_eq!(back.coord(), c);
                    }
                }
                let count = Face::ALL.iter().filter(|f| live.contains(&c.neighbor(**f))).count();
                prop_assert_eq!(grid.num_neighbors(c), Some(count as u8));
            }
        }
        let columns: std::collections::HashSet<_> = live.iter().map(|c| c.column()).collect();
        prop_assert_eq!(grid.column_count(), columns.len());
    }
}
