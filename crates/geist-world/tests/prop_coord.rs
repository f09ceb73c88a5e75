use geist_world::{ChunkCoord, Face, voxel_coords};
use proptest::prelude::*;

proptest! {
    #[test]
    fn world_position_reassembles(wx in -5000i32..5000, wy in -500i32..500, wz in -5000i32..5000) {
        let c = ChunkCoord::from_world(wx, wy, wz);
        let (x, y, z) = voxel_coords(ChunkCoord::local_index(wx, wy, wz));
        let (ox, oy, oz) = c.origin();
        prop_assert_eq!((ox + x as i32, oy + y as i32, oz + z as i32), (wx, wy, wz));
    }

    #[test]
    fn crossing_a_face_lands_in_the_neighbor(wx in -200i32..200, wy in -200i32..200, wz in -200i32..200, f in 0usize..6) {
        let face = Face::ALL[f];
        let (dx, dy, dz) = face.offset();
        let here = ChunkCoord::from_world(wx, wy, wz);
        let idx = ChunkCoord::local_index(wx, wy, wz);
        let (nx, ny, nz) = (wx + dx, wy + dy, wz + dz);
        let there = ChunkCoord::from_world(nx, ny, nz);
        let nidx = ChunkCoord::local_index(nx, ny, nz);
        match face.step(idx) {
            Some(i) => {
                prop_assert_eq!(there, here);
                prop_assert_eq!(i, nidx);
            }
            None => {
                prop_assert_eq!(there, here.neighbor(face));
                prop_assert_eq!(face.wrap(idx), nidx);
            }
        }
    }
}
