use super::FloraPlacement;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreePart {
    Log,
    Leaves,
}

impl TreePart {
    pub fn block_name(self) -> &'static str {
        match self {
            TreePart::Log => "log",
            TreePart::Leaves => "leaves",
        }
    }
}

pub(crate) fn hash2(ix: i32, iz: i32, seed: u32) -> u32 {
    let mut h = (ix as u32).wrapping_mul(0x85eb_ca6b)
        ^ (iz as u32).wrapping_mul(0xc2b2_ae35)
        ^ seed.wrapping_mul(0x27d4_eb2d);
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb_352d);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846c_a68b);
    h ^= h >> 16;
    h
}

pub(crate) fn rand01(seed: u32, ix: i32, iz: i32, salt: u32) -> f32 {
    let h = hash2(ix, iz, (seed ^ salt).wrapping_add(0x9E37_79B9));
    ((h & 0x00FF_FFFF) as f32) / 16_777_216.0
}

/// Deterministic tree request for a grass column, if the dice say so.
pub(crate) fn roll_tree(seed: u32, wx: i32, surface_y: i32, wz: i32, probability: f32) -> Option<FloraPlacement> {
    if probability <= 0.0 || rand01(seed, wx, wz, 0xA53F9) >= probability {
        return None;
    }
    let trunk_height = 4 + (hash2(wx, wz, 0x0051_F0A7) % 3) as u8;
    Some(FloraPlacement {
        base: (wx, surface_y + 1, wz),
        trunk_height,
        leaf_radius: 2,
    })
}

/// World positions a tree occupies. Leaves form a Manhattan diamond around the
/// trunk top that narrows on the outer layers.
pub fn tree_blocks(tree: &FloraPlacement) -> Vec<((i32, i32, i32), TreePart)> {
    let (bx, by, bz) = tree.base;
    let th = i32::from(tree.trunk_height);
    let r = i32::from(tree.leaf_radius);
    let top = by + th - 1;
    let mut out = Vec::new();
    for y in by..=top {
        out.push(((bx, y, bz), TreePart::Log));
    }
    for dy in -2..=1 {
        let rad = if dy <= -2 || dy >= 1 { r - 1 } else { r };
        for dx in -r..=r {
            for dz in -r..=r {
                if dx == 0 && dz == 0 && dy <= 0 {
                    continue;
                }
                if dx.abs() + dz.abs() <= rad {
                    out.push(((bx + dx, top + dy, bz + dz), TreePart::Leaves));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trunk_is_capped_by_leaves() {
        let t = FloraPlacement {
            base: (10, 65, -4),
            trunk_height: 5,
            leaf_radius: 2,
        };
        let parts = tree_blocks(&t);
        let logs: Vec<_> = parts.iter().filter(|(_, p)| *p == TreePart::Log).collect();
        assert_eq!(logs.len(), 5);
        assert!(parts.contains(&((10, 70, -4), TreePart::Leaves)));
        assert!(!parts.iter().any(|(pos, p)| *p == TreePart::Leaves && *pos == (10, 69, -4)));
    }

    #[test]
    fn rolls_are_deterministic() {
        let a = roll_tree(7, 3, 64, 9, 0.5);
        let b = roll_tree(7, 3, 64, 9, 0.5);
        assert_eq!(a, b);
        assert_eq!(roll_tree(7, 3, 64, 9, 0.0), None);
        assert!(roll_tree(7, 3, 64, 9, 1.0).is_some());
    }
}
