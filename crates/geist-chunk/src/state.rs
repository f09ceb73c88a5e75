/// Lifecycle states in service order: lower states are dispatched first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ChunkState {
    Load = 0,
    Generate = 1,
    Save = 2,
    Light = 3,
    Trees = 4,
    Mesh = 5,
    WaterMesh = 6,
    Draw = 7,
    Inactive = 8,
}

impl ChunkState {
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> ChunkState {
        match v {
            0 => ChunkState::Load,
            1 => ChunkState::Generate,
            2 => ChunkState::Save,
            3 => ChunkState::Light,
            4 => ChunkState::Trees,
            5 => ChunkState::Mesh,
            6 => ChunkState::WaterMesh,
            7 => ChunkState::Draw,
            _ => ChunkState::Inactive,
        }
    }

    /// In the lit half of the pipeline (`Light` through `Draw`).
    #[inline]
    pub fn is_lit_or_later(self) -> bool {
        self >= ChunkState::Light && self <= ChunkState::Draw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_service_priority() {
        use ChunkState::*;
        let order = [Load, Generate, Save, Light, Trees, Mesh, WaterMesh, Draw, Inactive];
        for w in order.windows(2) {
            assert!(w[0] < w[1]);
        }
        for s in order {
            assert_eq!(ChunkState::from_u8(s.as_u8()), s);
        }
        assert!(!Save.is_lit_or_later());
        assert!(Light.is_lit_or_later() && Draw.is_lit_or_later());
        assert!(!Inactive.is_lit_or_later());
    }
}
