use geist_blocks::{BlockId, BlockRegistry};
use geist_chunk::LightComponent;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LightProps {
    pub sun_passable: bool,
    pub lamp_passable: bool,
    pub attenuation: u8,
    pub emission: [u8; 3],
    pub liquid: bool,
}

/// Per-block light behaviour, flattened from the registry for the hot loops.
/// Ids the registry does not know are opaque.
#[derive(Clone, Debug)]
pub struct LightTable {
    props: Vec<LightProps>,
}

impl LightTable {
    pub fn from_registry(reg: &BlockRegistry) -> Self {
        let mut props = vec![LightProps::default(); reg.id_span()];
        for ty in reg.iter() {
            props[ty.id as usize] = LightProps {
                sun_passable: ty.propagates_light && !ty.blocks_sunlight,
                lamp_passable: ty.propagates_light,
                attenuation: ty.light_attenuation.max(1),
                emission: ty.emission,
                liquid: ty.liquid,
            };
        }
        Self { props }
    }

    #[inline]
    pub fn props(&self, id: BlockId) -> LightProps {
        self.props.get(id as usize).copied().unwrap_or_default()
    }

    #[inline]
    pub fn passable(&self, id: BlockId, c: LightComponent) -> bool {
        let p = self.props(id);
        match c {
            LightComponent::Sun => p.sun_passable,
            _ => p.lamp_passable,
        }
    }

    #[inline]
    pub fn attenuation(&self, id: BlockId) -> u8 {
        self.props(id).attenuation.max(1)
    }

    #[inline]
    pub fn emission(&self, id: BlockId, c: LightComponent) -> u8 {
        let e = self.props(id).emission;
        match c {
            LightComponent::Sun => 0,
            LightComponent::Red => e[0],
            LightComponent::Green => e[1],
            LightComponent::Blue => e[2],
        }
    }

    #[inline]
    pub fn is_emitter(&self, id: BlockId) -> bool {
        self.props(id).emission.iter().any(|&v| v > 0)
    }

    #[inline]
    pub fn is_liquid(&self, id: BlockId) -> bool {
        self.props(id).liquid
    }
}
