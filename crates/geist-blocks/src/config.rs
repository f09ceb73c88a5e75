use serde::Deserialize;

// Top-level blocks config file
#[derive(Deserialize, Debug, Clone)]
pub struct BlocksConfig {
    pub blocks: Vec<BlockDef>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BlockDef {
    pub name: String,
    #[serde(default)]
    pub id: Option<u16>,
    #[serde(default)]
    pub solid: Option<bool>,
    #[serde(default)]
    pub blocks_sunlight: Option<bool>,
    #[serde(default)]
    pub propagates_light: Option<bool>,
    #[serde(default)]
    pub light_attenuation: Option<u8>,
    // [r, g, b], each 0..=31
    #[serde(default)]
    pub emission: Option<[u8; 3]>,
    #[serde(default)]
    pub liquid: Option<bool>,
}

impl BlockDef {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.into(),
            id: None,
            solid: None,
            blocks_sunlight: None,
            propagates_light: None,
            light_attenuation: None,
            emission: None,
            liquid: None,
        }
    }
}
