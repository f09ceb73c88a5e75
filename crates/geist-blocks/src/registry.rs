use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::Path;

use super::config::{BlockDef, BlocksConfig};
use super::types::{AIR, BlockId, BlockType};

/// Highest per-component emission a block may declare.
pub const MAX_EMISSION: u8 = 31;

#[derive(Default, Clone, Debug)]
pub struct BlockRegistry {
    pub blocks: Vec<Option<BlockType>>,
    pub by_name: HashMap<String, BlockId>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&BlockType> {
        self.blocks.get(id as usize).and_then(|b| b.as_ref())
    }

    pub fn id_by_name(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest id in use plus one; size for dense per-id lookup tables.
    pub fn id_span(&self) -> usize {
        self.blocks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockType> {
        self.blocks.iter().filter_map(|b| b.as_ref())
    }

    pub fn load_from_path(blocks_path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let blocks_toml = fs::read_to_string(blocks_path)?;
        Self::from_toml_str(&blocks_toml)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: BlocksConfig = toml::from_str(s)?;
        Self::from_config(cfg)
    }

    pub fn from_config(cfg: BlocksConfig) -> Result<Self, Box<dyn Error>> {
        let mut reg = BlockRegistry::new();
        let mut defs = cfg.blocks;
        // Air is always id 0, whether or not the config mentions it.
        if !defs.iter().any(|d| d.name == "air") {
            let mut air = BlockDef::named("air");
            air.id = Some(AIR);
            air.solid = Some(false);
            defs.insert(0, air);
        }
        let mut next_id: BlockId = 0;
        for def in defs.into_iter() {
            let id = match def.id {
                Some(id) => id,
                None => {
                    while reg.get(next_id).is_some() {
                        next_id = next_id
                            .checked_add(1)
                            .ok_or("block id space exhausted")?;
                    }
                    next_id
                }
            };
            if def.name == "air" && id != AIR {
                return Err(format!("block 'air' must use id 0, got {id}").into());
            }
            if reg.get(id).is_some() {
                return Err(format!("duplicate block id {id} for '{}'", def.name).into());
            }
            if reg.by_name.contains_key(&def.name) {
                return Err(format!("duplicate block name '{}'", def.name).into());
            }
            let emission = def.emission.unwrap_or([0, 0, 0]);
            if emission.iter().any(|c| *c > MAX_EMISSION) {
                return Err(format!(
                    "block '{}' emission {:?} exceeds {}",
                    def.name, emission, MAX_EMISSION
                )
                .into());
            }
            let solid = def.solid.unwrap_or(true);
            let ty = BlockType {
                id,
                solid,
                blocks_sunlight: def.blocks_sunlight.unwrap_or(solid),
                propagates_light: def.propagates_light.unwrap_or(!solid),
                light_attenuation: def.light_attenuation.unwrap_or(1).max(1),
                emission,
                liquid: def.liquid.unwrap_or(false),
                name: def.name,
            };
            reg.insert(ty);
        }
        Ok(reg)
    }

    fn insert(&mut self, ty: BlockType) {
        let slot = ty.id as usize;
        if self.blocks.len() <= slot {
            self.blocks.resize(slot + 1, None);
        }
        self.by_name.insert(ty.name.clone(), ty.id);
        self.blocks[slot] = Some(ty);
    }

    /// Palette used when no blocks file is configured.
    pub fn builtin() -> Self {
        const TABLE: &[(&str, bool, bool, u8, [u8; 3], bool)] = &[
            // name, solid, blocks_sunlight, attenuation, emission, liquid
            ("air", false, false, 1, [0, 0, 0], false),
            ("stone", true, true, 1, [0, 0, 0], false),
            ("dirt", true, true, 1, [0, 0, 0], false),
            ("grass", true, true, 1, [0, 0, 0], false),
            ("sand", true, true, 1, [0, 0, 0], false),
            ("water", false, false, 2, [0, 0, 0], true),
            ("log", true, true, 1, [0, 0, 0], false),
            ("leaves", true, false, 2, [0, 0, 0], false),
            ("glass", true, false, 1, [0, 0, 0], false),
            ("lamp", true, true, 1, [15, 15, 15], false),
            ("torch_red", false, false, 1, [14, 3, 3], false),
        ];
        let mut reg = BlockRegistry::new();
        for (i, &(name, solid, blocks_sunlight, attenuation, emission, liquid)) in
            TABLE.iter().enumerate()
        {
            reg.insert(BlockType {
                id: i as BlockId,
                name: name.into(),
                solid,
                blocks_sunlight,
                propagates_light: !blocks_sunlight,
                light_attenuation: attenuation,
                emission,
                liquid,
            });
        }
        reg
    }
}
