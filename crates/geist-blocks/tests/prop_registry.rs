use geist_blocks::config::{BlockDef, BlocksConfig};
use geist_blocks::registry::{BlockRegistry, MAX_EMISSION};
use geist_blocks::AIR;
use proptest::prelude::*;

fn def_strategy() -> impl Strategy<Value = (Option<bool>, Option<bool>, Option<u8>, [u8; 3])> {
    (
        proptest::option::of(any::<bool>()),
        proptest::option::of(any::<bool>()),
        proptest::option::of(0u8..6),
        [0u8..=MAX_EMISSION, 0u8..=MAX_EMISSION, 0u8..=MAX_EMISSION],
    )
}

proptest! {
    // Auto-assigned ids are unique, name lookup agrees with get(), air stays at 0
    #[test]
    fn ids_unique_and_lookup_consistent(defs in prop::collection::vec(def_strategy(), 0..24)) {
        let blocks = defs
            .iter()
            .enumerate()
            .map(|(i, (solid, sun, att, em))| {
                let mut d = BlockDef::named(&format!("b{i}"));
                d.solid = *solid;
                d.blocks_sunlight = *sun;
                d.light_attenuation = *att;
                d.emission = Some(*em);
                d
            })
            .collect();
        let reg = BlockRegistry::from_config(BlocksConfig { blocks }).unwrap();
        prop_assert_eq!(reg.len(), defs.len() + 1);
        prop_assert_eq!(reg.id_by_name("air"), Some(AIR));
        for ty in reg.iter() {
            prop_assert_eq!(reg.id_by_name(&ty.name), Some(ty.id));
            prop_assert!(ty.light_attenuation >= 1);
        }
        for (i, (solid, sun, _, em)) in defs.iter().enumerate() {
            let ty = reg.get(reg.id_by_name(&format!("b{i}")).unwrap()).unwrap();
            let solid = solid.unwrap_or(true);
            prop_assert_eq!(ty.solid, solid);
            prop_assert_eq!(ty.blocks_sunlight, sun.unwrap_or(solid));
            prop_assert_eq!(&ty.emission, em);
        }
    }
}

#[test]
fn explicit_ids_leave_gaps_unresolved() {
    let reg = BlockRegistry::from_toml_str(
        r#"
        [[blocks]]
        name = "far"
        id = 9
        "#,
    )
    .unwrap();
    assert!(reg.get(5).is_none());
    assert_eq!(reg.get(9).map(|t| t.name.as_str()), Some("far"));
    assert_eq!(reg.id_span(), 10);
}
