//! Shared test fixtures for integration tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so the same
//! catalogs are available to unit tests and to the integration-tests crate
//! (via the `test-utils` feature).

use crate::catalog::{
    Catalog, CatalogBuilder, ItemCategory, ItemDef, RecipeDef, TalentDef, TalentKind, TalentScope,
};
use crate::id::ItemId;

// ===========================================================================
// Item registration helpers
// ===========================================================================

pub fn item(b: &mut CatalogBuilder, name: &str, category: ItemCategory, tier: u8) -> ItemId {
    b.register_item(ItemDef {
        name: name.to_string(),
        category,
        tier,
        volume: 1.0,
        // 5 units/s per physical transfer unit.
        transfer_batch_size: 100.0,
        transfer_time: 20.0,
    })
    .unwrap()
}

pub fn lookup(catalog: &Catalog, name: &str) -> ItemId {
    catalog.item_id(name).unwrap()
}

// ===========================================================================
// Fixture catalogs
// ===========================================================================

/// A small production tree exercising every item category:
///
/// ```text
/// bauxite (ore) -> aluminium (pure, slag byproduct) -> plate (part)
/// quartz (ore)  -> silicon (pure)                   -> wire (part)
/// coal (ore)    -> catalyst3 (catalyst)
/// hydrogen (gas, collected from nothing)
/// circuit (product) = plate + wire + catalyst3 + hydrogen
/// ```
pub fn fixture_catalog() -> Catalog {
    let mut b = CatalogBuilder::new();
    let bauxite = item(&mut b, "bauxite", ItemCategory::Ore, 1);
    let quartz = item(&mut b, "quartz", ItemCategory::Ore, 1);
    let coal = item(&mut b, "coal", ItemCategory::Ore, 1);
    let aluminium = item(&mut b, "aluminium", ItemCategory::Pure, 2);
    let silicon = item(&mut b, "silicon", ItemCategory::Pure, 2);
    let slag = item(&mut b, "slag", ItemCategory::Part, 1);
    let plate = item(&mut b, "plate", ItemCategory::Part, 3);
    let wire = item(&mut b, "wire", ItemCategory::Part, 3);
    let catalyst3 = item(&mut b, "catalyst3", ItemCategory::Catalyst, 3);
    let hydrogen = item(&mut b, "hydrogen", ItemCategory::Gas, 1);
    let circuit = item(&mut b, "circuit", ItemCategory::Product, 4);

    b.register_recipe(RecipeDef {
        product: aluminium,
        quantity: 10.0,
        time: 10.0,
        industry: "refiner".to_string(),
        ingredients: vec![(bauxite, 20.0)],
        byproducts: vec![(slag, 5.0)],
    })
    .unwrap();
    b.register_recipe(RecipeDef {
        product: silicon,
        quantity: 10.0,
        time: 10.0,
        industry: "refiner".to_string(),
        ingredients: vec![(quartz, 20.0)],
        byproducts: vec![],
    })
    .unwrap();
    b.register_recipe(RecipeDef {
        product: plate,
        quantity: 10.0,
        time: 10.0,
        industry: "smelter".to_string(),
        ingredients: vec![(aluminium, 10.0)],
        byproducts: vec![],
    })
    .unwrap();
    b.register_recipe(RecipeDef {
        product: wire,
        quantity: 20.0,
        time: 10.0,
        industry: "smelter".to_string(),
        ingredients: vec![(silicon, 10.0)],
        byproducts: vec![],
    })
    .unwrap();
    b.register_recipe(RecipeDef {
        product: catalyst3,
        quantity: 10.0,
        time: 10.0,
        industry: "chemical_plant".to_string(),
        ingredients: vec![(coal, 10.0)],
        byproducts: vec![],
    })
    .unwrap();
    b.register_recipe(RecipeDef {
        product: hydrogen,
        quantity: 40.0,
        time: 10.0,
        industry: "collector".to_string(),
        ingredients: vec![],
        byproducts: vec![],
    })
    .unwrap();
    b.register_recipe(RecipeDef {
        product: circuit,
        quantity: 5.0,
        time: 10.0,
        industry: "assembler".to_string(),
        ingredients: vec![
            (plate, 10.0),
            (wire, 20.0),
            (catalyst3, 2.0),
            (hydrogen, 5.0),
        ],
        byproducts: vec![(catalyst3, 2.0)],
    })
    .unwrap();

    b.register_talent(TalentDef {
        name: "production_time".to_string(),
        kind: TalentKind::TimeReduction,
        per_level: 5.0,
        scope: TalentScope::AllItems,
    });
    b.register_talent(TalentDef {
        name: "input_efficiency".to_string(),
        kind: TalentKind::InputReduction,
        per_level: 2.0,
        scope: TalentScope::Category(ItemCategory::Product),
    });

    b.build().unwrap()
}

/// A product whose recipe lists `width` distinct part ingredients, each
/// craftable from its own ore. Used to exercise fan-in limits.
pub fn wide_catalog(width: usize) -> Catalog {
    let mut b = CatalogBuilder::new();
    let mut ingredients = Vec::with_capacity(width);
    for i in 0..width {
        let ore = item(&mut b, &format!("ore{i}"), ItemCategory::Ore, 1);
        let part = item(&mut b, &format!("part{i}"), ItemCategory::Part, 2);
        b.register_recipe(RecipeDef {
            product: part,
            quantity: 10.0,
            time: 10.0,
            industry: "smelter".to_string(),
            ingredients: vec![(ore, 10.0)],
            byproducts: vec![],
        })
        .unwrap();
        // Ascending quantities make the consolidation prefix predictable.
        ingredients.push((part, (i + 1) as f64));
    }
    let gadget = item(&mut b, "gadget", ItemCategory::Product, 3);
    b.register_recipe(RecipeDef {
        product: gadget,
        quantity: 10.0,
        time: 10.0,
        industry: "assembler".to_string(),
        ingredients,
        byproducts: vec![],
    })
    .unwrap();
    b.build().unwrap()
}
