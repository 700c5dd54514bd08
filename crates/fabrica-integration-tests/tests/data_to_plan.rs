//! Cross-crate test: data files in, routed plan out.
//!
//! Writes a small game definition to disk, loads it through fabrica-data,
//! and plans against the resulting catalog.

use std::fs;
use std::path::{Path, PathBuf};

use fabrica_core::catalog::TalentLevels;
use fabrica_core::plan::{build_plan, OutputRequest, PlanOptions};
use fabrica_core::validation::check_graph;
use fabrica_data::load_catalog;

fn make_test_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "fabrica_integration_{suffix}_{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn cleanup(dir: &Path) {
    let _ = fs::remove_dir_all(dir);
}

const ITEMS_RON: &str = r#"[
    (name: "hematite", category: ore, transfer_batch_size: 100.0, transfer_time: 20.0),
    (name: "iron", category: pure, tier: 2, transfer_batch_size: 100.0, transfer_time: 20.0),
    (name: "slag", category: part, transfer_batch_size: 100.0, transfer_time: 20.0),
    (name: "gear", category: product, tier: 3, transfer_batch_size: 100.0, transfer_time: 20.0),
]"#;

const RECIPES_RON: &str = r#"[
    (
        product: "iron",
        quantity: 10.0,
        time: 10.0,
        industry: "smelter",
        ingredients: [("hematite", 20.0)],
        byproducts: [("slag", 5.0)],
    ),
    (
        product: "gear",
        quantity: 10.0,
        time: 10.0,
        industry: "assembler",
        ingredients: [("iron", 20.0)],
    ),
]"#;

const TALENTS_RON: &str = r#"[
    (name: "production_time", kind: time_reduction, per_level: 5.0),
]"#;

#[test]
fn loaded_catalog_plans_end_to_end() {
    let dir = make_test_dir("end_to_end");
    fs::write(dir.join("items.ron"), ITEMS_RON).unwrap();
    fs::write(dir.join("recipes.ron"), RECIPES_RON).unwrap();
    fs::write(dir.join("talents.ron"), TALENTS_RON).unwrap();

    let catalog = load_catalog(&dir).unwrap();
    let gear = catalog.item_id("gear").unwrap();

    let graph = build_plan(
        &catalog,
        &TalentLevels::new(),
        &[OutputRequest {
            item: gear,
            rate: 2.0,
            maintain: 0.0,
        }],
        PlanOptions::default(),
    )
    .unwrap();

    assert!(check_graph(&graph, &catalog).is_empty());
    let delivered: f64 = graph
        .containers()
        .filter(|(_, c)| c.item == gear)
        .map(|(_, c)| c.output_rate)
        .sum();
    assert!((delivered - 2.0).abs() < fabrica_core::EPSILON);

    // The slag byproduct from smelting got drained somewhere.
    let slag = catalog.item_id("slag").unwrap();
    assert!(graph.transfer_units().any(|(_, tu)| tu.item == slag));

    cleanup(&dir);
}

#[test]
fn talents_from_data_files_scale_the_plan() {
    let dir = make_test_dir("talent_scaling");
    fs::write(dir.join("items.ron"), ITEMS_RON).unwrap();
    fs::write(dir.join("recipes.ron"), RECIPES_RON).unwrap();
    fs::write(dir.join("talents.ron"), TALENTS_RON).unwrap();

    let catalog = load_catalog(&dir).unwrap();
    let gear = catalog.item_id("gear").unwrap();
    let request = [OutputRequest {
        item: gear,
        rate: 4.0,
        maintain: 0.0,
    }];

    let baseline = build_plan(
        &catalog,
        &TalentLevels::new(),
        &request,
        PlanOptions::default(),
    )
    .unwrap();

    let mut talents = TalentLevels::new();
    talents.set("production_time", 5);
    let boosted = build_plan(&catalog, &talents, &request, PlanOptions::default()).unwrap();

    assert!(boosted.industry_count() <= baseline.industry_count());
    assert!(check_graph(&boosted, &catalog).is_empty());

    cleanup(&dir);
}
