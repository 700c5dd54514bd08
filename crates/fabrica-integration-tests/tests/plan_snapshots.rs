//! Saving and restoring planning sessions.
//!
//! A snapshot must reload into a graph that exports to the identical
//! document, survive merge topology, and refuse documents produced under
//! newer formats or richer talents than the loading user has.

use fabrica_core::catalog::TalentLevels;
use fabrica_core::plan::{build_plan, extend_plan, OutputRequest, PlanOptions};
use fabrica_core::serialize::{export_plan, import_plan, PlanDocument, SnapshotError};
use fabrica_core::test_utils::*;
use fabrica_core::validation::check_graph;

fn circuit_plan(talents: &TalentLevels, options: PlanOptions) -> fabrica_core::graph::FactoryGraph {
    let catalog = fixture_catalog();
    build_plan(
        &catalog,
        talents,
        &[OutputRequest {
            item: lookup(&catalog, "circuit"),
            rate: 1.0,
            maintain: 50.0,
        }],
        options,
    )
    .unwrap()
}

#[test]
fn snapshot_round_trips_to_the_same_document() {
    let catalog = fixture_catalog();
    let talents = TalentLevels::new();
    let graph = circuit_plan(&talents, PlanOptions::default());

    let doc = export_plan(&graph, &catalog, &talents).unwrap();
    let json = doc.to_json().unwrap();
    let parsed = PlanDocument::from_json(&json).unwrap();
    assert_eq!(doc, parsed);

    let restored = import_plan(&catalog, &parsed, &talents).unwrap();
    let doc2 = export_plan(&restored, &catalog, &talents).unwrap();
    assert_eq!(doc, doc2);
    assert!(check_graph(&restored, &catalog).is_empty());
}

#[test]
fn merged_snapshot_round_trips() {
    let catalog = fixture_catalog();
    let talents = TalentLevels::new();
    let graph = circuit_plan(
        &talents,
        PlanOptions {
            merge: true,
            ..Default::default()
        },
    );

    let doc = export_plan(&graph, &catalog, &talents).unwrap();
    let restored = import_plan(&catalog, &doc, &talents).unwrap();
    let doc2 = export_plan(&restored, &catalog, &talents).unwrap();
    assert_eq!(doc, doc2);
}

#[test]
fn restored_plan_can_be_extended() {
    let catalog = fixture_catalog();
    let talents = TalentLevels::new();
    let graph = circuit_plan(&talents, PlanOptions::default());

    let doc = export_plan(&graph, &catalog, &talents).unwrap();
    let mut restored = import_plan(&catalog, &doc, &talents).unwrap();

    extend_plan(
        &mut restored,
        &catalog,
        &talents,
        &[OutputRequest {
            item: lookup(&catalog, "wire"),
            rate: 2.0,
            maintain: 0.0,
        }],
        PlanOptions::default(),
    )
    .unwrap();

    let wire = lookup(&catalog, "wire");
    let delivered: f64 = restored
        .containers()
        .filter(|(_, c)| c.item == wire)
        .map(|(_, c)| c.output_rate)
        .sum();
    assert!((delivered - 2.0).abs() < fabrica_core::EPSILON);
    assert!(check_graph(&restored, &catalog).is_empty());
}

#[test]
fn newer_format_version_is_rejected() {
    let catalog = fixture_catalog();
    let talents = TalentLevels::new();
    let graph = circuit_plan(&talents, PlanOptions::default());

    let mut doc = export_plan(&graph, &catalog, &talents).unwrap();
    doc.version += 1;
    assert!(matches!(
        import_plan(&catalog, &doc, &talents),
        Err(SnapshotError::VersionMismatch { .. })
    ));
}

#[test]
fn richer_recorded_talents_are_rejected() {
    let catalog = fixture_catalog();
    let mut recorded = TalentLevels::new();
    recorded.set("production_time", 3);
    let graph = circuit_plan(&recorded, PlanOptions::default());
    let doc = export_plan(&graph, &catalog, &recorded).unwrap();

    // A user below the recorded level cannot reproduce the recipes.
    let mut weaker = TalentLevels::new();
    weaker.set("production_time", 2);
    assert!(matches!(
        import_plan(&catalog, &doc, &weaker),
        Err(SnapshotError::TalentExceeded { ref talent, .. }) if talent == "production_time"
    ));

    // At or above the recorded level the snapshot loads, scaled with the
    // levels it was built under.
    let mut stronger = TalentLevels::new();
    stronger.set("production_time", 5);
    let restored = import_plan(&catalog, &doc, &stronger).unwrap();
    let doc2 = export_plan(&restored, &catalog, &recorded).unwrap();
    assert_eq!(doc, doc2);
}

#[test]
fn labels_survive_a_round_trip() {
    let catalog = fixture_catalog();
    let talents = TalentLevels::new();
    let graph = circuit_plan(&talents, PlanOptions::default());

    let doc = export_plan(&graph, &catalog, &talents).unwrap();
    let restored = import_plan(&catalog, &doc, &talents).unwrap();

    let mut before: Vec<&str> = graph.containers().map(|(_, c)| c.label.as_str()).collect();
    let mut after: Vec<&str> = restored
        .containers()
        .map(|(_, c)| c.label.as_str())
        .collect();
    before.sort_unstable();
    after.sort_unstable();
    assert_eq!(before, after);
}
