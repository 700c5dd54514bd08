//! Property-based tests for the planning pipeline.
//!
//! Generates random output requests and talent levels over the fixture
//! catalog, then verifies the structural invariants and the snapshot
//! round-trip law hold for every plan the pipeline accepts.

use fabrica_core::catalog::TalentLevels;
use fabrica_core::plan::{build_plan, extend_plan, OutputRequest, PlanOptions};
use fabrica_core::serialize::{export_plan, import_plan, PlanDocument};
use fabrica_core::test_utils::*;
use fabrica_core::validation::check_graph;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

fn arb_talents() -> impl Strategy<Value = TalentLevels> {
    (0..=5u8, 0..=5u8).prop_map(|(time, input)| {
        let mut t = TalentLevels::new();
        t.set("production_time", time);
        t.set("input_efficiency", input);
        t
    })
}

/// Requested rates stay in a band the fixture tree can satisfy without
/// hitting the per-industry relay ceiling.
fn arb_rate() -> impl Strategy<Value = f64> {
    0.1..8.0f64
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Any accepted plan passes the structural sanity check and delivers
    /// exactly the requested rate.
    #[test]
    fn plans_are_structurally_sound(rate in arb_rate(), talents in arb_talents()) {
        let catalog = fixture_catalog();
        let circuit = lookup(&catalog, "circuit");
        let graph = build_plan(
            &catalog,
            &talents,
            &[OutputRequest { item: circuit, rate, maintain: 0.0 }],
            PlanOptions::default(),
        )
        .unwrap();

        prop_assert!(check_graph(&graph, &catalog).is_empty());

        let delivered: f64 = graph
            .containers()
            .filter(|(_, c)| c.item == circuit)
            .map(|(_, c)| c.output_rate)
            .sum();
        prop_assert!((delivered - rate).abs() < fabrica_core::EPSILON);
    }

    /// Export, serialize, reload, re-export: the document is a fixed point.
    #[test]
    fn snapshots_are_a_fixed_point(rate in arb_rate(), talents in arb_talents()) {
        let catalog = fixture_catalog();
        let circuit = lookup(&catalog, "circuit");
        let graph = build_plan(
            &catalog,
            &talents,
            &[OutputRequest { item: circuit, rate, maintain: 0.0 }],
            PlanOptions::default(),
        )
        .unwrap();

        let doc = export_plan(&graph, &catalog, &talents).unwrap();
        let parsed = PlanDocument::from_json(&doc.to_json().unwrap()).unwrap();
        prop_assert_eq!(&doc, &parsed);

        let restored = import_plan(&catalog, &parsed, &talents).unwrap();
        let doc2 = export_plan(&restored, &catalog, &talents).unwrap();
        prop_assert_eq!(&doc, &doc2);
    }

    /// Merging and unmerging is a lossless transform of the plan.
    #[test]
    fn merge_then_unmerge_is_identity(rate in arb_rate()) {
        let catalog = fixture_catalog();
        let talents = TalentLevels::new();
        let circuit = lookup(&catalog, "circuit");
        let requests = [OutputRequest { item: circuit, rate, maintain: 0.0 }];

        let plain = build_plan(&catalog, &talents, &requests, PlanOptions::default()).unwrap();
        let mut merged = build_plan(&catalog, &talents, &requests, PlanOptions {
            merge: true,
            ..Default::default()
        })
        .unwrap();

        fabrica_core::merge::unmerge_factory(&mut merged);

        let doc_plain = export_plan(&plain, &catalog, &talents).unwrap();
        let doc_unmerged = export_plan(&merged, &catalog, &talents).unwrap();
        prop_assert_eq!(doc_plain, doc_unmerged);
    }

    /// Growing a plan in two steps delivers the sum and stays sound.
    #[test]
    fn extension_accumulates_rates(
        first in 0.1..4.0f64,
        second in 0.1..4.0f64,
    ) {
        let catalog = fixture_catalog();
        let talents = TalentLevels::new();
        let circuit = lookup(&catalog, "circuit");

        let mut graph = build_plan(
            &catalog,
            &talents,
            &[OutputRequest { item: circuit, rate: first, maintain: 0.0 }],
            PlanOptions::default(),
        )
        .unwrap();
        extend_plan(
            &mut graph,
            &catalog,
            &talents,
            &[OutputRequest { item: circuit, rate: second, maintain: 0.0 }],
            PlanOptions::default(),
        )
        .unwrap();

        prop_assert!(check_graph(&graph, &catalog).is_empty());

        let delivered: f64 = graph
            .containers()
            .filter(|(_, c)| c.item == circuit)
            .map(|(_, c)| c.output_rate)
            .sum();
        prop_assert!((delivered - (first + second)).abs() < 1e-6);
    }
}
