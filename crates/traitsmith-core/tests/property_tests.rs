//! # Property-Based Tests
//!
//! Determinism and constraint invariants over randomly shaped catalogs.

use proptest::collection::vec;
use proptest::prelude::*;
use std::sync::Arc;
use traitsmith_core::{
    Catalog, CatalogRecords, CompositionError, ContentAddress, ContentAddresser, DependencyRecord,
    GenerationRequest, GenerationSession, PartTypeRecord, Percentage, RarityRecord,
    SessionConfig, TraitRecord,
};

/// Build a catalog from generated shapes.
///
/// `traits` holds `(part index, tier index)`; `edges` holds trait index
/// pairs. Edges within one part are dropped.
fn records(parts: u32, traits: &[(u32, u32)], edges: &[(usize, usize)]) -> CatalogRecords {
    let mut records = CatalogRecords {
        rarities: vec![
            RarityRecord::new(1, 1, "Common", 75.0),
            RarityRecord::new(2, 2, "Rare", 25.0),
        ],
        ..CatalogRecords::default()
    };
    for p in 1..=parts {
        records
            .part_types
            .push(PartTypeRecord::new(p, &format!("p{p}"), p));
    }
    for (i, &(part, tier)) in traits.iter().enumerate() {
        let id = i as u32 + 1;
        records
            .traits
            .push(TraitRecord::new(id, &format!("t{id}"), part % parts + 1, tier % 2 + 1));
    }
    for &(a, b) in edges {
        let (Some(from), Some(to)) = (records.traits.get(a), records.traits.get(b)) else {
            continue;
        };
        if from.part_type_id != to.part_type_id {
            records.dependencies.push(DependencyRecord::new(from.id, to.id));
        }
    }
    records
}

fn all_parts(parts: u32) -> Vec<String> {
    (1..=parts).map(|p| format!("p{p}")).collect()
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Whole basis points survive the decimal conversion.
    #[test]
    #[allow(clippy::float_arithmetic)]
    fn percentage_bps_round_trip(bps in 0u32..=10_000) {
        let from_decimal = Percentage::from_percent(f64::from(bps) / 100.0);
        prop_assert_eq!(from_decimal, Percentage::from_bps(bps));
        prop_assert_eq!(from_decimal.map(Percentage::bps), Some(bps));
    }

    /// Out-of-range percentages are refused.
    #[test]
    fn percentage_above_hundred_rejected(bps in 10_001u32..1_000_000) {
        prop_assert_eq!(Percentage::from_bps(bps), None);
    }

    /// Addressing is a pure function of the bytes, and the text form parses back.
    #[test]
    fn address_is_idempotent(bytes in vec(any::<u8>(), 0..512)) {
        let addresser = ContentAddresser::default();
        let a = addresser.address(&bytes);
        let b = addresser.address(&bytes);
        prop_assert_eq!(a, b);
        let parsed: ContentAddress = a.to_string().parse().expect("parse");
        prop_assert_eq!(parsed, a);
    }

    /// Same catalog and seed produce the same outcome, error included.
    #[test]
    fn generation_is_deterministic(
        parts in 2u32..5,
        traits in vec((0u32..8, 0u32..2), 4..16),
        edges in vec((0usize..16, 0usize..16), 0..6),
        seed in any::<u64>(),
    ) {
        let records = records(parts, &traits, &edges);
        let Ok(catalog) = Catalog::load(&records) else {
            return Ok(());
        };
        let session = GenerationSession::new(Arc::new(catalog), SessionConfig::default());
        let request = GenerationRequest { parts: all_parts(parts), seed, pins: Vec::new() };

        let first = session.generate(&request);
        let second = session.generate(&request);
        prop_assert_eq!(first, second);
    }

    /// Every committed assignment has everything it forces in the set.
    #[test]
    fn forced_edges_always_hold(
        parts in 2u32..5,
        traits in vec((0u32..8, 0u32..2), 4..16),
        edges in vec((0usize..16, 0usize..16), 0..6),
        seed in any::<u64>(),
    ) {
        let records = records(parts, &traits, &edges);
        let Ok(catalog) = Catalog::load(&records) else {
            return Ok(());
        };
        let catalog = Arc::new(catalog);
        let session = GenerationSession::new(Arc::clone(&catalog), SessionConfig::default());
        let request = GenerationRequest { parts: all_parts(parts), seed, pins: Vec::new() };

        match session.generate(&request) {
            Ok(outcome) => {
                let graph = catalog.dependency_graph();
                for slot in outcome.traits.slots() {
                    for forced in graph.forced_by(&slot.assignment) {
                        prop_assert!(
                            outcome.traits.contains(forced),
                            "{} forces {} but it is missing",
                            slot.assignment,
                            forced
                        );
                    }
                }
            }
            Err(CompositionError::Exhausted { .. }) => {}
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }
}
