//! # Validation Tier Tests (T0-T3)
//!
//! If ANY tier fails, the engine is INVALID.
//!
//! ## Tiers
//! - T0: Catalog Integrity
//! - T1: Rarity Sampling
//! - T2: Constraint-Respecting Composition
//! - T3: Canonical Output & Addressing

use std::collections::BTreeSet;
use std::sync::Arc;
use traitsmith_core::{
    Catalog, CatalogError, CatalogRecords, CompositionError, DependencyRecord, GenerationRequest,
    GenerationSession, PartTypeId, PartTypeRecord, RarityRecord, SessionConfig, TraitId,
    TraitRecord,
};

/// Face/Shirt catalog: Common 80%, Rare 20%, edge `F2 forces S2`.
fn face_shirt_records() -> CatalogRecords {
    CatalogRecords {
        rarities: vec![
            RarityRecord::new(1, 1, "Common", 80.0),
            RarityRecord::new(2, 2, "Rare", 20.0),
        ],
        part_types: vec![
            PartTypeRecord::new(1, "face", 0),
            PartTypeRecord::new(2, "shirt", 1),
        ],
        traits: vec![
            TraitRecord::new(1, "F1", 1, 1),
            TraitRecord::new(2, "F2", 1, 2),
            TraitRecord::new(3, "S1", 2, 1),
            TraitRecord::new(4, "S2", 2, 2),
        ],
        colors: Vec::new(),
        dependencies: vec![DependencyRecord::new(2, 4)],
    }
}

fn session(records: &CatalogRecords) -> GenerationSession {
    let catalog = Catalog::load(records).expect("valid catalog");
    GenerationSession::new(Arc::new(catalog), SessionConfig::default())
}

// =============================================================================
// TIER T0: CATALOG INTEGRITY
// =============================================================================

mod t0_catalog_integrity {
    use super::*;

    /// T0.1: A well-formed catalog loads.
    #[test]
    fn valid_catalog_loads() {
        let catalog = Catalog::load(&face_shirt_records()).expect("load");
        assert_eq!(catalog.active_tier_count(), 2);
        assert_eq!(catalog.dependency_graph().edge_count(), 1);
    }

    /// T0.2: Active percentages must sum to 100.
    #[test]
    fn percentage_sum_is_enforced() {
        let mut records = face_shirt_records();
        records.rarities[1].percentage = 19.0;
        assert_eq!(
            Catalog::load(&records).err(),
            Some(CatalogError::PercentageSum { sum_bps: 9_900 })
        );
    }

    /// T0.3: Sums within one basis point are accepted.
    #[test]
    fn percentage_sum_within_epsilon_loads() {
        let mut records = face_shirt_records();
        records.rarities[1].percentage = 20.01;
        assert!(Catalog::load(&records).is_ok());
    }

    /// T0.4: Inactive tiers are left out of the sum.
    #[test]
    fn inactive_tiers_do_not_count() {
        let mut records = face_shirt_records();
        records
            .rarities
            .push(RarityRecord::new(3, 3, "Mythic", 50.0).inactive());
        assert!(Catalog::load(&records).is_ok());
    }

    /// T0.5: A parent chain that loops is refused.
    #[test]
    fn cyclic_parent_chain_rejected() {
        let mut records = face_shirt_records();
        records.traits[0] = TraitRecord::new(1, "F1", 1, 1).with_parent(5);
        records
            .traits
            .push(TraitRecord::new(5, "F5", 1, 1).with_parent(1));
        assert!(matches!(
            Catalog::load(&records),
            Err(CatalogError::ParentCycle(_))
        ));
    }

    /// T0.6: Two forced assignments for one part from one origin are refused.
    #[test]
    fn contradictory_edges_rejected() {
        let mut records = face_shirt_records();
        records.dependencies.push(DependencyRecord::new(2, 3));
        assert!(matches!(
            Catalog::load(&records),
            Err(CatalogError::ContradictoryDependency { .. })
        ));
    }

    /// T0.7: Dangling references are refused.
    #[test]
    fn unknown_reference_rejected() {
        let mut records = face_shirt_records();
        records.dependencies.push(DependencyRecord::new(1, 99));
        assert!(matches!(
            Catalog::load(&records),
            Err(CatalogError::UnknownReference { .. })
        ));
    }

    /// T0.8: Integrity errors reach callers as fatal, non-retryable errors.
    #[test]
    fn integrity_errors_are_not_retryable() {
        let err = CompositionError::from(CatalogError::NoActiveTiers);
        assert!(!err.is_retryable());
    }
}

// =============================================================================
// TIER T1: RARITY SAMPLING
// =============================================================================

mod t1_rarity_sampling {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use traitsmith_core::RaritySampler;

    /// T1.1: Observed tier frequency tracks the configured percentage.
    #[test]
    fn tier_frequency_matches_percentages() {
        let catalog = Catalog::load(&face_shirt_records()).expect("load");
        let sampler = RaritySampler::new(&catalog);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let draws = 20_000;
        let rare = (0..draws)
            .filter(|_| sampler.sample_tier(&mut rng) == traitsmith_core::RarityId(2))
            .count();

        // 20% ± 1.5%
        assert!((3_700..=4_300).contains(&rare), "rare draws: {rare}");
    }

    /// T1.2: A tier with no instances for a part falls back and is recorded.
    #[test]
    fn empty_tier_falls_back() {
        let mut records = face_shirt_records();
        records.traits.retain(|t| t.code != "S2");
        records.dependencies.clear();
        let catalog = Catalog::load(&records).expect("load");
        let sampler = RaritySampler::new(&catalog);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let instance = sampler
            .sample_instance(traitsmith_core::RarityId(2), PartTypeId(2), &mut rng)
            .expect("fallback instance");
        assert_eq!(instance.trait_id, TraitId(3));
        assert!(instance.fallback);
    }
}

// =============================================================================
// TIER T2: CONSTRAINT-RESPECTING COMPOSITION
// =============================================================================

mod t2_composition {
    use super::*;

    /// T2.1: Whenever Face draws F2, Shirt is S2. Never {F2, S1}.
    #[test]
    fn forced_edge_is_always_honored() {
        let session = session(&face_shirt_records());
        let mut saw_f2 = false;

        for seed in 0..500 {
            let outcome = session
                .generate(&GenerationRequest::new(&["face", "shirt"], seed))
                .expect("run");
            let face = outcome.traits.get(PartTypeId(1)).expect("face");
            let shirt = outcome.traits.get(PartTypeId(2)).expect("shirt");
            if face.assignment.trait_id == TraitId(2) {
                saw_f2 = true;
                assert_eq!(shirt.assignment.trait_id, TraitId(4), "seed {seed}");
            }
        }

        assert!(saw_f2, "no seed drew Rare for Face");
    }

    /// T2.2: Every requested part has exactly one slot.
    #[test]
    fn every_requested_part_is_filled() {
        let session = session(&face_shirt_records());
        let outcome = session
            .generate(&GenerationRequest::new(&["shirt", "face"], 3))
            .expect("run");
        let parts: BTreeSet<PartTypeId> = outcome.traits.slots().map(|s| s.part).collect();
        assert_eq!(parts, BTreeSet::from([PartTypeId(1), PartTypeId(2)]));
    }

    /// T2.3: A catalog where every combination violates an edge exhausts.
    #[test]
    fn impossible_catalog_exhausts() {
        let records = CatalogRecords {
            rarities: vec![RarityRecord::new(1, 1, "Common", 100.0)],
            part_types: vec![
                PartTypeRecord::new(1, "face", 0),
                PartTypeRecord::new(2, "hat", 2),
                PartTypeRecord::new(3, "shirt", 1),
            ],
            traits: vec![
                TraitRecord::new(1, "F1", 1, 1),
                TraitRecord::new(2, "H1", 2, 1),
                TraitRecord::new(3, "H2", 2, 1),
                TraitRecord::new(4, "S1", 3, 1),
            ],
            colors: Vec::new(),
            dependencies: vec![DependencyRecord::new(1, 2), DependencyRecord::new(4, 3)],
        };
        let session = session(&records);

        for seed in 0..20 {
            let err = session
                .generate(&GenerationRequest::new(&["face", "hat", "shirt"], seed))
                .expect_err("no valid combination");
            assert!(matches!(err, CompositionError::Exhausted { .. }));
            assert!(err.is_retryable());
        }
    }

    /// T2.4: A pinned Rare face pulls in the Rare shirt.
    #[test]
    fn pin_propagates_forced_edges() {
        let session = session(&face_shirt_records());
        let request = GenerationRequest::new(&["face", "shirt"], 0).with_pin("face", "F2", None);
        let outcome = session.generate(&request).expect("run");
        assert_eq!(
            outcome
                .traits
                .get(PartTypeId(2))
                .map(|s| s.assignment.trait_id),
            Some(TraitId(4))
        );
    }
}

// =============================================================================
// TIER T3: CANONICAL OUTPUT & ADDRESSING
// =============================================================================

mod t3_output {
    use super::*;
    use std::collections::BTreeMap;
    use traitsmith_core::{ContentAddress, canonical_from_bytes};

    /// T3.1: Same catalog, same seed, same bytes, same address.
    #[test]
    fn runs_are_reproducible() {
        let a = session(&face_shirt_records());
        let b = session(&face_shirt_records());
        for seed in [0u64, 1, 42, u64::MAX] {
            let request = GenerationRequest::new(&["face", "shirt"], seed);
            let x = a.generate(&request).expect("run");
            let y = b.generate(&request).expect("run");
            assert_eq!(x.canonical, y.canonical);
            assert_eq!(x.address, y.address);
        }
    }

    /// T3.2: Equal trait choices share an address; different ones never do.
    #[test]
    fn addresses_track_trait_choices() {
        let session = session(&wide_records());
        let parts: Vec<String> = (1..=6).map(|p| format!("p{p}")).collect();

        let mut by_address: BTreeMap<ContentAddress, Vec<u8>> = BTreeMap::new();
        for seed in 0..2_000 {
            let request = GenerationRequest {
                parts: parts.clone(),
                seed,
                pins: Vec::new(),
            };
            let outcome = session.generate(&request).expect("run");
            let previous = by_address.insert(outcome.address, outcome.canonical.clone());
            if let Some(bytes) = previous {
                assert_eq!(bytes, outcome.canonical, "address collision");
            }
        }

        assert!(by_address.len() > 100);
    }

    /// T3.3: Canonical bytes decode back to the trait codes that were chosen.
    #[test]
    fn canonical_bytes_decode() {
        let session = session(&face_shirt_records());
        let outcome = session
            .generate(&GenerationRequest::new(&["face", "shirt"], 9))
            .expect("run");
        let decoded = canonical_from_bytes(&outcome.canonical).expect("decode");
        let parts: Vec<&str> = decoded.entries.iter().map(|e| e.part.as_str()).collect();
        assert_eq!(parts, vec!["face", "shirt"]);
    }

    /// Six unconstrained parts with eight traits each.
    fn wide_records() -> CatalogRecords {
        let mut records = CatalogRecords {
            rarities: vec![
                RarityRecord::new(1, 1, "Common", 60.0),
                RarityRecord::new(2, 2, "Rare", 40.0),
            ],
            ..CatalogRecords::default()
        };
        let mut id = 1;
        for p in 1..=6u32 {
            records
                .part_types
                .push(PartTypeRecord::new(p, &format!("p{p}"), p));
            for t in 0..8u32 {
                records
                    .traits
                    .push(TraitRecord::new(id, &format!("p{p}t{t}"), p, t % 2 + 1));
                id += 1;
            }
        }
        records
    }
}
