//! # Generation Session
//!
//! Drives one generation request end to end.
//!
//! A session holds the shared, immutable catalog and the run configuration.
//! Each `generate` call is an independent run with its own composer and its
//! own RNG seeded from the request, so any number of runs may execute in
//! parallel against one session.
//!
//! Nothing outside the run is touched until `publish` hands the finished
//! artifact to the compositor and the store.

use crate::address::{ContentAddress, ContentAddresser, HashAlgorithm};
use crate::composer::{ComposerConfig, CompositionReport, TraitComposer};
use crate::compositor::{CompositorError, ImageCompositor, LayerStack};
use crate::formats::{CanonicalTraitSet, canonical_to_bytes};
use crate::metadata::{MetadataConfig, MetadataDocument, rarity_score};
use crate::primitives::{MAX_PINS, MAX_REQUIRED_PARTS};
use crate::storage::{ArtifactStore, StoreError, StoreReceipt};
use crate::{Assignment, Catalog, CompositionError, PartTypeId, ResolvedTraitSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// CONFIGURATION & REQUESTS
// =============================================================================

/// Per-session settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub composer: ComposerConfig,
    pub algorithm: HashAlgorithm,
    pub metadata: MetadataConfig,
}

/// A caller-chosen trait (and color) for one part type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    pub part: String,
    #[serde(rename = "trait")]
    pub trait_code: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// What to generate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Required part type codes.
    pub parts: Vec<String>,
    pub seed: u64,
    #[serde(default)]
    pub pins: Vec<Pin>,
}

impl GenerationRequest {
    #[must_use]
    pub fn new(parts: &[&str], seed: u64) -> Self {
        Self {
            parts: parts.iter().map(|p| (*p).to_string()).collect(),
            seed,
            pins: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_pin(mut self, part: &str, trait_code: &str, color: Option<&str>) -> Self {
        self.pins.push(Pin {
            part: part.to_string(),
            trait_code: trait_code.to_string(),
            color: color.map(str::to_string),
        });
        self
    }
}

/// A successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub traits: ResolvedTraitSet,
    /// Canonical bytes of `traits`.
    pub canonical: Vec<u8>,
    /// Address of `canonical`.
    pub address: ContentAddress,
    pub report: CompositionReport,
    pub rarity_score: u32,
}

// =============================================================================
// PUBLISHING
// =============================================================================

/// Failure while handing an outcome to the collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error(transparent)]
    Composition(#[from] CompositionError),

    #[error("Compositor error: {0}")]
    Compositor(#[from] CompositorError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Where the image and its metadata ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifact {
    pub image: ContentAddress,
    pub image_receipt: StoreReceipt,
    pub metadata: ContentAddress,
    pub metadata_receipt: StoreReceipt,
    pub document: MetadataDocument,
}

// =============================================================================
// SESSION
// =============================================================================

/// Entry point for generation runs against one catalog.
#[derive(Debug, Clone)]
pub struct GenerationSession {
    catalog: Arc<Catalog>,
    config: SessionConfig,
}

impl GenerationSession {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, config: SessionConfig) -> Self {
        Self { catalog, config }
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run one generation: compose, canonicalize, address.
    pub fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome, CompositionError> {
        self.generate_with_seed(request, request.seed)
    }

    /// Retry exhausted runs with seeds `seed, seed + 1, …` (wrapping).
    ///
    /// Anything other than exhaustion is returned at once. After `attempts`
    /// exhaustions the catalog is reported as too restrictive.
    pub fn generate_retrying(
        &self,
        request: &GenerationRequest,
        attempts: u32,
    ) -> Result<GenerationOutcome, CompositionError> {
        let attempts = attempts.max(1);
        for attempt in 0..attempts {
            let seed = request.seed.wrapping_add(u64::from(attempt));
            match self.generate_with_seed(request, seed) {
                Err(e) if e.is_retryable() => {
                    tracing::debug!(seed, attempt, error = %e, "Run exhausted, retrying");
                }
                other => return other,
            }
        }
        tracing::warn!(
            seed = request.seed,
            attempts,
            "Every seed exhausted; constraints may be too restrictive"
        );
        Err(CompositionError::Unsatisfiable { attempts })
    }

    fn generate_with_seed(
        &self,
        request: &GenerationRequest,
        seed: u64,
    ) -> Result<GenerationOutcome, CompositionError> {
        let catalog = self.catalog.as_ref();
        let parts = self.resolve_parts(&request.parts)?;
        if request.pins.len() > MAX_PINS {
            return Err(CompositionError::RequestTooLarge(format!(
                "{} pins (max {})",
                request.pins.len(),
                MAX_PINS
            )));
        }
        let required: BTreeSet<PartTypeId> = parts.iter().copied().collect();

        let mut composer = TraitComposer::new(catalog, &parts, &self.config.composer);
        for pin in &request.pins {
            let (part, assignment) = self.resolve_pin(pin, &required)?;
            composer.pin(part, assignment)?;
        }
        let composition = composer.compose(seed)?;

        let canonical =
            canonical_to_bytes(&CanonicalTraitSet::from_resolved(&composition.traits, catalog)?)?;
        let address = ContentAddresser::new(self.config.algorithm).address(&canonical);
        let rarity_score = rarity_score(&composition.traits, catalog);

        tracing::debug!(
            seed,
            address = %address,
            rarity_score,
            backtracks = composition.report.backtracks,
            "Generation run complete"
        );

        Ok(GenerationOutcome {
            traits: composition.traits,
            canonical,
            address,
            report: composition.report,
            rarity_score,
        })
    }

    fn resolve_parts(&self, codes: &[String]) -> Result<Vec<PartTypeId>, CompositionError> {
        if codes.is_empty() {
            return Err(CompositionError::NoPartTypes);
        }
        if codes.len() > MAX_REQUIRED_PARTS {
            return Err(CompositionError::RequestTooLarge(format!(
                "{} part types (max {})",
                codes.len(),
                MAX_REQUIRED_PARTS
            )));
        }

        let mut seen = BTreeSet::new();
        codes
            .iter()
            .map(|code| {
                let part = self
                    .catalog
                    .part_type_by_code(code)
                    .ok_or_else(|| CompositionError::UnknownPartType(code.clone()))?;
                if !seen.insert(part.id) {
                    return Err(CompositionError::DuplicatePartType(code.clone()));
                }
                Ok(part.id)
            })
            .collect()
    }

    fn resolve_pin(
        &self,
        pin: &Pin,
        required: &BTreeSet<PartTypeId>,
    ) -> Result<(PartTypeId, Assignment), CompositionError> {
        let catalog = self.catalog.as_ref();
        let part = catalog
            .part_type_by_code(&pin.part)
            .ok_or_else(|| CompositionError::UnknownPartType(pin.part.clone()))?;
        if !required.contains(&part.id) {
            return Err(CompositionError::InvalidPin(format!(
                "part type '{}' is not requested",
                pin.part
            )));
        }
        let instance = catalog
            .trait_by_code(&pin.trait_code)
            .ok_or_else(|| CompositionError::UnknownTrait(pin.trait_code.clone()))?;
        if instance.part_type != part.id {
            return Err(CompositionError::InvalidPin(format!(
                "trait '{}' does not belong to part type '{}'",
                pin.trait_code, pin.part
            )));
        }
        if !catalog.is_leaf(instance.id) {
            return Err(CompositionError::InvalidPin(format!(
                "trait '{}' has specializations",
                pin.trait_code
            )));
        }

        let color = match (&pin.color, part.colored) {
            (None, false) => None,
            (Some(_), false) => {
                return Err(CompositionError::InvalidPin(format!(
                    "part type '{}' takes no color",
                    pin.part
                )));
            }
            (None, true) => {
                return Err(CompositionError::InvalidPin(format!(
                    "part type '{}' needs a color",
                    pin.part
                )));
            }
            (Some(hex), true) => {
                let mut matching = catalog.colors().filter(|c| c.hex == *hex).peekable();
                if matching.peek().is_none() {
                    return Err(CompositionError::UnknownColor(hex.clone()));
                }
                let color = matching
                    .find(|c| c.is_eligible(part.id, instance.rarity))
                    .ok_or_else(|| {
                        CompositionError::InvalidPin(format!(
                            "color '{}' is not eligible for trait '{}'",
                            hex, pin.trait_code
                        ))
                    })?;
                Some(color.id)
            }
        };

        Ok((
            part.id,
            Assignment {
                trait_id: instance.id,
                color,
            },
        ))
    }

    /// Composite, address and store the image, then build, address and
    /// store its metadata document.
    ///
    /// The image's reference count after storing is the edition number.
    pub fn publish<C, S>(
        &self,
        outcome: &GenerationOutcome,
        compositor: &C,
        store: &S,
    ) -> Result<PublishedArtifact, PublishError>
    where
        C: ImageCompositor + ?Sized,
        S: ArtifactStore + ?Sized,
    {
        let catalog = self.catalog.as_ref();
        let addresser = ContentAddresser::new(self.config.algorithm);

        let stack = LayerStack::from_resolved(&outcome.traits, catalog);
        let image_bytes = compositor.composite(&stack)?;
        let image = addresser.address(&image_bytes);
        let image_receipt = store.put(&image, &image_bytes)?;

        let document = MetadataDocument::build(
            &outcome.traits,
            catalog,
            &image,
            image_receipt.references,
            &self.config.metadata,
        )?;
        let metadata_bytes = document.to_bytes()?;
        let metadata = addresser.address(&metadata_bytes);
        let metadata_receipt = store.put(&metadata, &metadata_bytes)?;

        tracing::info!(
            image = %image,
            metadata = %metadata,
            edition = image_receipt.references,
            "Artifact published"
        );

        Ok(PublishedArtifact {
            image,
            image_receipt,
            metadata,
            metadata_receipt,
            document,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::ManifestCompositor;
    use crate::source::{
        CatalogRecords, ColorRecord, DependencyRecord, PartTypeRecord, RarityRecord, TraitRecord,
    };
    use crate::storage::MemoryStore;
    use crate::TraitId;

    fn session() -> GenerationSession {
        let records = CatalogRecords {
            rarities: vec![
                RarityRecord::new(1, 1, "Common", 80.0),
                RarityRecord::new(2, 2, "Rare", 20.0),
            ],
            part_types: vec![
                PartTypeRecord::new(1, "face", 0),
                PartTypeRecord::new(2, "shirt", 1).colored(),
            ],
            traits: vec![
                TraitRecord::new(1, "F1", 1, 1).with_content_ref("face/f1.png"),
                TraitRecord::new(2, "F2", 1, 2).with_content_ref("face/f2.png"),
                TraitRecord::new(3, "S1", 2, 1).with_content_ref("shirt/s1.png"),
                TraitRecord::new(4, "S2", 2, 2).with_content_ref("shirt/s2.png"),
            ],
            colors: vec![
                ColorRecord::new(1, "#ffffff"),
                ColorRecord::new(2, "#ff0000").for_rarity(2),
            ],
            dependencies: vec![DependencyRecord {
                from_trait: 2,
                from_color: None,
                to_trait: 4,
                to_color: Some(2),
            }],
        };
        let catalog = Catalog::load(&records).expect("valid catalog");
        GenerationSession::new(Arc::new(catalog), SessionConfig::default())
    }

    #[test]
    fn same_seed_is_bit_identical() {
        let session = session();
        let request = GenerationRequest::new(&["face", "shirt"], 99);
        let a = session.generate(&request).expect("run");
        let b = session.generate(&request).expect("run");
        assert_eq!(a, b);
        assert_eq!(a.canonical, b.canonical);
        assert_eq!(a.address.to_string(), b.address.to_string());
    }

    #[test]
    fn malformed_requests_are_typed() {
        let session = session();
        assert_eq!(
            session.generate(&GenerationRequest::new(&[], 1)).err(),
            Some(CompositionError::NoPartTypes)
        );
        assert_eq!(
            session.generate(&GenerationRequest::new(&["hat"], 1)).err(),
            Some(CompositionError::UnknownPartType("hat".to_string()))
        );
        assert_eq!(
            session
                .generate(&GenerationRequest::new(&["face", "face"], 1))
                .err(),
            Some(CompositionError::DuplicatePartType("face".to_string()))
        );
    }

    #[test]
    fn pins_are_validated() {
        let session = session();
        let base = GenerationRequest::new(&["face", "shirt"], 1);

        let unknown = base.clone().with_pin("face", "F9", None);
        assert_eq!(
            session.generate(&unknown).err(),
            Some(CompositionError::UnknownTrait("F9".to_string()))
        );

        let wrong_part = base.clone().with_pin("face", "S1", None);
        assert!(matches!(
            session.generate(&wrong_part),
            Err(CompositionError::InvalidPin(_))
        ));

        let missing_color = base.clone().with_pin("shirt", "S1", None);
        assert!(matches!(
            session.generate(&missing_color),
            Err(CompositionError::InvalidPin(_))
        ));

        let unknown_color = base.clone().with_pin("shirt", "S1", Some("#000000"));
        assert_eq!(
            session.generate(&unknown_color).err(),
            Some(CompositionError::UnknownColor("#000000".to_string()))
        );

        // Red is Rare-only; S1 is Common.
        let ineligible = base.with_pin("shirt", "S1", Some("#ff0000"));
        assert!(matches!(
            session.generate(&ineligible),
            Err(CompositionError::InvalidPin(_))
        ));
    }

    #[test]
    fn pinned_face_forces_colored_shirt() {
        let session = session();
        let request = GenerationRequest::new(&["face", "shirt"], 5).with_pin("face", "F2", None);
        let outcome = session.generate(&request).expect("run");
        let shirt = outcome.traits.get(PartTypeId(2)).expect("shirt slot");
        assert_eq!(shirt.assignment.trait_id, TraitId(4));
        assert_eq!(shirt.assignment.color, Some(crate::ColorId(2)));
    }

    #[test]
    fn parallel_runs_match_sequential_runs() {
        let session = session();
        let seeds: Vec<u64> = (0..16).collect();

        let sequential: Vec<_> = seeds
            .iter()
            .map(|&s| {
                session
                    .generate(&GenerationRequest::new(&["face", "shirt"], s))
                    .expect("run")
            })
            .collect();

        let parallel: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = seeds
                .iter()
                .map(|&s| {
                    let session = &session;
                    scope.spawn(move || {
                        session.generate(&GenerationRequest::new(&["face", "shirt"], s))
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("thread").expect("run"))
                .collect()
        });

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn publish_stores_image_and_metadata() {
        let session = session();
        let store = MemoryStore::new();
        let outcome = session
            .generate(&GenerationRequest::new(&["face", "shirt"], 3))
            .expect("run");

        let first = session
            .publish(&outcome, &ManifestCompositor, &store)
            .expect("publish");
        assert!(first.image_receipt.newly_stored);
        assert_eq!(first.document.edition, 1);
        assert!(store.contains(&first.image).expect("contains"));
        assert!(store.contains(&first.metadata).expect("contains"));

        // Same traits, same image: one copy, next edition.
        let second = session
            .publish(&outcome, &ManifestCompositor, &store)
            .expect("publish");
        assert_eq!(second.image, first.image);
        assert!(!second.image_receipt.newly_stored);
        assert_eq!(second.document.edition, 2);
        assert_ne!(second.metadata, first.metadata);
    }

    #[test]
    fn retrying_reports_unsatisfiable() {
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
        let session = GenerationSession::new(
            Arc::new(Catalog::load(&records).expect("valid")),
            SessionConfig::default(),
        );
        let request = GenerationRequest::new(&["face", "hat", "shirt"], u64::MAX);
        assert_eq!(
            session.generate_retrying(&request, 3).err(),
            Some(CompositionError::Unsatisfiable { attempts: 3 })
        );
    }
}
