//! # traitsmith-core
//!
//! The deterministic trait-resolution engine for Traitsmith.
//!
//! Given a validated catalog of part types, trait instances, colors, rarity
//! tiers and dependency rules, the engine produces one internally consistent
//! trait set per seed, serializes it canonically and derives a content
//! address from the bytes.
//!
//! ## Pipeline
//!
//! ```text
//! CatalogSource ──► Catalog::load ──► GenerationSession::generate
//!                                         │
//!                     RaritySampler ◄── TraitComposer ──► DependencyResolver
//!                                         │
//!                      canonical bytes ──► ContentAddresser ──► address
//! ```
//!
//! `GenerationSession::publish` then hands the outcome to an
//! [`ImageCompositor`] and an [`ArtifactStore`].
//!
//! ## Constraints
//!
//! - Same catalog + same seed ⇒ bit-identical trait set and address
//! - Percentages are fixed-point basis points; no float touches sampling
//! - The catalog is immutable after load and shared across runs
//! - No async, no network dependencies

// =============================================================================
// MODULES
// =============================================================================

pub mod address;
pub mod catalog;
pub mod composer;
pub mod compositor;
pub mod formats;
pub mod metadata;
pub mod primitives;
pub mod resolver;
pub mod sampler;
pub mod session;
pub mod source;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Assignment, CatalogError, ColorId, ColorOption, CompositionError, DependencyEdge, PartType,
    PartTypeId, Percentage, RarityId, RarityTier, ResolvedSlot, ResolvedTraitSet, SlotOrigin,
    TraitId, TraitInstance,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use address::{AddressError, ContentAddress, ContentAddresser, HashAlgorithm};
pub use catalog::Catalog;
pub use composer::{
    ComposerConfig, ComposerState, Composition, CompositionReport, TraitComposer,
};
pub use resolver::{
    Conflict, DependencyGraph, DependencyResolver, FixedSlots, ForcedAddition, ResolutionOutcome,
};
pub use sampler::{Candidate, RaritySampler, SampledInstance, TierTable};
pub use session::{
    GenerationOutcome, GenerationRequest, GenerationSession, Pin, PublishError,
    PublishedArtifact, SessionConfig,
};
pub use source::{
    CatalogRecords, CatalogSource, ColorRecord, DependencyRecord, PartTypeRecord, RarityRecord,
    TraitRecord,
};

// =============================================================================
// RE-EXPORTS: Collaborators
// =============================================================================

pub use compositor::{CompositorError, ImageCompositor, Layer, LayerStack, ManifestCompositor};
pub use metadata::{MetadataConfig, MetadataDocument, Property, rarity_score};
pub use storage::{ArtifactStore, MemoryStore, RedbStore, StoreError, StoreReceipt};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{
    CanonicalEntry, CanonicalHeader, CanonicalTraitSet, canonical_from_bytes, canonical_to_bytes,
};
