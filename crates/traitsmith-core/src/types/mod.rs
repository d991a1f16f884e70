//! # Core Type Definitions
//!
//! This module contains all core types for the Traitsmith engine:
//! - Catalog identifiers (`RarityId`, `PartTypeId`, `TraitId`, `ColorId`)
//! - Catalog entities (`RarityTier`, `PartType`, `TraitInstance`, `ColorOption`)
//! - Dependency graph vocabulary (`Assignment`, `DependencyEdge`)
//! - Per-run output (`ResolvedSlot`, `ResolvedTraitSet`)
//! - Error types (`CatalogError`, `CompositionError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (percentages are basis points)
//! - Implement `Ord` where they key a `BTreeMap`/`BTreeSet`
//! - Are plain values: entities refer to each other by id, never by pointer

use crate::primitives::FULL_PERCENTAGE_BPS;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

// =============================================================================
// CATALOG IDENTIFIERS
// =============================================================================

/// Identifier of a rarity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RarityId(pub u32);

/// Identifier of a part type (a slot that receives exactly one trait).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartTypeId(pub u32);

/// Identifier of a trait instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraitId(pub u32);

/// Identifier of a color option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColorId(pub u32);

// =============================================================================
// PERCENTAGE (fixed point)
// =============================================================================

/// A rarity weight in basis points (hundredths of a percent).
///
/// `Percentage` is always within `0..=10000`. Catalog sources declare
/// percentages as decimals; they are rounded to the nearest basis point
/// once, at load time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Percentage(u32);

impl Percentage {
    /// Create a percentage from basis points. Returns `None` above 100%.
    #[must_use]
    pub const fn from_bps(bps: u32) -> Option<Self> {
        if bps <= FULL_PERCENTAGE_BPS {
            Some(Self(bps))
        } else {
            None
        }
    }

    /// Convert a decimal percentage (`0.0..=100.0`) to basis points.
    ///
    /// Returns `None` for values outside the range and for NaN/infinity.
    #[allow(clippy::float_arithmetic)]
    #[must_use]
    pub fn from_percent(value: f64) -> Option<Self> {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return None;
        }
        Self::from_bps((value * 100.0).round() as u32)
    }

    /// Raw basis points.
    #[must_use]
    pub const fn bps(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// CATALOG ENTITIES
// =============================================================================

/// A probability-weighted category that traits and colors belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RarityTier {
    pub id: RarityId,
    /// Ordinal code; higher codes denote rarer tiers and score higher.
    pub code: u32,
    pub name: String,
    pub percentage: Percentage,
    /// Only active tiers take part in sampling.
    pub active: bool,
}

/// A named slot that receives exactly one resolved trait per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartType {
    pub id: PartTypeId,
    pub code: String,
    pub name: String,
    /// Whether the slot also receives a color option.
    pub colored: bool,
    /// Compositing depth; lower layers are drawn first.
    pub layer: u32,
}

/// A concrete option for a part type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitInstance {
    pub id: TraitId,
    pub code: String,
    pub name: String,
    pub part_type: PartTypeId,
    pub rarity: RarityId,
    /// The more general trait this one specializes.
    pub parent: Option<TraitId>,
    /// Reference to the layer artwork, if the trait is drawn.
    pub content_ref: Option<String>,
}

/// A fill or accent choice, optionally scoped to a part type and/or tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorOption {
    pub id: ColorId,
    pub hex: String,
    pub part_type: Option<PartTypeId>,
    pub rarity: Option<RarityId>,
}

impl ColorOption {
    /// Whether this color may accompany a trait of `part` drawn from `tier`.
    #[must_use]
    pub fn is_eligible(&self, part: PartTypeId, tier: RarityId) -> bool {
        self.part_type.is_none_or(|p| p == part) && self.rarity.is_none_or(|r| r == tier)
    }
}

// =============================================================================
// DEPENDENCY GRAPH VOCABULARY
// =============================================================================

/// A (trait, color) pairing eligible for composition.
///
/// This is the node type of the dependency graph. Non-colored slots carry
/// `color: None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub trait_id: TraitId,
    pub color: Option<ColorId>,
}

impl Assignment {
    /// An assignment without a color.
    #[must_use]
    pub const fn plain(trait_id: TraitId) -> Self {
        Self {
            trait_id,
            color: None,
        }
    }

    /// An assignment with a color.
    #[must_use]
    pub const fn colored(trait_id: TraitId, color: ColorId) -> Self {
        Self {
            trait_id,
            color: Some(color),
        }
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.color {
            Some(color) => write!(f, "trait#{}/color#{}", self.trait_id.0, color.0),
            None => write!(f, "trait#{}", self.trait_id.0),
        }
    }
}

/// "Choosing `from` forces `to` to also be chosen."
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: Assignment,
    pub to: Assignment,
}

// =============================================================================
// RESOLVED OUTPUT
// =============================================================================

/// How a slot came to be fixed during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotOrigin {
    /// Drawn by the rarity sampler.
    Sampled,
    /// Supplied by the caller.
    Pinned,
    /// Forced by a dependency edge reachable from `by`.
    Forced { by: Assignment },
}

/// One fixed slot of a resolved trait set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSlot {
    pub part: PartTypeId,
    pub assignment: Assignment,
    /// Tier of the chosen trait.
    pub tier: RarityId,
    pub origin: SlotOrigin,
    /// The drawn tier had no candidate and a neighbouring tier was used.
    pub fallback: bool,
}

/// The output of one generation run.
///
/// Maps every required part type (plus any part type reached by forced
/// dependency edges) to exactly one assignment. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTraitSet {
    seed: u64,
    slots: BTreeMap<PartTypeId, ResolvedSlot>,
}

impl ResolvedTraitSet {
    /// Build a set from fixed slots.
    #[must_use]
    pub fn new(seed: u64, slots: BTreeMap<PartTypeId, ResolvedSlot>) -> Self {
        Self { seed, slots }
    }

    /// The seed that produced this set.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The slot fixed for a part type.
    #[must_use]
    pub fn get(&self, part: PartTypeId) -> Option<&ResolvedSlot> {
        self.slots.get(&part)
    }

    /// All slots, ordered by part type id.
    pub fn slots(&self) -> impl Iterator<Item = &ResolvedSlot> {
        self.slots.values()
    }

    /// Whether the set contains this exact assignment.
    #[must_use]
    pub fn contains(&self, assignment: &Assignment) -> bool {
        self.slots.values().any(|s| s.assignment == *assignment)
    }

    /// Every rarity tier touched by the set.
    #[must_use]
    pub fn tiers(&self) -> BTreeSet<RarityId> {
        self.slots.values().map(|s| s.tier).collect()
    }

    /// Number of fixed slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the set has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Catalog integrity errors.
///
/// Fatal and never retryable: a catalog that fails any check is refused
/// and no generation request may run against it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The catalog source could not be read or parsed.
    #[error("Catalog source error: {0}")]
    Source(String),

    /// A percentage is outside `[0, 100]` or not a number.
    #[error("Rarity tier {tier:?} has invalid percentage {value}")]
    InvalidPercentage { tier: RarityId, value: String },

    /// Active tier percentages do not sum to 100 within epsilon.
    #[error("Active rarity percentages sum to {sum_bps} bps, expected 10000 ± 1")]
    PercentageSum { sum_bps: u32 },

    /// No tier is active, so nothing can be sampled.
    #[error("Catalog declares no active rarity tier")]
    NoActiveTiers,

    /// Two records of the same kind share an id.
    #[error("Duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u32 },

    /// Two records of the same kind share a code.
    #[error("Duplicate {kind} code '{code}'")]
    DuplicateCode { kind: &'static str, code: String },

    /// A record refers to an id that does not exist.
    #[error("{kind} {id} references unknown {target} {target_id}")]
    UnknownReference {
        kind: &'static str,
        id: u32,
        target: &'static str,
        target_id: u32,
    },

    /// A code or name is empty or too long.
    #[error("Invalid {kind} code '{code}'")]
    InvalidCode { kind: &'static str, code: String },

    /// A trait's parent belongs to a different part type.
    #[error("Trait {child:?} specializes {parent:?} from a different part type")]
    ForeignParent { child: TraitId, parent: TraitId },

    /// A parent chain loops back on itself.
    #[error("Trait {0:?} has a cyclic parent chain")]
    ParentCycle(TraitId),

    /// A dependency edge points at a trait that has specializations.
    #[error("Dependency edge endpoint {0:?} is not a leaf trait")]
    NonLeafTarget(TraitId),

    /// A dependency endpoint pairs a trait with a color it may not carry.
    #[error("Dependency endpoint {0} has an ineligible color")]
    IneligibleColor(Assignment),

    /// An assignment transitively forces two different assignments for one part.
    #[error("{origin} forces both {first} and {second} for part type {part:?}")]
    ContradictoryDependency {
        origin: Assignment,
        part: PartTypeId,
        first: Assignment,
        second: Assignment,
    },
}

/// Errors reported to callers of a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositionError {
    /// The catalog failed validation (fatal).
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// No valid combination within the backtrack budget (retryable).
    #[error("No valid combination within budget ({backtracks} backtracks, {conflicts} conflicts)")]
    Exhausted { backtracks: usize, conflicts: usize },

    /// Every retry seed exhausted; the constraints are likely too restrictive.
    #[error("Exhausted {attempts} seeds without a valid combination")]
    Unsatisfiable { attempts: u32 },

    /// The request named no part types.
    #[error("No part types requested")]
    NoPartTypes,

    /// The request exceeds a size limit.
    #[error("Request too large: {0}")]
    RequestTooLarge(String),

    /// A requested part type code does not exist.
    #[error("Unknown part type '{0}'")]
    UnknownPartType(String),

    /// A part type was requested twice.
    #[error("Part type '{0}' requested more than once")]
    DuplicatePartType(String),

    /// A pinned trait code does not exist.
    #[error("Unknown trait '{0}'")]
    UnknownTrait(String),

    /// A pinned color hex does not exist.
    #[error("Unknown color '{0}'")]
    UnknownColor(String),

    /// A pin is malformed or contradicts another pin.
    #[error("Invalid pin: {0}")]
    InvalidPin(String),

    /// Canonical encoding failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CompositionError {
    /// Whether the caller may retry the run with a new seed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

// =============================================================================
// TESTS
// =============================================================================
