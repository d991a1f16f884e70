//! # Rarity Sampler
//!
//! Weighted tier draws and uniform trait draws within a tier.
//!
//! The cumulative-weight table is built once when the catalog loads. A
//! draw is a uniform integer in `[0, total)` basis points; the sampled tier
//! is the first whose running sum exceeds it, in declaration order.
//!
//! When a tier has nothing to offer for a part type, the sampler degrades
//! deterministically along a fixed fallback chain and reports it.

use crate::{Assignment, Catalog, PartTypeId, RarityId, RarityTier, TraitId};
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// TIER TABLE
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct TierBound {
    upper: u32,
    tier: RarityId,
}

/// Cumulative weight table over the active tiers.
#[derive(Debug, Clone)]
pub struct TierTable {
    bounds: Vec<TierBound>,
    total: u32,
    last: RarityId,
    fallbacks: BTreeMap<RarityId, Vec<RarityId>>,
}

impl TierTable {
    /// Build from active tiers in declaration order.
    ///
    /// Returns `None` if `active` is empty.
    pub(crate) fn build(active: &[&RarityTier]) -> Option<Self> {
        let last = active.last()?.id;

        let mut bounds = Vec::with_capacity(active.len());
        let mut total: u32 = 0;
        for tier in active {
            total = total.saturating_add(tier.percentage.bps());
            bounds.push(TierBound {
                upper: total,
                tier: tier.id,
            });
        }

        let fallbacks = active
            .iter()
            .map(|tier| (tier.id, fallback_chain(tier, active)))
            .collect();

        Some(Self {
            bounds,
            total,
            last,
            fallbacks,
        })
    }

    /// Sum of active percentages in basis points.
    #[must_use]
    pub fn total_bps(&self) -> u32 {
        self.total
    }

    /// The tier whose cumulative interval contains `draw`.
    #[must_use]
    pub fn tier_for_draw(&self, draw: u32) -> RarityId {
        self.bounds
            .iter()
            .find(|b| b.upper > draw)
            .map(|b| b.tier)
            .unwrap_or(self.last)
    }

    /// Tiers tried, in order, when `tier` has no candidate.
    #[must_use]
    pub fn fallback_chain(&self, tier: RarityId) -> &[RarityId] {
        self.fallbacks.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Lower-or-equal tiers by descending percentage, then higher tiers by
/// ascending percentage. Ties keep declaration order.
fn fallback_chain(tier: &RarityTier, active: &[&RarityTier]) -> Vec<RarityId> {
    let pct = tier.percentage;
    let others = active.iter().enumerate().filter(|(_, t)| t.id != tier.id);

    let mut lower: Vec<(usize, &&RarityTier)> =
        others.clone().filter(|(_, t)| t.percentage <= pct).collect();
    lower.sort_by(|(ia, a), (ib, b)| b.percentage.cmp(&a.percentage).then(ia.cmp(ib)));

    let mut higher: Vec<(usize, &&RarityTier)> =
        others.filter(|(_, t)| t.percentage > pct).collect();
    higher.sort_by(|(ia, a), (ib, b)| a.percentage.cmp(&b.percentage).then(ia.cmp(ib)));

    lower
        .into_iter()
        .chain(higher)
        .map(|(_, t)| t.id)
        .collect()
}

// =============================================================================
// SAMPLER
// =============================================================================

/// A trait drawn for a part type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampledInstance {
    pub trait_id: TraitId,
    /// The tier the trait was actually taken from.
    pub tier: RarityId,
    /// The requested tier was empty for this part type.
    pub fallback: bool,
}

/// A full (trait, color) candidate for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub assignment: Assignment,
    pub tier: RarityId,
    pub fallback: bool,
}

/// Draws tiers, traits and colors from a catalog.
///
/// Holds no state of its own: the same catalog and the same RNG state
/// always yield the same draws.
#[derive(Debug, Clone, Copy)]
pub struct RaritySampler<'c> {
    catalog: &'c Catalog,
}

impl<'c> RaritySampler<'c> {
    #[must_use]
    pub fn new(catalog: &'c Catalog) -> Self {
        Self { catalog }
    }

    /// Draw an active tier according to its percentage.
    pub fn sample_tier<R: Rng>(&self, rng: &mut R) -> RarityId {
        let table = self.catalog.tier_table();
        let draw = rng.gen_range(0..table.total_bps());
        table.tier_for_draw(draw)
    }

    /// Uniform choice among the leaf traits of `part` in `tier`, degrading
    /// along the fallback chain when the tier has none.
    pub fn sample_instance<R: Rng>(
        &self,
        tier: RarityId,
        part: PartTypeId,
        rng: &mut R,
    ) -> Option<SampledInstance> {
        self.draw_from(tier, part, &BTreeSet::new(), rng)
            .map(|c| SampledInstance {
                trait_id: c.assignment.trait_id,
                tier: c.tier,
                fallback: c.fallback,
            })
    }

    /// Draw a tier, then a (trait, color) candidate for `part` that is not
    /// in `excluded`.
    ///
    /// Returns `None` once every candidate of every active tier has been
    /// excluded.
    pub fn sample_candidate<R: Rng>(
        &self,
        part: PartTypeId,
        excluded: &BTreeSet<Assignment>,
        rng: &mut R,
    ) -> Option<Candidate> {
        let tier = self.sample_tier(rng);
        self.draw_from(tier, part, excluded, rng)
    }

    fn draw_from<R: Rng>(
        &self,
        tier: RarityId,
        part: PartTypeId,
        excluded: &BTreeSet<Assignment>,
        rng: &mut R,
    ) -> Option<Candidate> {
        let chain = self.catalog.tier_table().fallback_chain(tier);

        for (step, &candidate_tier) in std::iter::once(&tier).chain(chain).enumerate() {
            let pool = self.open_candidates(part, candidate_tier, excluded);
            if pool.is_empty() {
                continue;
            }

            let (trait_id, colors) = pool.get(rng.gen_range(0..pool.len()))?;
            let assignment = if colors.is_empty() {
                Assignment::plain(*trait_id)
            } else {
                let color = colors.get(rng.gen_range(0..colors.len()))?;
                Assignment::colored(*trait_id, *color)
            };

            let fallback = step > 0;
            if fallback {
                tracing::debug!(
                    part = part.0,
                    requested = tier.0,
                    used = candidate_tier.0,
                    "Tier fallback"
                );
            }
            return Some(Candidate {
                assignment,
                tier: candidate_tier,
                fallback,
            });
        }

        None
    }

    /// Leaf traits with at least one untried assignment, each paired with
    /// its untried colors (empty for uncolored parts).
    fn open_candidates(
        &self,
        part: PartTypeId,
        tier: RarityId,
        excluded: &BTreeSet<Assignment>,
    ) -> Vec<(TraitId, Vec<crate::ColorId>)> {
        let colored = self
            .catalog
            .part_type(part)
            .map(|p| p.colored)
            .unwrap_or(false);
        let eligible = self.catalog.eligible_colors(part, tier);

        self.catalog
            .leaves(part, tier)
            .iter()
            .filter_map(|&trait_id| {
                if colored {
                    let open: Vec<_> = eligible
                        .iter()
                        .copied()
                        .filter(|&c| !excluded.contains(&Assignment::colored(trait_id, c)))
                        .collect();
                    (!open.is_empty()).then_some((trait_id, open))
                } else {
                    (!excluded.contains(&Assignment::plain(trait_id)))
                        .then_some((trait_id, Vec::new()))
                }
            })
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
