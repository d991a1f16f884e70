//! # Trait Composer
//!
//! Drives the sampler and the resolver across every required slot of one
//! generation run.
//!
//! The run is an explicit state machine:
//!
//! ```text
//! Start → SamplingSlot(part) → Resolving(candidate) → SlotCommitted ─┐
//!              ↑                       │                              │
//!              └──── SlotConflict ←────┘                              │
//!              ↑                                                      │
//!              └──────────────────── next unfixed part ←──────────────┘
//!                                  ... → Complete | Exhausted
//! ```
//!
//! Slots are visited in ascending part type code. A conflict re-samples
//! only the current slot, excluding what it already tried. A slot with no
//! candidate left undoes the most recent commit (and its forced additions)
//! and retries that slot with its next candidate. Each undo counts against
//! the backtrack budget; running out yields `Exhausted`.

use crate::primitives::DEFAULT_BUDGET_FACTOR;
use crate::resolver::{DependencyResolver, ResolutionOutcome};
use crate::sampler::{Candidate, RaritySampler};
use crate::{
    Assignment, Catalog, CompositionError, PartTypeId, RarityId, ResolvedSlot, ResolvedTraitSet,
    SlotOrigin,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Backtrack budget settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposerConfig {
    /// Fixed budget. When unset the budget is derived from the catalog.
    pub backtrack_budget: Option<usize>,
    /// Multiplier for the derived budget.
    pub budget_factor: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            backtrack_budget: None,
            budget_factor: DEFAULT_BUDGET_FACTOR,
        }
    }
}

impl ComposerConfig {
    /// Budget for a run over `parts`: `factor × parts × average branching`,
    /// at least 1.
    #[must_use]
    pub fn budget_for(&self, catalog: &Catalog, parts: &[PartTypeId]) -> usize {
        if let Some(budget) = self.backtrack_budget {
            return budget.max(1);
        }
        if parts.is_empty() {
            return 1;
        }
        let branching: usize = parts.iter().map(|&p| catalog.branching_factor(p)).sum();
        let average = branching.div_ceil(parts.len()).max(1);
        self.budget_factor
            .saturating_mul(parts.len())
            .saturating_mul(average)
            .max(1)
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Where a run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerState {
    Start,
    SamplingSlot(PartTypeId),
    Resolving {
        part: PartTypeId,
        candidate: Assignment,
    },
    SlotCommitted(PartTypeId),
    SlotConflict {
        part: PartTypeId,
        candidate: Assignment,
    },
    Complete,
    Exhausted,
}

impl ComposerState {
    /// Whether the run has finished, successfully or not.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Exhausted)
    }
}

/// Counters describing how a run went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionReport {
    /// Committed slots undone.
    pub backtracks: usize,
    /// Candidates rejected by the resolver.
    pub conflicts: usize,
    /// Committed slots whose trait came from a fallback tier.
    pub fallbacks: usize,
    /// Backtrack budget the run had.
    pub budget: usize,
}

/// A finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub traits: ResolvedTraitSet,
    pub report: CompositionReport,
}

/// A committed sampled slot that may be undone.
#[derive(Debug, Clone)]
struct Frame {
    part: PartTypeId,
    chosen: Assignment,
    /// Parts fixed by this commit's forced additions.
    forced: Vec<PartTypeId>,
    /// Candidates tried for this slot before `chosen`.
    tried: BTreeSet<Assignment>,
    fallback: bool,
}

// =============================================================================
// TRAIT COMPOSER
// =============================================================================

/// One generation run's composer. Owns the partial trait set exclusively.
pub struct TraitComposer<'c> {
    catalog: &'c Catalog,
    sampler: RaritySampler<'c>,
    resolver: DependencyResolver<'c>,
    order: Vec<PartTypeId>,
    budget: usize,
    fixed: BTreeMap<PartTypeId, ResolvedSlot>,
    frames: Vec<Frame>,
    tried: BTreeSet<Assignment>,
    pending: Option<Candidate>,
    state: ComposerState,
    report: CompositionReport,
}

impl<'c> TraitComposer<'c> {
    /// Create a composer for `parts`. Parts are visited by ascending code.
    #[must_use]
    pub fn new(catalog: &'c Catalog, parts: &[PartTypeId], config: &ComposerConfig) -> Self {
        let mut order = parts.to_vec();
        order.sort_by(|a, b| {
            let code = |p: &PartTypeId| catalog.part_type(*p).map(|t| t.code.as_str());
            code(a).cmp(&code(b)).then(a.cmp(b))
        });
        order.dedup();

        let budget = config.budget_for(catalog, &order);
        Self {
            catalog,
            sampler: RaritySampler::new(catalog),
            resolver: DependencyResolver::new(catalog.dependency_graph()),
            order,
            budget,
            fixed: BTreeMap::new(),
            frames: Vec::new(),
            tried: BTreeSet::new(),
            pending: None,
            state: ComposerState::Start,
            report: CompositionReport {
                budget,
                ..CompositionReport::default()
            },
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ComposerState {
        self.state
    }

    /// Counters so far.
    #[must_use]
    pub fn report(&self) -> &CompositionReport {
        &self.report
    }

    /// Slot visiting order.
    #[must_use]
    pub fn order(&self) -> &[PartTypeId] {
        &self.order
    }

    /// Slots fixed so far.
    #[must_use]
    pub fn fixed(&self) -> &BTreeMap<PartTypeId, ResolvedSlot> {
        &self.fixed
    }

    /// Fix a caller-chosen assignment before sampling starts.
    ///
    /// Pins and their forced additions are never backtracked. A pin that
    /// contradicts an earlier pin fails with `InvalidPin`.
    pub fn pin(&mut self, part: PartTypeId, assignment: Assignment) -> Result<(), CompositionError> {
        if self.state != ComposerState::Start {
            return Err(CompositionError::InvalidPin(
                "pins must be set before sampling".to_string(),
            ));
        }
        let instance = self
            .catalog
            .trait_instance(assignment.trait_id)
            .ok_or_else(|| CompositionError::InvalidPin(format!("unknown {assignment}")))?;
        if instance.part_type != part {
            return Err(CompositionError::InvalidPin(format!(
                "{assignment} does not belong to part type {}",
                part.0
            )));
        }

        match self.resolver.resolve(assignment, part, &self.fixed) {
            ResolutionOutcome::Accepted(additions) => {
                self.fixed.insert(
                    part,
                    ResolvedSlot {
                        part,
                        assignment,
                        tier: instance.rarity,
                        origin: SlotOrigin::Pinned,
                        fallback: false,
                    },
                );
                for addition in additions {
                    self.fix_forced(addition.part, addition.assignment, assignment);
                }
                Ok(())
            }
            ResolutionOutcome::Conflict(conflict) => Err(CompositionError::InvalidPin(format!(
                "{} conflicts with {} already fixed for part type {}",
                conflict.candidate, conflict.fixed, conflict.part.0
            ))),
        }
    }

    fn fix_forced(&mut self, part: PartTypeId, assignment: Assignment, by: Assignment) {
        let tier = self
            .catalog
            .trait_instance(assignment.trait_id)
            .map(|t| t.rarity)
            .unwrap_or(RarityId(0));
        self.fixed.insert(
            part,
            ResolvedSlot {
                part,
                assignment,
                tier,
                origin: SlotOrigin::Forced { by },
                fallback: false,
            },
        );
    }

    fn next_slot(&self) -> ComposerState {
        self.order
            .iter()
            .find(|p| !self.fixed.contains_key(p))
            .map(|&p| ComposerState::SamplingSlot(p))
            .unwrap_or(ComposerState::Complete)
    }

    /// Advance the run by one transition.
    pub fn step(&mut self, rng: &mut ChaCha8Rng) -> ComposerState {
        self.state = match self.state {
            ComposerState::Start | ComposerState::SlotCommitted(_) => {
                self.tried.clear();
                self.next_slot()
            }
            ComposerState::SlotConflict { part, .. } => ComposerState::SamplingSlot(part),
            ComposerState::SamplingSlot(part) => {
                match self.sampler.sample_candidate(part, &self.tried, rng) {
                    Some(candidate) => {
                        self.pending = Some(candidate);
                        ComposerState::Resolving {
                            part,
                            candidate: candidate.assignment,
                        }
                    }
                    None => self.backtrack(part),
                }
            }
            ComposerState::Resolving { part, candidate } => self.resolve(part, candidate),
            terminal @ (ComposerState::Complete | ComposerState::Exhausted) => terminal,
        };
        self.state
    }

    fn resolve(&mut self, part: PartTypeId, candidate: Assignment) -> ComposerState {
        let Some(drawn) = self.pending.take() else {
            return ComposerState::SamplingSlot(part);
        };

        match self.resolver.resolve(candidate, part, &self.fixed) {
            ResolutionOutcome::Accepted(additions) => {
                self.fixed.insert(
                    part,
                    ResolvedSlot {
                        part,
                        assignment: candidate,
                        tier: drawn.tier,
                        origin: SlotOrigin::Sampled,
                        fallback: drawn.fallback,
                    },
                );
                let forced: Vec<PartTypeId> = additions.iter().map(|a| a.part).collect();
                for addition in additions {
                    self.fix_forced(addition.part, addition.assignment, candidate);
                }
                if drawn.fallback {
                    self.report.fallbacks += 1;
                }
                self.frames.push(Frame {
                    part,
                    chosen: candidate,
                    forced,
                    tried: std::mem::take(&mut self.tried),
                    fallback: drawn.fallback,
                });
                ComposerState::SlotCommitted(part)
            }
            ResolutionOutcome::Conflict(_) => {
                self.report.conflicts += 1;
                self.tried.insert(candidate);
                ComposerState::SlotConflict { part, candidate }
            }
        }
    }

    /// `part` has no candidate left: undo the latest commit and retry it.
    fn backtrack(&mut self, part: PartTypeId) -> ComposerState {
        if self.report.backtracks >= self.budget {
            tracing::debug!(part = part.0, budget = self.budget, "Backtrack budget spent");
            return ComposerState::Exhausted;
        }
        let Some(frame) = self.frames.pop() else {
            tracing::debug!(part = part.0, "No committed slot left to undo");
            return ComposerState::Exhausted;
        };

        self.report.backtracks += 1;
        self.fixed.remove(&frame.part);
        for forced in &frame.forced {
            self.fixed.remove(forced);
        }
        if frame.fallback {
            self.report.fallbacks = self.report.fallbacks.saturating_sub(1);
        }

        tracing::trace!(
            from = part.0,
            to = frame.part.0,
            undone = %frame.chosen,
            "Backtrack"
        );

        self.tried = frame.tried;
        self.tried.insert(frame.chosen);
        ComposerState::SamplingSlot(frame.part)
    }

    /// Run to completion with a fresh RNG seeded from `seed`.
    ///
    /// The stream is ChaCha8, whose output is fixed across library releases,
    /// so a stored seed regenerates the same set after dependency upgrades.
    pub fn compose(mut self, seed: u64) -> Result<Composition, CompositionError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        while !self.step(&mut rng).is_terminal() {}

        if self.state == ComposerState::Exhausted {
            return Err(CompositionError::Exhausted {
                backtracks: self.report.backtracks,
                conflicts: self.report.conflicts,
            });
        }

        tracing::debug!(
            seed,
            slots = self.fixed.len(),
            backtracks = self.report.backtracks,
            conflicts = self.report.conflicts,
            "Composition complete"
        );

        Ok(Composition {
            traits: ResolvedTraitSet::new(seed, self.fixed),
            report: self.report,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
