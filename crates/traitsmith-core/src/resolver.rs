//! # Dependency Graph Resolver
//!
//! Forced co-selection rules between (trait, color) assignments.
//!
//! The graph is arena-backed: assignments live in a flat node table and
//! edges are adjacency lists of node indices. Nothing holds a reference to
//! anything else, so the graph is trivially `Send + Sync` and lives inside
//! the immutable [`Catalog`](crate::Catalog).
//!
//! Resolution is a breadth-first walk of forced edges from a candidate,
//! bounded by a visited set, so every call touches each node at most once.

use crate::{Assignment, CatalogError, DependencyEdge, PartTypeId, ResolvedSlot};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

// =============================================================================
// FIXED SLOTS
// =============================================================================

/// Read access to the slots already fixed in a run.
pub trait FixedSlots {
    /// The assignment fixed for `part`, if any.
    fn fixed(&self, part: PartTypeId) -> Option<Assignment>;
}

impl FixedSlots for BTreeMap<PartTypeId, Assignment> {
    fn fixed(&self, part: PartTypeId) -> Option<Assignment> {
        self.get(&part).copied()
    }
}

impl FixedSlots for BTreeMap<PartTypeId, ResolvedSlot> {
    fn fixed(&self, part: PartTypeId) -> Option<Assignment> {
        self.get(&part).map(|slot| slot.assignment)
    }
}

// =============================================================================
// DEPENDENCY GRAPH
// =============================================================================

#[derive(Debug, Clone)]
struct GraphNode {
    assignment: Assignment,
    part: PartTypeId,
}

/// Adjacency-list graph of forced edges keyed by assignment.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<GraphNode>,
    index: BTreeMap<Assignment, usize>,
    forced: Vec<Vec<usize>>,
    edge_count: usize,
}

impl DependencyGraph {
    /// Build the graph from validated edges.
    ///
    /// `part_of` yields the part type of every endpoint; the catalog has
    /// already checked that each endpoint's trait exists.
    pub(crate) fn build<F>(edges: &[DependencyEdge], part_of: F) -> Self
    where
        F: Fn(&Assignment) -> PartTypeId,
    {
        let mut graph = Self::default();
        let mut seen = BTreeSet::new();

        for edge in edges {
            if !seen.insert(*edge) {
                continue;
            }
            let from = graph.node_for(edge.from, &part_of);
            let to = graph.node_for(edge.to, &part_of);
            if let Some(targets) = graph.forced.get_mut(from) {
                targets.push(to);
                graph.edge_count += 1;
            }
        }

        graph
    }

    fn node_for<F>(&mut self, assignment: Assignment, part_of: &F) -> usize
    where
        F: Fn(&Assignment) -> PartTypeId,
    {
        if let Some(&idx) = self.index.get(&assignment) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(GraphNode {
            assignment,
            part: part_of(&assignment),
        });
        self.forced.push(Vec::new());
        self.index.insert(assignment, idx);
        idx
    }

    /// Number of assignments that appear in at least one edge.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of distinct forced edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Assignments directly forced by `from`, in declaration order.
    pub fn forced_by(&self, from: &Assignment) -> impl Iterator<Item = &Assignment> + '_ {
        self.index
            .get(from)
            .and_then(|&idx| self.forced.get(idx))
            .into_iter()
            .flatten()
            .filter_map(|&to| self.nodes.get(to).map(|n| &n.assignment))
    }

    /// Assignments appearing in the graph, ordered by assignment.
    pub fn assignments(&self) -> impl Iterator<Item = (&Assignment, PartTypeId)> + '_ {
        self.index
            .iter()
            .filter_map(|(a, &idx)| self.nodes.get(idx).map(|n| (a, n.part)))
    }

    /// Breadth-first closure of forced edges from `start`.
    ///
    /// Stops at the first part type that would receive two different
    /// assignments, counting both `fixed` slots and the closure itself.
    fn walk<S: FixedSlots + ?Sized>(
        &self,
        start: Assignment,
        start_part: PartTypeId,
        fixed: &S,
    ) -> Result<Vec<ForcedAddition>, Conflict> {
        if let Some(existing) = fixed.fixed(start_part)
            && existing != start
        {
            return Err(Conflict {
                candidate: start,
                part: start_part,
                fixed: existing,
                wanted: start,
            });
        }

        let Some(&origin) = self.index.get(&start) else {
            return Ok(Vec::new());
        };

        let mut tentative: BTreeMap<PartTypeId, Assignment> = BTreeMap::new();
        tentative.insert(start_part, start);

        let mut additions = Vec::new();
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        visited.insert(origin);
        queue.push_back(origin);

        while let Some(current) = queue.pop_front() {
            let Some(targets) = self.forced.get(current) else {
                continue;
            };

            for &next in targets {
                if !visited.insert(next) {
                    continue;
                }
                let Some(node) = self.nodes.get(next) else {
                    continue;
                };

                if let Some(existing) = fixed.fixed(node.part) {
                    if existing != node.assignment {
                        return Err(Conflict {
                            candidate: start,
                            part: node.part,
                            fixed: existing,
                            wanted: node.assignment,
                        });
                    }
                } else if let Some(&pending) = tentative.get(&node.part) {
                    if pending != node.assignment {
                        return Err(Conflict {
                            candidate: start,
                            part: node.part,
                            fixed: pending,
                            wanted: node.assignment,
                        });
                    }
                } else {
                    tentative.insert(node.part, node.assignment);
                    additions.push(ForcedAddition {
                        part: node.part,
                        assignment: node.assignment,
                    });
                }

                queue.push_back(next);
            }
        }

        Ok(additions)
    }

    /// Check that no assignment transitively forces two different
    /// assignments for one part type (its own part included).
    pub(crate) fn check_consistency(&self) -> Result<(), CatalogError> {
        let empty: BTreeMap<PartTypeId, Assignment> = BTreeMap::new();
        for node in &self.nodes {
            if let Err(conflict) = self.walk(node.assignment, node.part, &empty) {
                return Err(CatalogError::ContradictoryDependency {
                    origin: node.assignment,
                    part: conflict.part,
                    first: conflict.fixed,
                    second: conflict.wanted,
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// An assignment for another part type that a candidate forces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForcedAddition {
    pub part: PartTypeId,
    pub assignment: Assignment,
}

/// Why a candidate cannot join the partial set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict {
    /// The rejected candidate.
    pub candidate: Assignment,
    /// The part type that would be overwritten.
    pub part: PartTypeId,
    /// What that part is already fixed to.
    pub fixed: Assignment,
    /// What the candidate's closure wants there.
    pub wanted: Assignment,
}

/// Result of resolving one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// Compatible. Lists the not-yet-fixed assignments that must now be
    /// fixed as well, in breadth-first order.
    Accepted(Vec<ForcedAddition>),
    /// Incompatible with something already fixed.
    Conflict(Conflict),
}

/// Resolves candidates against a partial trait set.
#[derive(Debug, Clone, Copy)]
pub struct DependencyResolver<'c> {
    graph: &'c DependencyGraph,
}

impl<'c> DependencyResolver<'c> {
    #[must_use]
    pub fn new(graph: &'c DependencyGraph) -> Self {
        Self { graph }
    }

    /// Resolve `candidate` for `part` against the slots fixed so far.
    pub fn resolve<S: FixedSlots + ?Sized>(
        &self,
        candidate: Assignment,
        part: PartTypeId,
        fixed: &S,
    ) -> ResolutionOutcome {
        match self.graph.walk(candidate, part, fixed) {
            Ok(additions) => ResolutionOutcome::Accepted(additions),
            Err(conflict) => {
                tracing::trace!(
                    candidate = %conflict.candidate,
                    part = conflict.part.0,
                    fixed = %conflict.fixed,
                    wanted = %conflict.wanted,
                    "Dependency conflict"
                );
                ResolutionOutcome::Conflict(conflict)
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TraitId;

    // Traits 1x belong to part 1, 2x to part 2, 3x to part 3.
    fn part_of(a: &Assignment) -> PartTypeId {
        PartTypeId(a.trait_id.0 / 10)
    }

    fn a(id: u32) -> Assignment {
        Assignment::plain(TraitId(id))
    }

    fn edge(from: u32, to: u32) -> DependencyEdge {
        DependencyEdge {
            from: a(from),
            to: a(to),
        }
    }

    #[test]
    fn unconnected_candidate_is_accepted_without_additions() {
        let graph = DependencyGraph::build(&[edge(11, 21)], part_of);
        let resolver = DependencyResolver::new(&graph);
        let fixed: BTreeMap<PartTypeId, Assignment> = BTreeMap::new();

        assert_eq!(
            resolver.resolve(a(12), PartTypeId(1), &fixed),
            ResolutionOutcome::Accepted(Vec::new())
        );
    }

    #[test]
    fn transitive_closure_is_breadth_first() {
        let graph = DependencyGraph::build(&[edge(11, 21), edge(21, 31)], part_of);
        let resolver = DependencyResolver::new(&graph);
        let fixed: BTreeMap<PartTypeId, Assignment> = BTreeMap::new();

        let outcome = resolver.resolve(a(11), PartTypeId(1), &fixed);
        assert_eq!(
            outcome,
            ResolutionOutcome::Accepted(vec![
                ForcedAddition {
                    part: PartTypeId(2),
                    assignment: a(21)
                },
                ForcedAddition {
                    part: PartTypeId(3),
                    assignment: a(31)
                },
            ])
        );
    }

    #[test]
    fn conflict_when_forced_part_fixed_differently() {
        let graph = DependencyGraph::build(&[edge(11, 21)], part_of);
        let resolver = DependencyResolver::new(&graph);
        let mut fixed = BTreeMap::new();
        fixed.insert(PartTypeId(2), a(22));

        let outcome = resolver.resolve(a(11), PartTypeId(1), &fixed);
        assert_eq!(
            outcome,
            ResolutionOutcome::Conflict(Conflict {
                candidate: a(11),
                part: PartTypeId(2),
                fixed: a(22),
                wanted: a(21),
            })
        );
    }

    #[test]
    fn already_satisfied_target_is_not_repeated() {
        let graph = DependencyGraph::build(&[edge(11, 21)], part_of);
        let resolver = DependencyResolver::new(&graph);
        let mut fixed = BTreeMap::new();
        fixed.insert(PartTypeId(2), a(21));

        assert_eq!(
            resolver.resolve(a(11), PartTypeId(1), &fixed),
            ResolutionOutcome::Accepted(Vec::new())
        );
    }

    #[test]
    fn cycles_terminate() {
        let graph = DependencyGraph::build(&[edge(11, 21), edge(21, 11)], part_of);
        let resolver = DependencyResolver::new(&graph);
        let fixed: BTreeMap<PartTypeId, Assignment> = BTreeMap::new();

        let outcome = resolver.resolve(a(11), PartTypeId(1), &fixed);
        assert_eq!(
            outcome,
            ResolutionOutcome::Accepted(vec![ForcedAddition {
                part: PartTypeId(2),
                assignment: a(21)
            }])
        );
        assert!(graph.check_consistency().is_ok());
    }

    #[test]
    fn contradictory_closure_detected() {
        // 11 forces 21 and 31; 31 forces 22: part 2 gets both 21 and 22.
        let graph = DependencyGraph::build(&[edge(11, 21), edge(11, 31), edge(31, 22)], part_of);
        let err = graph.check_consistency().expect_err("must be contradictory");
        assert!(matches!(
            err,
            CatalogError::ContradictoryDependency { origin, part, .. }
                if origin == a(11) && part == PartTypeId(2)
        ));
    }

    #[test]
    fn forcing_a_sibling_of_self_is_contradictory() {
        let graph = DependencyGraph::build(&[edge(11, 21), edge(21, 12)], part_of);
        assert!(graph.check_consistency().is_err());
    }

    #[test]
    fn duplicate_edges_collapse() {
        let graph = DependencyGraph::build(&[edge(11, 21), edge(11, 21)], part_of);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.forced_by(&a(11)).count(), 1);
    }
}
