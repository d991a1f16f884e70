//! # Catalog
//!
//! The immutable, validated index of everything a generation run can draw.
//!
//! `Catalog::load` pulls records from a [`CatalogSource`], validates them and
//! builds every lookup index once. All integrity failures are reported here,
//! at load time, so a run never discovers a malformed catalog mid-flight.
//!
//! Storage is arena-style: entities live in `BTreeMap`s keyed by integer id
//! and refer to each other only by id.

use crate::primitives::{FULL_PERCENTAGE_BPS, MAX_CODE_LENGTH, PERCENTAGE_EPSILON_BPS};
use crate::resolver::DependencyGraph;
use crate::sampler::TierTable;
use crate::source::{CatalogRecords, CatalogSource};
use crate::{
    Assignment, CatalogError, ColorId, ColorOption, DependencyEdge, PartType, PartTypeId,
    Percentage, RarityId, RarityTier, TraitId, TraitInstance,
};
use std::collections::{BTreeMap, BTreeSet};

/// Validated, read-only catalog shared across generation runs.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Tiers in declaration order.
    tiers: Vec<RarityTier>,
    tier_index: BTreeMap<RarityId, usize>,
    part_types: BTreeMap<PartTypeId, PartType>,
    part_codes: BTreeMap<String, PartTypeId>,
    traits: BTreeMap<TraitId, TraitInstance>,
    trait_codes: BTreeMap<String, TraitId>,
    colors: BTreeMap<ColorId, ColorOption>,
    /// Leaf traits by part type, then tier, in declaration order.
    leaves: BTreeMap<PartTypeId, BTreeMap<RarityId, Vec<TraitId>>>,
    /// Eligible colors of colored part types by (part, tier).
    tier_colors: BTreeMap<(PartTypeId, RarityId), Vec<ColorId>>,
    parents: BTreeSet<TraitId>,
    tier_table: TierTable,
    graph: DependencyGraph,
}

impl Catalog {
    /// Fetch records from `source`, validate them and build the indices.
    pub fn load<S: CatalogSource + ?Sized>(source: &S) -> Result<Self, CatalogError> {
        let records = source.fetch()?;
        let catalog = Self::from_records(records)?;

        tracing::info!(
            tiers = catalog.tiers.len(),
            part_types = catalog.part_types.len(),
            traits = catalog.traits.len(),
            colors = catalog.colors.len(),
            edges = catalog.graph.edge_count(),
            "Catalog loaded"
        );

        Ok(catalog)
    }

    fn from_records(records: CatalogRecords) -> Result<Self, CatalogError> {
        let (tiers, tier_index) = load_tiers(&records)?;

        let active: Vec<&RarityTier> = tiers.iter().filter(|t| t.active).collect();
        let sum: u32 = active.iter().map(|t| t.percentage.bps()).sum();
        let tier_table = TierTable::build(&active).ok_or(CatalogError::NoActiveTiers)?;
        if sum.abs_diff(FULL_PERCENTAGE_BPS) > PERCENTAGE_EPSILON_BPS {
            return Err(CatalogError::PercentageSum { sum_bps: sum });
        }

        let (part_types, part_codes) = load_part_types(&records)?;
        let colors = load_colors(&records, &part_types, &tier_index)?;
        let (traits, trait_codes) = load_traits(&records, &part_types, &tier_index)?;
        let parents = check_parent_chains(&traits)?;

        let mut leaves: BTreeMap<PartTypeId, BTreeMap<RarityId, Vec<TraitId>>> = BTreeMap::new();
        for record in &records.traits {
            let id = TraitId(record.id);
            if parents.contains(&id) {
                continue;
            }
            leaves
                .entry(PartTypeId(record.part_type_id))
                .or_default()
                .entry(RarityId(record.rarity_id))
                .or_default()
                .push(id);
        }

        let mut tier_colors: BTreeMap<(PartTypeId, RarityId), Vec<ColorId>> = BTreeMap::new();
        for part in part_types.values().filter(|p| p.colored) {
            for tier in &tiers {
                let eligible: Vec<ColorId> = colors
                    .values()
                    .filter(|c| c.is_eligible(part.id, tier.id))
                    .map(|c| c.id)
                    .collect();
                if !eligible.is_empty() {
                    tier_colors.insert((part.id, tier.id), eligible);
                }
            }
        }

        let mut catalog = Self {
            tiers,
            tier_index,
            part_types,
            part_codes,
            traits,
            trait_codes,
            colors,
            leaves,
            tier_colors,
            parents,
            tier_table,
            graph: DependencyGraph::default(),
        };

        let edges = catalog.load_edges(&records)?;
        let graph = DependencyGraph::build(&edges, |a| {
            catalog
                .traits
                .get(&a.trait_id)
                .map(|t| t.part_type)
                .unwrap_or(PartTypeId(0))
        });
        graph.check_consistency()?;
        catalog.graph = graph;

        Ok(catalog)
    }

    fn load_edges(&self, records: &CatalogRecords) -> Result<Vec<DependencyEdge>, CatalogError> {
        records
            .dependencies
            .iter()
            .map(|d| -> Result<DependencyEdge, CatalogError> {
                let from = Assignment {
                    trait_id: TraitId(d.from_trait),
                    color: d.from_color.map(ColorId),
                };
                let to = Assignment {
                    trait_id: TraitId(d.to_trait),
                    color: d.to_color.map(ColorId),
                };
                self.check_endpoint(&from)?;
                self.check_endpoint(&to)?;
                Ok(DependencyEdge { from, to })
            })
            .collect()
    }

    fn check_endpoint(&self, endpoint: &Assignment) -> Result<(), CatalogError> {
        let instance = self.traits.get(&endpoint.trait_id).ok_or(
            CatalogError::UnknownReference {
                kind: "dependency",
                id: endpoint.trait_id.0,
                target: "trait",
                target_id: endpoint.trait_id.0,
            },
        )?;
        if let Some(color) = endpoint.color
            && !self.colors.contains_key(&color)
        {
            return Err(CatalogError::UnknownReference {
                kind: "dependency",
                id: endpoint.trait_id.0,
                target: "color",
                target_id: color.0,
            });
        }
        if !self.is_leaf(endpoint.trait_id) {
            return Err(CatalogError::NonLeafTarget(endpoint.trait_id));
        }
        if !self.accepts_color(instance, endpoint.color) {
            return Err(CatalogError::IneligibleColor(*endpoint));
        }
        Ok(())
    }

    /// Whether `color` may accompany `instance`: required and eligible on
    /// colored parts, absent on the others.
    #[must_use]
    pub fn accepts_color(&self, instance: &TraitInstance, color: Option<ColorId>) -> bool {
        let colored = self
            .part_types
            .get(&instance.part_type)
            .map(|p| p.colored)
            .unwrap_or(false);
        match (colored, color) {
            (false, None) => true,
            (true, Some(color)) => self
                .colors
                .get(&color)
                .is_some_and(|c| c.is_eligible(instance.part_type, instance.rarity)),
            _ => false,
        }
    }

    // =========================================================================
    // LOOKUPS
    // =========================================================================

    /// All tiers in declaration order.
    pub fn tiers(&self) -> impl Iterator<Item = &RarityTier> {
        self.tiers.iter()
    }

    /// Active tiers in declaration order.
    pub fn active_tiers(&self) -> impl Iterator<Item = &RarityTier> {
        self.tiers.iter().filter(|t| t.active)
    }

    /// Number of active tiers.
    #[must_use]
    pub fn active_tier_count(&self) -> usize {
        self.active_tiers().count()
    }

    #[must_use]
    pub fn tier(&self, id: RarityId) -> Option<&RarityTier> {
        self.tier_index.get(&id).and_then(|&i| self.tiers.get(i))
    }

    /// All part types, ordered by id.
    pub fn part_types(&self) -> impl Iterator<Item = &PartType> {
        self.part_types.values()
    }

    #[must_use]
    pub fn part_type(&self, id: PartTypeId) -> Option<&PartType> {
        self.part_types.get(&id)
    }

    #[must_use]
    pub fn part_type_by_code(&self, code: &str) -> Option<&PartType> {
        self.part_codes
            .get(code)
            .and_then(|id| self.part_types.get(id))
    }

    /// All traits, ordered by id.
    pub fn traits(&self) -> impl Iterator<Item = &TraitInstance> {
        self.traits.values()
    }

    #[must_use]
    pub fn trait_instance(&self, id: TraitId) -> Option<&TraitInstance> {
        self.traits.get(&id)
    }

    #[must_use]
    pub fn trait_by_code(&self, code: &str) -> Option<&TraitInstance> {
        self.trait_codes.get(code).and_then(|id| self.traits.get(id))
    }

    /// All colors, ordered by id.
    pub fn colors(&self) -> impl Iterator<Item = &ColorOption> {
        self.colors.values()
    }

    #[must_use]
    pub fn color(&self, id: ColorId) -> Option<&ColorOption> {
        self.colors.get(&id)
    }

    /// Whether no other trait specializes `id`.
    #[must_use]
    pub fn is_leaf(&self, id: TraitId) -> bool {
        self.traits.contains_key(&id) && !self.parents.contains(&id)
    }

    /// Leaf traits of `part` declared in `tier`.
    #[must_use]
    pub fn leaves(&self, part: PartTypeId, tier: RarityId) -> &[TraitId] {
        self.leaves
            .get(&part)
            .and_then(|by_tier| by_tier.get(&tier))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct tiers among the leaf traits of `part`.
    #[must_use]
    pub fn part_tier_count(&self, part: PartTypeId) -> usize {
        self.leaves.get(&part).map_or(0, BTreeMap::len)
    }

    /// Colors eligible for traits of a colored `part` drawn from `tier`.
    #[must_use]
    pub fn eligible_colors(&self, part: PartTypeId, tier: RarityId) -> &[ColorId] {
        self.tier_colors
            .get(&(part, tier))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct candidates the sampler can offer for `part`
    /// across the active tiers.
    #[must_use]
    pub fn branching_factor(&self, part: PartTypeId) -> usize {
        let colored = self.part_type(part).map(|p| p.colored).unwrap_or(false);
        self.active_tiers()
            .map(|tier| {
                let leaves = self.leaves(part, tier.id).len();
                if colored {
                    leaves * self.eligible_colors(part, tier.id).len()
                } else {
                    leaves
                }
            })
            .sum()
    }

    /// The cumulative weight table over active tiers.
    #[must_use]
    pub fn tier_table(&self) -> &TierTable {
        &self.tier_table
    }

    /// The forced-edge graph.
    #[must_use]
    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.graph
    }
}

// =============================================================================
// RECORD VALIDATION
// =============================================================================

fn check_code(kind: &'static str, code: &str) -> Result<(), CatalogError> {
    if code.trim().is_empty() || code.len() > MAX_CODE_LENGTH {
        return Err(CatalogError::InvalidCode {
            kind,
            code: code.to_string(),
        });
    }
    Ok(())
}

fn load_tiers(
    records: &CatalogRecords,
) -> Result<(Vec<RarityTier>, BTreeMap<RarityId, usize>), CatalogError> {
    let mut tiers = Vec::with_capacity(records.rarities.len());
    let mut index = BTreeMap::new();

    for record in &records.rarities {
        let id = RarityId(record.id);
        let percentage =
            Percentage::from_percent(record.percentage).ok_or_else(|| {
                CatalogError::InvalidPercentage {
                    tier: id,
                    value: record.percentage.to_string(),
                }
            })?;
        if index.insert(id, tiers.len()).is_some() {
            return Err(CatalogError::DuplicateId {
                kind: "rarity",
                id: record.id,
            });
        }
        tiers.push(RarityTier {
            id,
            code: record.code,
            name: record.name.clone(),
            percentage,
            active: record.active,
        });
    }

    Ok((tiers, index))
}

type PartIndex = (BTreeMap<PartTypeId, PartType>, BTreeMap<String, PartTypeId>);

fn load_part_types(records: &CatalogRecords) -> Result<PartIndex, CatalogError> {
    let mut parts = BTreeMap::new();
    let mut codes = BTreeMap::new();

    for record in &records.part_types {
        check_code("part type", &record.code)?;
        let id = PartTypeId(record.id);
        if codes.insert(record.code.clone(), id).is_some() {
            return Err(CatalogError::DuplicateCode {
                kind: "part type",
                code: record.code.clone(),
            });
        }
        let part = PartType {
            id,
            code: record.code.clone(),
            name: record.name.clone(),
            colored: record.colored,
            layer: record.layer,
        };
        if parts.insert(id, part).is_some() {
            return Err(CatalogError::DuplicateId {
                kind: "part type",
                id: record.id,
            });
        }
    }

    Ok((parts, codes))
}

fn load_colors(
    records: &CatalogRecords,
    parts: &BTreeMap<PartTypeId, PartType>,
    tiers: &BTreeMap<RarityId, usize>,
) -> Result<BTreeMap<ColorId, ColorOption>, CatalogError> {
    let mut colors = BTreeMap::new();

    for record in &records.colors {
        check_code("color", &record.hex)?;
        if let Some(part) = record.part_type_id
            && !parts.contains_key(&PartTypeId(part))
        {
            return Err(CatalogError::UnknownReference {
                kind: "color",
                id: record.id,
                target: "part type",
                target_id: part,
            });
        }
        if let Some(tier) = record.rarity_id
            && !tiers.contains_key(&RarityId(tier))
        {
            return Err(CatalogError::UnknownReference {
                kind: "color",
                id: record.id,
                target: "rarity",
                target_id: tier,
            });
        }
        let color = ColorOption {
            id: ColorId(record.id),
            hex: record.hex.clone(),
            part_type: record.part_type_id.map(PartTypeId),
            rarity: record.rarity_id.map(RarityId),
        };
        if colors.insert(color.id, color).is_some() {
            return Err(CatalogError::DuplicateId {
                kind: "color",
                id: record.id,
            });
        }
    }

    Ok(colors)
}

type TraitIndex = (BTreeMap<TraitId, TraitInstance>, BTreeMap<String, TraitId>);

fn load_traits(
    records: &CatalogRecords,
    parts: &BTreeMap<PartTypeId, PartType>,
    tiers: &BTreeMap<RarityId, usize>,
) -> Result<TraitIndex, CatalogError> {
    let mut traits = BTreeMap::new();
    let mut codes = BTreeMap::new();

    for record in &records.traits {
        check_code("trait", &record.code)?;
        if !parts.contains_key(&PartTypeId(record.part_type_id)) {
            return Err(CatalogError::UnknownReference {
                kind: "trait",
                id: record.id,
                target: "part type",
                target_id: record.part_type_id,
            });
        }
        if !tiers.contains_key(&RarityId(record.rarity_id)) {
            return Err(CatalogError::UnknownReference {
                kind: "trait",
                id: record.id,
                target: "rarity",
                target_id: record.rarity_id,
            });
        }
        let id = TraitId(record.id);
        if codes.insert(record.code.clone(), id).is_some() {
            return Err(CatalogError::DuplicateCode {
                kind: "trait",
                code: record.code.clone(),
            });
        }
        let instance = TraitInstance {
            id,
            code: record.code.clone(),
            name: record.name.clone(),
            part_type: PartTypeId(record.part_type_id),
            rarity: RarityId(record.rarity_id),
            parent: record.parent_id.map(TraitId),
            content_ref: record.content_ref.clone(),
        };
        if traits.insert(id, instance).is_some() {
            return Err(CatalogError::DuplicateId {
                kind: "trait",
                id: record.id,
            });
        }
    }

    Ok((traits, codes))
}

/// Verify every parent reference and return the set of traits that have
/// at least one specialization.
fn check_parent_chains(
    traits: &BTreeMap<TraitId, TraitInstance>,
) -> Result<BTreeSet<TraitId>, CatalogError> {
    let mut parents = BTreeSet::new();

    for instance in traits.values() {
        let Some(parent_id) = instance.parent else {
            continue;
        };
        let parent = traits
            .get(&parent_id)
            .ok_or(CatalogError::UnknownReference {
                kind: "trait",
                id: instance.id.0,
                target: "parent trait",
                target_id: parent_id.0,
            })?;
        if parent.part_type != instance.part_type {
            return Err(CatalogError::ForeignParent {
                child: instance.id,
                parent: parent_id,
            });
        }
        parents.insert(parent_id);
    }

    // Walk each chain; a chain longer than the trait count must loop.
    for start in traits.values() {
        let mut seen = BTreeSet::new();
        let mut current = Some(start.id);
        while let Some(id) = current {
            if !seen.insert(id) {
                return Err(CatalogError::ParentCycle(start.id));
            }
            current = traits.get(&id).and_then(|t| t.parent);
        }
    }

    Ok(parents)
}

// =============================================================================
// TESTS
// =============================================================================
