//! # Metadata
//!
//! Rarity scoring and the public metadata document of a generated artifact.

use crate::{Catalog, CompositionError, ContentAddress, ResolvedTraitSet};
use serde::{Deserialize, Serialize};

/// Rarity points of a resolved set.
///
/// Each slot scores `round(10 × tier.code / n)`, where `n` is the number of
/// distinct tiers among the leaf traits of the slot's part; halves round to
/// even. The set scores the sum. Higher tier codes are rarer and score more.
#[must_use]
pub fn rarity_score(set: &ResolvedTraitSet, catalog: &Catalog) -> u32 {
    set.slots()
        .filter_map(|slot| {
            let tier = catalog.tier(slot.tier)?;
            let tiers = catalog.part_tier_count(slot.part).max(1) as u32;
            Some(slot_points(tier.code, tiers))
        })
        .fold(0u32, u32::saturating_add)
}

/// `round(10 × code / tiers)` with ties to even, in integers.
fn slot_points(code: u32, tiers: u32) -> u32 {
    let scaled = code.saturating_mul(10);
    let quotient = scaled / tiers;
    let twice_remainder = (scaled % tiers) * 2;
    let round_up = twice_remainder > tiers || (twice_remainder == tiers && quotient % 2 == 1);
    quotient + u32::from(round_up)
}

/// One `{trait_type, value}` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub trait_type: String,
    pub value: String,
}

/// The JSON document published next to the image.
///
/// Field order is fixed by declaration order, so the serialized bytes (and
/// the address derived from them) are stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub name: String,
    pub description: String,
    pub image: String,
    pub edition: u64,
    pub rarity_score: u32,
    pub properties: Vec<Property>,
}

/// Naming used when building documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub collection_name: String,
    pub description: String,
    /// Prepended to the image address, e.g. `ipfs://`.
    pub image_uri_prefix: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            collection_name: "Traitsmith".to_string(),
            description: String::new(),
            image_uri_prefix: "ipfs://".to_string(),
        }
    }
}

impl MetadataDocument {
    /// Build the document for `set`, whose image is stored at `image`.
    ///
    /// Properties follow part type code order; colored slots add a
    /// `"<Part> color"` property right after their trait.
    pub fn build(
        set: &ResolvedTraitSet,
        catalog: &Catalog,
        image: &ContentAddress,
        edition: u64,
        config: &MetadataConfig,
    ) -> Result<Self, CompositionError> {
        let mut slots = Vec::with_capacity(set.len());
        for slot in set.slots() {
            let part = catalog.part_type(slot.part).ok_or_else(|| {
                CompositionError::Serialization(format!("unknown part type {}", slot.part.0))
            })?;
            let instance = catalog
                .trait_instance(slot.assignment.trait_id)
                .ok_or_else(|| {
                    CompositionError::Serialization(format!("unknown {}", slot.assignment))
                })?;
            let color = slot
                .assignment
                .color
                .and_then(|id| catalog.color(id))
                .map(|c| c.hex.clone());
            slots.push((part, instance, color));
        }
        slots.sort_by(|(a, ..), (b, ..)| a.code.cmp(&b.code));

        let mut properties = Vec::with_capacity(slots.len() * 2);
        for (part, instance, color) in slots {
            properties.push(Property {
                trait_type: part.name.clone(),
                value: instance.name.clone(),
            });
            if let Some(hex) = color {
                properties.push(Property {
                    trait_type: format!("{} color", part.name),
                    value: hex,
                });
            }
        }

        Ok(Self {
            name: format!("{} #{}", config.collection_name, edition),
            description: config.description.clone(),
            image: format!("{}{}", config.image_uri_prefix, image),
            edition,
            rarity_score: rarity_score(set, catalog),
            properties,
        })
    }

    /// Serialized JSON bytes, the input to content addressing.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CompositionError> {
        serde_json::to_vec(self).map_err(|e| CompositionError::Serialization(e.to_string()))
    }
}
