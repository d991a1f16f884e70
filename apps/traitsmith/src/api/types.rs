//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API. The CLI reuses
//! them for `--json` output.

use serde::{Deserialize, Serialize};
use traitsmith_core::{
    Catalog, GenerationOutcome, GenerationRequest, Pin, PublishedArtifact, SlotOrigin,
};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// CATALOG SUMMARY
// =============================================================================

/// One rarity tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierJson {
    pub code: u32,
    pub name: String,
    /// Hundredths of a percent.
    pub percentage_bps: u32,
    pub active: bool,
}

/// One part type with its trait count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartTypeJson {
    pub code: String,
    pub name: String,
    pub colored: bool,
    pub layer: u32,
    pub trait_count: usize,
}

/// Shape of the loaded catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSummary {
    pub tiers: Vec<TierJson>,
    pub part_types: Vec<PartTypeJson>,
    pub trait_count: usize,
    pub color_count: usize,
    pub edge_count: usize,
}

impl CatalogSummary {
    #[must_use]
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let tiers = catalog
            .tiers()
            .map(|t| TierJson {
                code: t.code,
                name: t.name.clone(),
                percentage_bps: t.percentage.bps(),
                active: t.active,
            })
            .collect();
        let part_types = catalog
            .part_types()
            .map(|p| PartTypeJson {
                code: p.code.clone(),
                name: p.name.clone(),
                colored: p.colored,
                layer: p.layer,
                trait_count: catalog.traits().filter(|t| t.part_type == p.id).count(),
            })
            .collect();

        Self {
            tiers,
            part_types,
            trait_count: catalog.traits().count(),
            color_count: catalog.colors().count(),
            edge_count: catalog.dependency_graph().edge_count(),
        }
    }
}

// =============================================================================
// GENERATE REQUEST/RESPONSE
// =============================================================================

/// Generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub parts: Vec<String>,
    pub seed: u64,
    #[serde(default)]
    pub pins: Vec<Pin>,
    /// Retry exhausted runs with derived seeds.
    #[serde(default)]
    pub retry: bool,
    /// Composite and store the artifact.
    #[serde(default)]
    pub publish: bool,
}

impl GenerateRequest {
    #[must_use]
    pub fn to_request(&self) -> GenerationRequest {
        GenerationRequest {
            parts: self.parts.clone(),
            seed: self.seed,
            pins: self.pins.clone(),
        }
    }
}

/// One resolved slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotJson {
    pub part: String,
    #[serde(rename = "trait")]
    pub trait_code: String,
    pub name: String,
    pub tier: String,
    pub color: Option<String>,
    /// `sampled`, `pinned` or `forced`.
    pub origin: String,
    pub fallback: bool,
}

/// Where a published artifact was stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedJson {
    pub image: String,
    pub metadata: String,
    pub edition: u64,
    pub newly_stored: bool,
}

impl From<&PublishedArtifact> for PublishedJson {
    fn from(artifact: &PublishedArtifact) -> Self {
        Self {
            image: artifact.image.to_string(),
            metadata: artifact.metadata.to_string(),
            edition: artifact.document.edition,
            newly_stored: artifact.image_receipt.newly_stored,
        }
    }
}

/// Generation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub seed: Option<u64>,
    pub address: Option<String>,
    #[serde(default)]
    pub traits: Vec<SlotJson>,
    pub rarity_score: Option<u32>,
    pub backtracks: Option<usize>,
    pub fallbacks: Option<usize>,
    pub published: Option<PublishedJson>,
    pub error: Option<String>,
}

impl GenerateResponse {
    /// Describe `outcome` in catalog terms.
    #[must_use]
    pub fn success(
        catalog: &Catalog,
        outcome: &GenerationOutcome,
        published: Option<&PublishedArtifact>,
    ) -> Self {
        let mut traits: Vec<SlotJson> = outcome
            .traits
            .slots()
            .map(|slot| {
                let instance = catalog.trait_instance(slot.assignment.trait_id);
                SlotJson {
                    part: catalog
                        .part_type(slot.part)
                        .map(|p| p.code.clone())
                        .unwrap_or_default(),
                    trait_code: instance.map(|t| t.code.clone()).unwrap_or_default(),
                    name: instance.map(|t| t.name.clone()).unwrap_or_default(),
                    tier: catalog
                        .tier(slot.tier)
                        .map(|t| t.name.clone())
                        .unwrap_or_default(),
                    color: slot
                        .assignment
                        .color
                        .and_then(|id| catalog.color(id))
                        .map(|c| c.hex.clone()),
                    origin: match slot.origin {
                        SlotOrigin::Sampled => "sampled",
                        SlotOrigin::Pinned => "pinned",
                        SlotOrigin::Forced { .. } => "forced",
                    }
                    .to_string(),
                    fallback: slot.fallback,
                }
            })
            .collect();
        traits.sort_by(|a, b| a.part.cmp(&b.part));

        Self {
            success: true,
            seed: Some(outcome.traits.seed()),
            address: Some(outcome.address.to_string()),
            traits,
            rarity_score: Some(outcome.rarity_score),
            backtracks: Some(outcome.report.backtracks),
            fallbacks: Some(outcome.report.fallbacks),
            published: published.map(PublishedJson::from),
            error: None,
        }
    }

    #[must_use]
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            seed: None,
            address: None,
            traits: Vec::new(),
            rarity_score: None,
            backtracks: None,
            fallbacks: None,
            published: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// ADDRESS REQUEST/RESPONSE
// =============================================================================

/// Address arbitrary bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressRequest {
    /// Base64-encoded payload.
    pub data: String,
    /// `sha2-256` (default) or `blake3`.
    #[serde(default)]
    pub algorithm: Option<String>,
}

/// Address response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressResponse {
    pub success: bool,
    pub address: Option<String>,
    pub algorithm: Option<String>,
    pub size: Option<usize>,
    pub error: Option<String>,
}

impl AddressResponse {
    #[must_use]
    pub fn success(address: String, algorithm: String, size: usize) -> Self {
        Self {
            success: true,
            address: Some(address),
            algorithm: Some(algorithm),
            size: Some(size),
            error: None,
        }
    }

    #[must_use]
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            address: None,
            algorithm: None,
            size: None,
            error: Some(msg.into()),
        }
    }
}
