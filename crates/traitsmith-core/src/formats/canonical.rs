//! # Canonical Trait-Set Format
//!
//! Bit-exact serialization of a resolved trait set.
//!
//! Format: Header (5 bytes) + postcard-serialized entries.
//! - 4 bytes: Magic ("TSRS")
//! - 1 byte: Version
//!
//! Entries are keyed by catalog codes rather than ids and sorted by part
//! type code, so the bytes depend only on what was chosen. The seed and
//! per-slot provenance are left out: two runs that pick the same traits
//! produce the same bytes, and therefore the same address.
//!
//! Decoding checks size and header before any payload is parsed.

use crate::primitives::{FORMAT_VERSION, HEADER_LEN, MAGIC_BYTES, MAX_CANONICAL_SIZE};
use crate::{Catalog, CompositionError, ResolvedTraitSet};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEADER
// =============================================================================

/// The header that precedes every canonical payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl CanonicalHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *MAGIC_BYTES,
            version: FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), CompositionError> {
        if &self.magic != MAGIC_BYTES {
            return Err(CompositionError::Serialization(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != FORMAT_VERSION {
            return Err(CompositionError::Serialization(format!(
                "Unsupported version: {} (expected {})",
                self.version, FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CompositionError> {
        let (Some(magic), Some(&version)) = (bytes.get(..4), bytes.get(4)) else {
            return Err(CompositionError::Serialization(
                "Header too short".to_string(),
            ));
        };
        let mut out = [0u8; 4];
        out.copy_from_slice(magic);
        Ok(Self {
            magic: out,
            version,
        })
    }
}

impl Default for CanonicalHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// CANONICAL TRAIT SET
// =============================================================================

/// One slot, by code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalEntry {
    pub part: String,
    pub trait_code: String,
    pub color: Option<String>,
}

/// A resolved trait set reduced to its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalTraitSet {
    pub entries: Vec<CanonicalEntry>,
}

impl CanonicalTraitSet {
    /// Reduce `set` to codes, sorted by part code.
    pub fn from_resolved(set: &ResolvedTraitSet, catalog: &Catalog) -> Result<Self, CompositionError> {
        let mut entries = set
            .slots()
            .map(|slot| -> Result<CanonicalEntry, CompositionError> {
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
                    .map(|id| {
                        catalog.color(id).map(|c| c.hex.clone()).ok_or_else(|| {
                            CompositionError::Serialization(format!("unknown color {}", id.0))
                        })
                    })
                    .transpose()?;
                Ok(CanonicalEntry {
                    part: part.code.clone(),
                    trait_code: instance.code.clone(),
                    color,
                })
            })
            .collect::<Result<Vec<_>, CompositionError>>()?;
        entries.sort();
        Ok(Self { entries })
    }
}

/// Serialize to header + payload. Pure transformation.
pub fn canonical_to_bytes(set: &CanonicalTraitSet) -> Result<Vec<u8>, CompositionError> {
    let payload =
        postcard::to_stdvec(set).map_err(|e| CompositionError::Serialization(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&CanonicalHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Parse canonical bytes, validating size and header first.
pub fn canonical_from_bytes(bytes: &[u8]) -> Result<CanonicalTraitSet, CompositionError> {
    if bytes.len() > MAX_CANONICAL_SIZE {
        return Err(CompositionError::Serialization(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_CANONICAL_SIZE
        )));
    }

    let header = CanonicalHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = bytes.get(HEADER_LEN..).unwrap_or(&[]);
    postcard::from_bytes(payload).map_err(|e| {
        CompositionError::Serialization(format!("Failed to decode trait set: {}", e))
    })
}

// =============================================================================
// TESTS
// =============================================================================
