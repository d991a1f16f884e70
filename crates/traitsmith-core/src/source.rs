//! # Catalog Source
//!
//! Pull-only read interface to the catalog's persistence collaborator.
//!
//! A `CatalogSource` hands back every raw record in one shot. Records are
//! plain keyed rows with integer foreign keys and decimal percentages,
//! exactly as a relational store or a TOML/JSON file would hold them.
//! Nothing is validated here; [`Catalog::load`](crate::Catalog::load) does
//! that.

use crate::CatalogError;
use serde::{Deserialize, Serialize};

/// Read interface returning every catalog record.
///
/// The engine never writes through a source.
pub trait CatalogSource {
    /// Fetch all records.
    fn fetch(&self) -> Result<CatalogRecords, CatalogError>;
}

/// Raw rarity tier row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarityRecord {
    pub id: u32,
    pub code: u32,
    pub name: String,
    /// Decimal percentage, `0.0..=100.0`.
    pub percentage: f64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl RarityRecord {
    #[must_use]
    pub fn new(id: u32, code: u32, name: &str, percentage: f64) -> Self {
        Self {
            id,
            code,
            name: name.to_string(),
            percentage,
            active: true,
        }
    }

    /// Mark the tier inactive.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Raw part type row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartTypeRecord {
    pub id: u32,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub colored: bool,
    #[serde(default)]
    pub layer: u32,
}

impl PartTypeRecord {
    #[must_use]
    pub fn new(id: u32, code: &str, layer: u32) -> Self {
        Self {
            id,
            code: code.to_string(),
            name: code.to_string(),
            colored: false,
            layer,
        }
    }

    /// Mark the part type as receiving a color.
    #[must_use]
    pub fn colored(mut self) -> Self {
        self.colored = true;
        self
    }
}

/// Raw trait row. `parent_id` is a self-reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitRecord {
    pub id: u32,
    pub code: String,
    pub name: String,
    pub part_type_id: u32,
    pub rarity_id: u32,
    #[serde(default)]
    pub parent_id: Option<u32>,
    #[serde(default)]
    pub content_ref: Option<String>,
}

impl TraitRecord {
    #[must_use]
    pub fn new(id: u32, code: &str, part_type_id: u32, rarity_id: u32) -> Self {
        Self {
            id,
            code: code.to_string(),
            name: code.to_string(),
            part_type_id,
            rarity_id,
            parent_id: None,
            content_ref: None,
        }
    }

    /// Image layer drawn for this trait.
    #[must_use]
    pub fn with_content_ref(mut self, content_ref: &str) -> Self {
        self.content_ref = Some(content_ref.to_string());
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: u32) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Raw color row. Both scopes are optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRecord {
    pub id: u32,
    pub hex: String,
    #[serde(default)]
    pub part_type_id: Option<u32>,
    #[serde(default)]
    pub rarity_id: Option<u32>,
}

impl ColorRecord {
    #[must_use]
    pub fn new(id: u32, hex: &str) -> Self {
        Self {
            id,
            hex: hex.to_string(),
            part_type_id: None,
            rarity_id: None,
        }
    }

    #[must_use]
    pub fn for_part(mut self, part_type_id: u32) -> Self {
        self.part_type_id = Some(part_type_id);
        self
    }

    #[must_use]
    pub fn for_rarity(mut self, rarity_id: u32) -> Self {
        self.rarity_id = Some(rarity_id);
        self
    }
}

/// Raw dependency row: choosing `(from_trait, from_color)` forces
/// `(to_trait, to_color)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub from_trait: u32,
    #[serde(default)]
    pub from_color: Option<u32>,
    pub to_trait: u32,
    #[serde(default)]
    pub to_color: Option<u32>,
}

impl DependencyRecord {
    /// Uncolored edge between two traits.
    #[must_use]
    pub fn new(from_trait: u32, to_trait: u32) -> Self {
        Self {
            from_trait,
            from_color: None,
            to_trait,
            to_color: None,
        }
    }
}

/// Every record a catalog is built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecords {
    #[serde(default)]
    pub rarities: Vec<RarityRecord>,
    #[serde(default)]
    pub part_types: Vec<PartTypeRecord>,
    #[serde(default)]
    pub traits: Vec<TraitRecord>,
    #[serde(default)]
    pub colors: Vec<ColorRecord>,
    #[serde(default)]
    pub dependencies: Vec<DependencyRecord>,
}

impl CatalogRecords {
    /// Parse records from a JSON document.
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        serde_json::from_str(text).map_err(|e| CatalogError::Source(e.to_string()))
    }
}

impl CatalogSource for CatalogRecords {
    fn fetch(&self) -> Result<CatalogRecords, CatalogError> {
        Ok(self.clone())
    }
}
