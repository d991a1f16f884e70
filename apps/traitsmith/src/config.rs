//! # Configuration
//!
//! The optional `traitsmith.toml` file and the file-backed catalog source.
//!
//! ```toml
//! [generation]
//! algorithm = "sha2-256"
//! budget_factor = 4
//! retry_seeds = 8
//!
//! [metadata]
//! collection_name = "Traitsmith"
//! image_uri_prefix = "ipfs://"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [storage]
//! path = "artifacts.redb"
//! ```
//!
//! Every key is optional. CLI flags override file values.

use crate::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use traitsmith_core::primitives::{DEFAULT_BUDGET_FACTOR, DEFAULT_RETRY_SEEDS};
use traitsmith_core::{
    ArtifactStore, CatalogError, CatalogRecords, CatalogSource, ComposerConfig, HashAlgorithm,
    MemoryStore, MetadataConfig, RedbStore, SessionConfig,
};

/// Config file read from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "traitsmith.toml";

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Maximum catalog file size (64 MB).
const MAX_CATALOG_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Store shared between request handlers.
pub type SharedStore = Arc<dyn ArtifactStore + Send + Sync>;

// =============================================================================
// CONFIG FILE
// =============================================================================

/// Parsed `traitsmith.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub generation: GenerationConfig,
    pub metadata: MetadataConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

/// `[generation]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub algorithm: HashAlgorithm,
    /// Fixed backtrack budget; derived from the catalog when unset.
    pub backtrack_budget: Option<usize>,
    pub budget_factor: usize,
    /// Seeds tried before a request is reported unsatisfiable.
    pub retry_seeds: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            backtrack_budget: None,
            budget_factor: DEFAULT_BUDGET_FACTOR,
            retry_seeds: DEFAULT_RETRY_SEEDS,
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Request body limit in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// `[storage]` section. Without a path artifacts live in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, AppError> {
        toml::from_str(text).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Load `path`, or `traitsmith.toml` if present, or the defaults.
    ///
    /// An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let text = read_limited(&path, MAX_CONFIG_FILE_SIZE).map_err(AppError::Io)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            composer: ComposerConfig {
                backtrack_budget: self.generation.backtrack_budget,
                budget_factor: self.generation.budget_factor,
            },
            algorithm: self.generation.algorithm,
            metadata: self.metadata.clone(),
        }
    }

    /// Open the configured artifact store.
    pub fn open_store(&self) -> Result<SharedStore, AppError> {
        match &self.storage.path {
            Some(path) => {
                tracing::info!(path = %path.display(), "Using redb artifact store");
                Ok(Arc::new(RedbStore::open(path)?))
            }
            None => {
                tracing::info!("Using in-memory artifact store");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }
}

// =============================================================================
// FILE CATALOG SOURCE
// =============================================================================

/// Catalog records read from a TOML or JSON file.
///
/// `.json` files are parsed as JSON; anything else as TOML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCatalogSource {
    path: PathBuf,
}

impl FileCatalogSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_json(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    }
}

impl CatalogSource for FileCatalogSource {
    fn fetch(&self) -> Result<CatalogRecords, CatalogError> {
        let text = read_limited(&self.path, MAX_CATALOG_FILE_SIZE).map_err(CatalogError::Source)?;
        if self.is_json() {
            CatalogRecords::from_json(&text)
        } else {
            toml::from_str(&text).map_err(|e| CatalogError::Source(e.to_string()))
        }
    }
}

/// Read a UTF-8 file after checking its size.
fn read_limited(path: &Path, max_size: u64) -> Result<String, String> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| format!("Cannot read '{}': {}", path.display(), e))?;
    if !metadata.is_file() {
        return Err(format!("'{}' is not a regular file", path.display()));
    }
    if metadata.len() > max_size {
        return Err(format!(
            "'{}' is {} bytes, maximum is {}",
            path.display(),
            metadata.len(),
            max_size
        ));
    }
    std::fs::read_to_string(path).map_err(|e| format!("Cannot read '{}': {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use traitsmith_core::Catalog;

    const CATALOG_TOML: &str = r##"
[[rarities]]
id = 1
code = 1
name = "Common"
percentage = 80.0

[[rarities]]
id = 2
code = 2
name = "Rare"
percentage = 20.0

[[part_types]]
id = 1
code = "face"
name = "Face"

[[part_types]]
id = 2
code = "shirt"
name = "Shirt"
colored = true
layer = 1

[[traits]]
id = 1
code = "F1"
name = "Smile"
part_type_id = 1
rarity_id = 1

[[traits]]
id = 2
code = "S1"
name = "Tee"
part_type_id = 2
rarity_id = 1

[[colors]]
id = 1
hex = "#ffffff"

[[dependencies]]
from_trait = 1
to_trait = 2
to_color = 1
"##;

    #[test]
    fn empty_config_is_default() {
        let config = AppConfig::from_toml_str("").expect("parse");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.generation.retry_seeds, DEFAULT_RETRY_SEEDS);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = AppConfig::from_toml_str(
            "[generation]\nbacktrack_budget = 12\n\n[metadata]\ncollection_name = \"Punks\"\n",
        )
        .expect("parse");
        assert_eq!(config.generation.backtrack_budget, Some(12));
        assert_eq!(config.generation.budget_factor, DEFAULT_BUDGET_FACTOR);
        assert_eq!(config.metadata.collection_name, "Punks");
        assert_eq!(config.metadata.image_uri_prefix, "ipfs://");

        let session = config.session_config();
        assert_eq!(session.composer.backtrack_budget, Some(12));
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(matches!(
            AppConfig::from_toml_str("[plugins]\nx = 1\n"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn toml_catalog_loads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, CATALOG_TOML).expect("write");

        let catalog = Catalog::load(&FileCatalogSource::new(&path)).expect("load");
        assert_eq!(catalog.active_tier_count(), 2);
        assert_eq!(catalog.dependency_graph().edge_count(), 1);
    }

    #[test]
    fn json_catalog_loads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("catalog.json");
        let records: CatalogRecords = toml::from_str(CATALOG_TOML).expect("toml");
        std::fs::write(&path, serde_json::to_string(&records).expect("json")).expect("write");

        let catalog = Catalog::load(&FileCatalogSource::new(&path)).expect("load");
        assert!(catalog.part_type_by_code("shirt").is_some());
    }

    #[test]
    fn demo_catalog_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/catalog.toml");
        let catalog = Catalog::load(&FileCatalogSource::new(path)).expect("demo catalog");
        assert_eq!(catalog.active_tier_count(), 3);
        assert_eq!(catalog.part_types().count(), 4);
        assert!(!catalog.is_leaf(traitsmith_core::TraitId(20)));
    }

    #[test]
    fn missing_catalog_is_a_source_error() {
        let source = FileCatalogSource::new("/nonexistent/catalog.toml");
        assert!(matches!(source.fetch(), Err(CatalogError::Source(_))));
    }
}
