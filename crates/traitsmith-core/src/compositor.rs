//! # Compositor Boundary
//!
//! Output assembly protocol toward the image compositor.
//!
//! The engine never touches pixels. It reduces a resolved trait set to an
//! ordered [`LayerStack`] of `(content reference, color)` pairs and hands
//! it to an [`ImageCompositor`], which returns flattened bytes in whatever
//! format it produces.

use crate::{Catalog, ResolvedTraitSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Compositor collaborator failure. Reported as-is; the engine never retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositorError {
    #[error("Layer content not found: {0}")]
    MissingLayer(String),

    #[error("Compositing failed: {0}")]
    Failed(String),
}

/// One drawable layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// Part type code the layer belongs to.
    pub part: String,
    pub content_ref: String,
    pub color: Option<String>,
    pub depth: u32,
}

/// Layers in drawing order (bottom first).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    /// Order the drawn slots of `set` by `(layer, part code)`.
    ///
    /// Traits without a content reference are not drawn.
    #[must_use]
    pub fn from_resolved(set: &ResolvedTraitSet, catalog: &Catalog) -> Self {
        let mut layers: Vec<Layer> = set
            .slots()
            .filter_map(|slot| {
                let part = catalog.part_type(slot.part)?;
                let instance = catalog.trait_instance(slot.assignment.trait_id)?;
                let content_ref = instance.content_ref.clone()?;
                Some(Layer {
                    part: part.code.clone(),
                    content_ref,
                    color: slot
                        .assignment
                        .color
                        .and_then(|id| catalog.color(id))
                        .map(|c| c.hex.clone()),
                    depth: part.layer,
                })
            })
            .collect();
        layers.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.part.cmp(&b.part)));
        Self { layers }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Flattens a layer stack into artifact bytes.
pub trait ImageCompositor {
    fn composite(&self, stack: &LayerStack) -> Result<Vec<u8>, CompositorError>;
}

/// Renders the layer stack itself as JSON.
///
/// Deterministic stand-in for a raster backend: the "image" is the exact
/// recipe a raster compositor would follow.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestCompositor;

impl ImageCompositor for ManifestCompositor {
    fn composite(&self, stack: &LayerStack) -> Result<Vec<u8>, CompositorError> {
        if stack.is_empty() {
            return Err(CompositorError::Failed("nothing to draw".to_string()));
        }
        serde_json::to_vec(stack).map_err(|e| CompositorError::Failed(e.to_string()))
    }
}
