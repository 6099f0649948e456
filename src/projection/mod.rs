//! Batch dimensionality reduction of the whole corpus to 2 or 3 dimensions.
//!
//! Projection is always a full recompute: the underlying algorithm has no
//! incremental update, so every corpus change requires a fresh [`project`] call.

pub mod pacmap;
pub mod pca;

pub use pacmap::PacmapProjector;

use crate::error::{PipelineError, Result};
use crate::pipeline::types::ProjectedPoint;

/// A batch projection algorithm.
pub trait Projector: Send + Sync {
    /// Fewest input vectors the algorithm accepts for a corpus of `n` items.
    fn min_samples(&self, n: usize) -> usize;

    /// Reduce `data` (N rows of equal length) to `target_dims` columns.
    /// Output rows must be index-aligned with the input.
    fn fit_transform(&self, data: &[&[f32]], target_dims: usize) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Project `embeddings` to `target_dims` (2 or 3), one point per input, in order.
pub fn project(
    projector: &dyn Projector,
    embeddings: &[&[f32]],
    target_dims: usize,
) -> Result<Vec<ProjectedPoint>> {
    if !(2..=3).contains(&target_dims) {
        return Err(PipelineError::InvalidProjectionDimension(target_dims));
    }

    let required = projector.min_samples(embeddings.len());
    if embeddings.len() < required {
        return Err(PipelineError::InsufficientSamples {
            required,
            actual: embeddings.len(),
        });
    }

    let coordinates = projector
        .fit_transform(embeddings, target_dims)
        .map_err(|e| PipelineError::Internal(format!("projection failed: {e:#}")))?;

    if coordinates.len() != embeddings.len() {
        return Err(PipelineError::Alignment(format!(
            "projector returned {} points for {} inputs",
            coordinates.len(),
            embeddings.len()
        )));
    }
    if let Some(bad) = coordinates.iter().find(|c| c.len() != target_dims) {
        return Err(PipelineError::Alignment(format!(
            "projector returned a {}-dimensional point, expected {target_dims}",
            bad.len()
        )));
    }

    Ok(coordinates
        .into_iter()
        .enumerate()
        .map(|(source_index, coordinates)| ProjectedPoint {
            coordinates,
            source_index,
        })
        .collect())
}
