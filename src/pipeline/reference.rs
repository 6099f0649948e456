//! Labelled reference embeddings and nearest-label lookup.

use crate::error::{PipelineError, Result};
use crate::pipeline::types::ReferenceItem;

/// Cosine similarity. Zero when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}

/// The reference set, kept apart from the corpus.
#[derive(Debug, Default)]
pub struct ReferenceSet {
    items: Vec<ReferenceItem>,
    dimension: Option<usize>,
}

/// Result of a nearest-label lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosestMatch<'a> {
    pub index: usize,
    pub label: &'a str,
    pub similarity: f32,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, label: impl Into<String>, embedding: Vec<f32>) -> Result<()> {
        if embedding.is_empty() {
            return Err(PipelineError::DimensionMismatch {
                expected: self.dimension.unwrap_or(1),
                actual: 0,
            });
        }
        if let Some(expected) = self.dimension {
            if embedding.len() != expected {
                return Err(PipelineError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }
        self.dimension = Some(embedding.len());
        self.items.push(ReferenceItem {
            label: label.into(),
            embedding,
        });
        Ok(())
    }

    /// The most similar reference item. Ties go to the earliest inserted item.
    pub fn closest(&self, query: &[f32]) -> Result<ClosestMatch<'_>> {
        if self.items.is_empty() {
            return Err(PipelineError::EmptyReferenceSet);
        }
        if let Some(expected) = self.dimension {
            if query.len() != expected {
                return Err(PipelineError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }

        let mut best = 0;
        let mut best_similarity = f32::NEG_INFINITY;
        for (i, item) in self.items.iter().enumerate() {
            let similarity = cosine_similarity(query, &item.embedding);
            if similarity > best_similarity {
                best = i;
                best_similarity = similarity;
            }
        }

        Ok(ClosestMatch {
            index: best,
            label: &self.items[best].label,
            similarity: best_similarity,
        })
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.dimension = None;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ReferenceItem] {
        &self.items
    }
}
