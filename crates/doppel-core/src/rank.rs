//! Similarity ranking — order the gallery against a query embedding.

use thiserror::Error;

use crate::gallery::Gallery;
use crate::types::{Embedding, RankedMatch};

#[derive(Error, Debug, PartialEq)]
pub enum RankError {
    #[error("cannot rank against an empty gallery")]
    EmptyGallery,
    #[error("query embedding has {probe} dimensions but the gallery uses {gallery}")]
    DimensionMismatch { probe: usize, gallery: usize },
}

/// Convert a cosine similarity in [-1, 1] to a percentage rounded to two
/// decimals, half away from zero (`f64::round`).
pub fn round_percent(similarity: f32) -> f32 {
    ((f64::from(similarity) * 100.0 * 100.0).round() / 100.0) as f32
}

/// Score every gallery entry against the probe and return the top `k`
/// matches, sorted by similarity descending.
///
/// The probe must have the gallery's dimensionality; a mismatched probe
/// (wrong embedding model) is rejected rather than scored. The sort is
/// stable: entries with equal scores keep their gallery order, so
/// repeated calls always produce identical output. Returns
/// `min(k, gallery.len())` matches.
pub fn rank(
    probe: &Embedding,
    gallery: &Gallery,
    k: usize,
) -> Result<Vec<RankedMatch>, RankError> {
    if gallery.is_empty() {
        return Err(RankError::EmptyGallery);
    }
    let dimension = gallery.dimension().unwrap_or(0);
    if probe.values.len() != dimension {
        return Err(RankError::DimensionMismatch {
            probe: probe.values.len(),
            gallery: dimension,
        });
    }

    let mut scored: Vec<(usize, f32)> = gallery
        .entries()
        .iter()
        .enumerate()
        .map(|(index, entry)| (index, probe.similarity(&entry.embedding)))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    Ok(scored
        .into_iter()
        .take(k)
        .map(|(index, similarity)| RankedMatch {
            name: gallery.entries()[index].name.clone(),
            similarity_percent: round_percent(similarity),
        })
        .collect())
}
