//! Match pipeline — ranking plus best-effort enrichment.
//!
//! One `assemble()` call runs the whole request: load (cached) gallery,
//! embed the query, rank, resolve the top match's reference image, then
//! run four independent enrichment calls. Matching is authoritative and
//! fails the request; enrichment degrades per-field to an empty result.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::gallery::{GalleryError, GalleryStore};
use crate::rank::{rank, RankError};
use crate::types::MatchReport;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("gallery unavailable: {0}")]
    Gallery(#[from] GalleryError),
    #[error("failed to compute query embedding: {0}")]
    Embedding(#[from] AnalyzerError),
    #[error("no match found: gallery has no usable entries")]
    NoMatch,
    #[error("ranking failed: {0}")]
    Ranking(RankError),
}

impl From<RankError> for MatchError {
    fn from(err: RankError) -> Self {
        match err {
            RankError::EmptyGallery => MatchError::NoMatch,
            RankError::DimensionMismatch { .. } => MatchError::Ranking(err),
        }
    }
}

/// Maps a matched identity to its canonical reference image.
///
/// Injectable so the storage layout can change without touching the
/// pipeline. No existence check: a missing file surfaces as degraded
/// enrichment, not a fatal error.
pub trait ReferenceResolver: Send + Sync {
    fn resolve(&self, name: &str) -> PathBuf;
}

/// Default layout: one image per identity in a flat directory,
/// `{root}/{name}.{extension}`.
pub struct FlatDirResolver {
    root: PathBuf,
    extension: String,
}

impl FlatDirResolver {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }
}

impl ReferenceResolver for FlatDirResolver {
    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{}", self.extension))
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Number of ranked matches to return (capped at the gallery size).
    pub top_k: usize,
    /// Per-call bound on each enrichment call; a timed-out call degrades
    /// to an empty result like any other enrichment failure.
    pub enrichment_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            enrichment_timeout: Duration::from_secs(15),
        }
    }
}

/// The matching-and-enrichment core, entry point for the I/O boundary.
pub struct MatchPipeline {
    store: Arc<GalleryStore>,
    analyzer: Arc<dyn FaceAnalyzer>,
    resolver: Box<dyn ReferenceResolver>,
    options: PipelineOptions,
}

impl MatchPipeline {
    pub fn new(
        store: Arc<GalleryStore>,
        analyzer: Arc<dyn FaceAnalyzer>,
        resolver: Box<dyn ReferenceResolver>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            analyzer,
            resolver,
            options,
        }
    }

    /// Run one match request against the query image.
    ///
    /// Fatal: gallery load failure, query embedding failure, empty
    /// gallery. Everything after ranking is best-effort.
    pub async fn assemble(&self, query: &Path) -> Result<MatchReport, MatchError> {
        let gallery = self.store.get()?;
        let probe = self.analyzer.embedding(query).await?;
        let top_k_matches = rank(&probe, &gallery, self.options.top_k)?;
        let top_match = top_k_matches.first().cloned().ok_or(MatchError::NoMatch)?;

        let celeb_image = self.resolver.resolve(&top_match.name);
        tracing::debug!(
            top = %top_match.name,
            similarity_percent = top_match.similarity_percent,
            reference = %celeb_image.display(),
            "ranking complete, enriching"
        );

        // Four independent enrichment calls; each failure is isolated.
        let (user_attributes, celeb_attributes, user_landmarks, celeb_landmarks) = tokio::join!(
            self.degrade("attributes", query, self.analyzer.attributes(query)),
            self.degrade("attributes", &celeb_image, self.analyzer.attributes(&celeb_image)),
            self.degrade("landmarks", query, self.analyzer.landmarks(query)),
            self.degrade("landmarks", &celeb_image, self.analyzer.landmarks(&celeb_image)),
        );

        Ok(MatchReport {
            top_match,
            top_k_matches,
            user_attributes,
            celeb_attributes,
            user_landmarks,
            celeb_landmarks,
        })
    }

    /// Uniform enrichment fault isolation: bound the call by the
    /// configured timeout and replace any failure with the empty result.
    async fn degrade<T, F>(&self, what: &str, image: &Path, call: F) -> T
    where
        T: Default,
        F: Future<Output = Result<T, AnalyzerError>>,
    {
        match tokio::time::timeout(self.options.enrichment_timeout, call).await {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                tracing::warn!(
                    kind = what,
                    image = %image.display(),
                    error = %err,
                    "enrichment failed, degrading to empty"
                );
                T::default()
            }
            Err(_) => {
                tracing::warn!(
                    kind = what,
                    image = %image.display(),
                    timeout_ms = self.options.enrichment_timeout.as_millis() as u64,
                    "enrichment timed out, degrading to empty"
                );
                T::default()
            }
        }
    }
}
