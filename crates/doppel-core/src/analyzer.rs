//! Analyzer seam — contract for the external face-analysis service.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{AttributeSet, Embedding, LandmarkSet};

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("cannot read image {0}")]
    UnreadableImage(PathBuf),
    #[error("no face detected in {0}")]
    NoFaceDetected(PathBuf),
    #[error("analysis service returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("analysis request failed: {0}")]
    Transport(String),
    #[error("malformed analysis response: {0}")]
    MalformedResponse(String),
}

/// Face analysis collaborator: embeddings, attributes and landmarks.
///
/// Each call is independently fallible. Implementations are expected to
/// operate best-effort by default (proceed even when face detection is
/// low-confidence) unless configured to enforce detection.
#[async_trait]
pub trait FaceAnalyzer: Send + Sync {
    /// Compute the embedding for the (first) face in the image.
    async fn embedding(&self, image: &Path) -> Result<Embedding, AnalyzerError>;

    /// Analyze age, gender, dominant emotion and dominant race of the
    /// first face. An empty set means no face was found.
    async fn attributes(&self, image: &Path) -> Result<AttributeSet, AnalyzerError>;

    /// Detect the five facial keypoints of the first face. An empty set
    /// means no face was found.
    async fn landmarks(&self, image: &Path) -> Result<LandmarkSet, AnalyzerError>;
}
