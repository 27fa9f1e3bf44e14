//! doppel-core — celebrity look-alike matching pipeline.
//!
//! Loads a precomputed gallery of reference face embeddings, ranks it
//! against a query image by cosine similarity, and enriches the result
//! with best-effort attribute and landmark analysis.

pub mod analyzer;
pub mod gallery;
pub mod normalize;
pub mod pipeline;
pub mod rank;
pub mod types;

pub use analyzer::{AnalyzerError, FaceAnalyzer};
pub use gallery::{Gallery, GalleryError, GalleryStore};
pub use pipeline::{FlatDirResolver, MatchError, MatchPipeline, PipelineOptions, ReferenceResolver};
pub use rank::RankError;
pub use types::{AttributeSet, Embedding, LandmarkSet, MatchReport, Point, RankedMatch};
