//! Reference gallery — snapshot loading and process-wide shared store.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::types::Embedding;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("cannot read gallery snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed gallery snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("snapshot lists {names} names but {rows} embedding rows")]
    CountMismatch { names: usize, rows: usize },
    #[error("embedding for \"{name}\" has {got} dimensions, expected {expected}")]
    DimensionMismatch {
        name: String,
        got: usize,
        expected: usize,
    },
    #[error("snapshot entry {index} has an empty name")]
    EmptyName { index: usize },
}

/// On-disk gallery snapshot: parallel, index-aligned name and embedding
/// arrays, written by the offline embedding job.
#[derive(Debug, Deserialize)]
pub struct GallerySnapshot {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
    pub names: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
}

/// A single identity in the gallery.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub name: String,
    pub embedding: Embedding,
}

/// Validated, immutable reference gallery. Shared read-only across
/// requests; never mutated after load.
#[derive(Debug)]
pub struct Gallery {
    model: Option<String>,
    generated_at: Option<DateTime<Utc>>,
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    /// Validate a snapshot into a gallery. All-or-nothing: any structural
    /// defect rejects the whole snapshot.
    pub fn from_snapshot(snapshot: GallerySnapshot) -> Result<Self, GalleryError> {
        if snapshot.names.len() != snapshot.embeddings.len() {
            return Err(GalleryError::CountMismatch {
                names: snapshot.names.len(),
                rows: snapshot.embeddings.len(),
            });
        }

        let expected = snapshot.embeddings.first().map(Vec::len).unwrap_or(0);
        let mut entries = Vec::with_capacity(snapshot.names.len());

        for (index, (name, values)) in snapshot
            .names
            .into_iter()
            .zip(snapshot.embeddings)
            .enumerate()
        {
            if name.is_empty() {
                return Err(GalleryError::EmptyName { index });
            }
            if values.len() != expected {
                return Err(GalleryError::DimensionMismatch {
                    name,
                    got: values.len(),
                    expected,
                });
            }
            entries.push(GalleryEntry {
                name,
                embedding: Embedding {
                    values,
                    model_version: snapshot.model.clone(),
                },
            });
        }

        Ok(Gallery {
            model: snapshot.model,
            generated_at: snapshot.generated_at,
            entries,
        })
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimensionality, or None for an empty gallery.
    pub fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|e| e.embedding.values.len())
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn generated_at(&self) -> Option<DateTime<Utc>> {
        self.generated_at
    }
}

/// Lazily initialized, process-wide gallery store.
///
/// The first `get()` loads and caches the snapshot; later calls share the
/// same `Arc<Gallery>`. `reload()` re-reads the snapshot and atomically
/// swaps the shared reference, so in-flight requests keep the gallery
/// they started with.
pub struct GalleryStore {
    path: PathBuf,
    cached: RwLock<Option<Arc<Gallery>>>,
}

impl GalleryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: RwLock::new(None),
        }
    }

    /// Return the cached gallery, loading it on first use. A failed load
    /// caches nothing, so the next call retries.
    pub fn get(&self) -> Result<Arc<Gallery>, GalleryError> {
        if let Some(gallery) = self.cached.read().expect("gallery lock poisoned").as_ref() {
            return Ok(Arc::clone(gallery));
        }
        self.reload()
    }

    /// Load the snapshot from disk and atomically swap it in.
    pub fn reload(&self) -> Result<Arc<Gallery>, GalleryError> {
        let gallery = Arc::new(load_snapshot(&self.path)?);
        tracing::info!(
            path = %self.path.display(),
            entries = gallery.len(),
            dimension = gallery.dimension(),
            model = gallery.model(),
            "gallery loaded"
        );
        *self.cached.write().expect("gallery lock poisoned") = Some(Arc::clone(&gallery));
        Ok(gallery)
    }
}

fn load_snapshot(path: &Path) -> Result<Gallery, GalleryError> {
    let file = File::open(path).map_err(|source| GalleryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot: GallerySnapshot = serde_json::from_reader(BufReader::new(file))?;
    Gallery::from_snapshot(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn snapshot(json: &str) -> GallerySnapshot {
        serde_json::from_str(json).unwrap()
    }

    fn write_temp_snapshot(json: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let path = std::env::temp_dir().join(format!(
            "doppel-gallery-{}-{}.json",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_valid_snapshot_loads() {
        let gallery = Gallery::from_snapshot(snapshot(
            r#"{"model": "Facenet512",
                "names": ["Alice", "Bob"],
                "embeddings": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]}"#,
        ))
        .unwrap();
        assert_eq!(gallery.len(), 2);
        assert_eq!(gallery.dimension(), Some(3));
        assert_eq!(gallery.model(), Some("Facenet512"));
        assert_eq!(gallery.entries()[0].name, "Alice");
    }

    #[test]
    fn test_empty_snapshot_loads_as_empty_gallery() {
        let gallery =
            Gallery::from_snapshot(snapshot(r#"{"names": [], "embeddings": []}"#)).unwrap();
        assert!(gallery.is_empty());
        assert_eq!(gallery.dimension(), None);
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let err = Gallery::from_snapshot(snapshot(
            r#"{"names": ["Alice", "Bob"], "embeddings": [[1.0, 0.0]]}"#,
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            GalleryError::CountMismatch { names: 2, rows: 1 }
        ));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let err = Gallery::from_snapshot(snapshot(
            r#"{"names": ["Alice", "Bob"], "embeddings": [[1.0, 0.0], [1.0]]}"#,
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            GalleryError::DimensionMismatch { got: 1, expected: 2, .. }
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = Gallery::from_snapshot(snapshot(
            r#"{"names": ["", "Bob"], "embeddings": [[1.0], [2.0]]}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, GalleryError::EmptyName { index: 0 }));
    }

    #[test]
    fn test_store_missing_file_errors() {
        let store = GalleryStore::new("/nonexistent/doppel-gallery.json");
        assert!(matches!(store.get(), Err(GalleryError::Io { .. })));
    }

    #[test]
    fn test_store_caches_after_first_load() {
        let path = write_temp_snapshot(r#"{"names": ["Alice"], "embeddings": [[1.0, 0.0]]}"#);
        let store = GalleryStore::new(&path);
        let first = store.get().unwrap();
        // Snapshot removal is invisible to a warmed store.
        std::fs::remove_file(&path).unwrap();
        let second = store.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_reload_swaps_atomically() {
        let path = write_temp_snapshot(r#"{"names": ["Alice"], "embeddings": [[1.0, 0.0]]}"#);
        let store = GalleryStore::new(&path);
        let before = store.get().unwrap();
        assert_eq!(before.len(), 1);

        std::fs::write(
            &path,
            r#"{"names": ["Alice", "Bob"], "embeddings": [[1.0, 0.0], [0.0, 1.0]]}"#,
        )
        .unwrap();
        let after = store.reload().unwrap();
        assert_eq!(after.len(), 2);
        // The old reference is untouched; readers holding it see one entry.
        assert_eq!(before.len(), 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_failed_reload_keeps_previous_gallery() {
        let path = write_temp_snapshot(r#"{"names": ["Alice"], "embeddings": [[1.0, 0.0]]}"#);
        let store = GalleryStore::new(&path);
        store.get().unwrap();

        std::fs::write(&path, r#"{"names": ["Alice"], "embeddings": []}"#).unwrap();
        assert!(store.reload().is_err());
        // Cached gallery survives the bad reload.
        assert_eq!(store.get().unwrap().len(), 1);
        std::fs::remove_file(&path).ok();
    }
}
