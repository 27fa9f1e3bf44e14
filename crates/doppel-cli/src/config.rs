use std::path::PathBuf;
use std::time::Duration;

/// CLI configuration, loaded from environment variables.
pub struct Config {
    /// Path to the gallery snapshot JSON.
    pub gallery_path: PathBuf,
    /// Directory holding one reference image per identity.
    pub reference_dir: PathBuf,
    /// Extension of the reference images (without the dot).
    pub reference_ext: String,
    /// Base URL of the face analysis sidecar.
    pub faceapi_url: String,
    /// Embedding model the sidecar should use.
    pub model_name: String,
    /// Number of ranked matches to return.
    pub top_k: usize,
    /// Whether the sidecar should hard-fail when no face is detected.
    pub enforce_detection: bool,
    /// Timeout for each sidecar request.
    pub request_timeout: Duration,
    /// Per-call bound on each enrichment call.
    pub enrichment_timeout: Duration,
}

impl Config {
    /// Load configuration from `DOPPEL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            gallery_path: std::env::var("DOPPEL_GALLERY")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("celebs_embeddings.json")),
            reference_dir: std::env::var("DOPPEL_REFERENCE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("images")),
            reference_ext: std::env::var("DOPPEL_REFERENCE_EXT")
                .unwrap_or_else(|_| "jpg".to_string()),
            faceapi_url: std::env::var("DOPPEL_FACEAPI_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:5005".to_string()),
            model_name: std::env::var("DOPPEL_MODEL")
                .unwrap_or_else(|_| "Facenet512".to_string()),
            top_k: env_usize("DOPPEL_TOP_K", 5),
            enforce_detection: env_flag("DOPPEL_ENFORCE_DETECTION", false),
            request_timeout: Duration::from_secs(env_u64("DOPPEL_API_TIMEOUT_SECS", 30)),
            enrichment_timeout: Duration::from_secs(env_u64("DOPPEL_ENRICHMENT_TIMEOUT_SECS", 15)),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Anything but "0"/"false"/"off" counts as set.
fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "off"))
        .unwrap_or(default)
}
