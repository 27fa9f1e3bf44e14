//! doppel-faceapi — HTTP client for a DeepFace-compatible analysis sidecar.
//!
//! The sidecar hosts the actual face models and exposes three endpoints,
//! all taking a multipart image upload and returning per-face results
//! under a `results` array (first face first):
//!
//! - `POST /represent`  → `{"results": [{"embedding": [...]}, ...]}`
//! - `POST /analyze`    → age / gender / dominant_emotion / dominant_race
//! - `POST /landmarks`  → `{"results": [{"keypoints": {"left_eye": [x, y], ...}}]}`

use std::cmp::Ordering;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use doppel_core::{AnalyzerError, AttributeSet, Embedding, FaceAnalyzer, LandmarkSet, Point};

/// Client configuration. `enforce_detection` is forwarded to the sidecar;
/// the default (false) matches the service's best-effort policy of
/// proceeding even when face detection is low-confidence.
#[derive(Debug, Clone)]
pub struct FaceApiConfig {
    pub base_url: String,
    pub model_name: String,
    pub enforce_detection: bool,
    pub request_timeout: Duration,
}

impl Default for FaceApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5005".into(),
            model_name: "Facenet512".into(),
            enforce_detection: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct FaceApiClient {
    http: reqwest::Client,
    config: FaceApiConfig,
}

impl FaceApiClient {
    pub fn new(config: FaceApiConfig) -> Result<Self, AnalyzerError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AnalyzerError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// Upload an image to a sidecar endpoint and parse the JSON response.
    ///
    /// The image is probed locally first so an unreadable or non-image
    /// file fails without a round trip.
    async fn upload(
        &self,
        endpoint: &str,
        image: &Path,
        fields: &[(&'static str, String)],
    ) -> Result<Value, AnalyzerError> {
        let (width, height) = image::image_dimensions(image)
            .map_err(|_| AnalyzerError::UnreadableImage(image.to_path_buf()))?;
        tracing::debug!(endpoint, image = %image.display(), width, height, "uploading");

        let bytes = tokio::fs::read(image)
            .await
            .map_err(|_| AnalyzerError::UnreadableImage(image.to_path_buf()))?;
        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".into());

        let mut form = Form::new().part("img", Part::bytes(bytes).file_name(file_name));
        for (key, value) in fields {
            form = form.text(*key, value.clone());
        }

        let url = format!("{}/{endpoint}", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AnalyzerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AnalyzerError::MalformedResponse(e.to_string()))
    }

    fn enforce_field(&self) -> (&'static str, String) {
        ("enforce_detection", self.config.enforce_detection.to_string())
    }
}

#[async_trait]
impl FaceAnalyzer for FaceApiClient {
    async fn embedding(&self, image: &Path) -> Result<Embedding, AnalyzerError> {
        let payload = self
            .upload(
                "represent",
                image,
                &[
                    ("model_name", self.config.model_name.clone()),
                    self.enforce_field(),
                ],
            )
            .await?;

        let face = first_result(&payload)
            .ok_or_else(|| AnalyzerError::NoFaceDetected(image.to_path_buf()))?;

        Ok(Embedding {
            values: extract_embedding(face)?,
            model_version: Some(self.config.model_name.clone()),
        })
    }

    async fn attributes(&self, image: &Path) -> Result<AttributeSet, AnalyzerError> {
        let payload = self
            .upload(
                "analyze",
                image,
                &[
                    ("actions", r#"["age", "gender", "emotion", "race"]"#.into()),
                    self.enforce_field(),
                ],
            )
            .await?;

        // No face found is an empty set here, not an error.
        Ok(first_result(&payload)
            .map(extract_attributes)
            .unwrap_or_default())
    }

    async fn landmarks(&self, image: &Path) -> Result<LandmarkSet, AnalyzerError> {
        let payload = self.upload("landmarks", image, &[]).await?;
        Ok(first_result(&payload)
            .map(extract_landmarks)
            .unwrap_or_default())
    }
}

/// The sidecar wraps per-face results in a `results` array; some builds
/// return a bare object for a single face. Only the first face counts.
fn first_result(payload: &Value) -> Option<&Value> {
    match payload.get("results") {
        Some(Value::Array(faces)) => faces.first(),
        _ if payload.is_object() => Some(payload),
        _ => None,
    }
}

/// Parse a represent result's embedding vector. Every component must be
/// numeric; a corrupt payload is rejected rather than zero-filled.
fn extract_embedding(face: &Value) -> Result<Vec<f32>, AnalyzerError> {
    let raw = face.get("embedding").and_then(Value::as_array).ok_or_else(|| {
        AnalyzerError::MalformedResponse("represent result has no embedding".into())
    })?;
    raw.iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                AnalyzerError::MalformedResponse(format!(
                    "embedding contains a non-numeric component: {v}"
                ))
            })
        })
        .collect()
}

fn extract_attributes(face: &Value) -> AttributeSet {
    AttributeSet {
        age: face.get("age").and_then(Value::as_f64).map(|a| a.round() as u32),
        gender: extract_gender(face),
        dominant_emotion: face
            .get("dominant_emotion")
            .and_then(Value::as_str)
            .map(str::to_owned),
        dominant_race: face
            .get("dominant_race")
            .and_then(Value::as_str)
            .map(str::to_owned),
    }
}

/// Gender arrives in three shapes depending on the sidecar's DeepFace
/// version: a `dominant_gender` string, a plain `gender` string, or a
/// `gender` confidence map. The map reduces to its highest-scoring label.
fn extract_gender(face: &Value) -> Option<String> {
    if let Some(label) = face.get("dominant_gender").and_then(Value::as_str) {
        return Some(label.to_owned());
    }
    match face.get("gender") {
        Some(Value::String(label)) => Some(label.clone()),
        Some(Value::Object(scores)) => scores
            .iter()
            .max_by(|a, b| {
                let a = a.1.as_f64().unwrap_or(0.0);
                let b = b.1.as_f64().unwrap_or(0.0);
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            })
            .map(|(label, _)| label.clone()),
        _ => None,
    }
}

fn extract_landmarks(face: &Value) -> LandmarkSet {
    let mut set = LandmarkSet::default();
    let Some(Value::Object(keypoints)) = face.get("keypoints") else {
        return set;
    };
    for (name, coords) in keypoints {
        let Some(pair) = coords.as_array() else { continue };
        if let (Some(x), Some(y)) = (
            pair.first().and_then(Value::as_f64),
            pair.get(1).and_then(Value::as_f64),
        ) {
            set.insert(name, Point { x: x as f32, y: y as f32 });
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_result_prefers_results_array() {
        let payload = json!({"results": [{"age": 30}, {"age": 40}]});
        assert_eq!(first_result(&payload).unwrap()["age"], 30);
    }

    #[test]
    fn test_first_result_accepts_bare_object() {
        let payload = json!({"age": 30});
        assert_eq!(first_result(&payload).unwrap()["age"], 30);
    }

    #[test]
    fn test_first_result_empty_array_is_none() {
        assert!(first_result(&json!({"results": []})).is_none());
        assert!(first_result(&json!([1, 2])).is_none());
    }

    #[test]
    fn test_extract_embedding_valid() {
        let face = json!({"embedding": [0.1, -0.5, 2]});
        assert_eq!(extract_embedding(&face).unwrap(), vec![0.1, -0.5, 2.0]);
    }

    #[test]
    fn test_extract_embedding_missing_is_malformed() {
        let err = extract_embedding(&json!({"facial_area": {}})).unwrap_err();
        assert!(matches!(err, AnalyzerError::MalformedResponse(_)));
    }

    #[test]
    fn test_extract_embedding_non_numeric_component_is_malformed() {
        let err = extract_embedding(&json!({"embedding": [0.1, "oops", 0.3]})).unwrap_err();
        assert!(matches!(err, AnalyzerError::MalformedResponse(_)));
    }

    #[test]
    fn test_extract_attributes_full() {
        let face = json!({
            "age": 31.4,
            "dominant_gender": "Woman",
            "dominant_emotion": "happy",
            "dominant_race": "asian"
        });
        assert_eq!(
            extract_attributes(&face),
            AttributeSet {
                age: Some(31),
                gender: Some("Woman".into()),
                dominant_emotion: Some("happy".into()),
                dominant_race: Some("asian".into()),
            }
        );
    }

    #[test]
    fn test_extract_attributes_missing_fields_stay_absent() {
        let face = json!({"age": 25});
        let set = extract_attributes(&face);
        assert_eq!(set.age, Some(25));
        assert!(set.gender.is_none());
        assert!(set.dominant_emotion.is_none());
        assert!(set.dominant_race.is_none());
    }

    #[test]
    fn test_gender_confidence_map_reduces_to_dominant() {
        let face = json!({"gender": {"Woman": 99.2, "Man": 0.8}});
        assert_eq!(extract_gender(&face), Some("Woman".into()));
        let face = json!({"gender": {"Woman": 12.0, "Man": 88.0}});
        assert_eq!(extract_gender(&face), Some("Man".into()));
    }

    #[test]
    fn test_gender_plain_string_passes_through() {
        assert_eq!(
            extract_gender(&json!({"gender": "Man"})),
            Some("Man".into())
        );
    }

    #[test]
    fn test_extract_landmarks_keeps_keypoint_order() {
        let face = json!({"keypoints": {
            "left_eye": [668, 617],
            "right_eye": [847, 628],
            "nose": [739, 747],
            "mouth_left": [669, 859],
            "mouth_right": [825, 870]
        }});
        let set = extract_landmarks(&face);
        assert_eq!(set.len(), 5);
        let names: Vec<&str> = set.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["left_eye", "right_eye", "nose", "mouth_left", "mouth_right"]
        );
        assert_eq!(set.get("nose"), Some(Point { x: 739.0, y: 747.0 }));
    }

    #[test]
    fn test_extract_landmarks_tolerates_garbage() {
        assert!(extract_landmarks(&json!({})).is_empty());
        assert!(extract_landmarks(&json!({"keypoints": "nope"})).is_empty());
        let set = extract_landmarks(&json!({"keypoints": {"nose": [1], "chin": [2, 3]}}));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("chin"), Some(Point { x: 2.0, y: 3.0 }));
    }
}
