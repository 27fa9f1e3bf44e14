use serde::{Deserialize, Serialize};

use crate::normalize::{normalize, AnalysisValue};

/// Face embedding vector (typically 512-dimensional for Facenet512).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model that produced this embedding (e.g., "Facenet512").
    pub model_version: Option<String>,
}

impl Embedding {
    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar. Defined as
    /// exactly 0.0 when either vector has zero norm.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }
}

/// One gallery entry scored against a query embedding.
///
/// `similarity_percent` is cosine similarity scaled to [-100, 100] and
/// rounded to 2 decimals, half away from zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMatch {
    pub name: String,
    pub similarity_percent: f32,
}

/// Descriptive face attributes from the analysis service.
///
/// Every field is optional: a failed or faceless analysis yields the
/// empty set, which serializes as `{}` rather than four nulls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_emotion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_race: Option<String>,
}

impl AttributeSet {
    pub fn is_empty(&self) -> bool {
        self.age.is_none()
            && self.gender.is_none()
            && self.dominant_emotion.is_none()
            && self.dominant_race.is_none()
    }
}

/// 2D pixel coordinate of a facial keypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Named facial keypoints for the first detected face, in detector order
/// (left_eye, right_eye, nose, mouth_left, mouth_right).
///
/// Empty means no face was found or landmark detection failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkSet {
    points: Vec<(String, Point)>,
}

impl LandmarkSet {
    pub fn insert(&mut self, name: impl Into<String>, point: Point) {
        self.points.push((name.into(), point));
    }

    pub fn get(&self, name: &str) -> Option<Point> {
        self.points
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| *p)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Point)> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Composite result of one match request: the authoritative ranking plus
/// best-effort enrichment for the query image and the top match.
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub top_match: RankedMatch,
    pub top_k_matches: Vec<RankedMatch>,
    pub user_attributes: AttributeSet,
    pub celeb_attributes: AttributeSet,
    pub user_landmarks: LandmarkSet,
    pub celeb_landmarks: LandmarkSet,
}

impl MatchReport {
    /// Render the report as the loosely typed tree the normalizer accepts.
    pub fn to_analysis(&self) -> AnalysisValue {
        fn ranked(m: &RankedMatch) -> AnalysisValue {
            AnalysisValue::Map(vec![
                ("name".into(), AnalysisValue::Text(m.name.clone())),
                (
                    "similarity_percent".into(),
                    AnalysisValue::F32(m.similarity_percent),
                ),
            ])
        }

        fn attributes(set: &AttributeSet) -> AnalysisValue {
            let mut entries = Vec::new();
            if let Some(age) = set.age {
                entries.push(("age".into(), AnalysisValue::I64(age as i64)));
            }
            if let Some(gender) = &set.gender {
                entries.push(("gender".into(), AnalysisValue::Text(gender.clone())));
            }
            if let Some(emotion) = &set.dominant_emotion {
                entries.push((
                    "dominant_emotion".into(),
                    AnalysisValue::Text(emotion.clone()),
                ));
            }
            if let Some(race) = &set.dominant_race {
                entries.push(("dominant_race".into(), AnalysisValue::Text(race.clone())));
            }
            AnalysisValue::Map(entries)
        }

        fn landmarks(set: &LandmarkSet) -> AnalysisValue {
            AnalysisValue::Map(
                set.iter()
                    .map(|(name, p)| {
                        (
                            name.clone(),
                            AnalysisValue::List(vec![
                                AnalysisValue::F32(p.x),
                                AnalysisValue::F32(p.y),
                            ]),
                        )
                    })
                    .collect(),
            )
        }

        AnalysisValue::Map(vec![
            ("top_match".into(), ranked(&self.top_match)),
            (
                "top_k_matches".into(),
                AnalysisValue::List(self.top_k_matches.iter().map(ranked).collect()),
            ),
            ("user_attributes".into(), attributes(&self.user_attributes)),
            (
                "celeb_attributes".into(),
                attributes(&self.celeb_attributes),
            ),
            ("user_landmarks".into(), landmarks(&self.user_landmarks)),
            ("celeb_landmarks".into(), landmarks(&self.celeb_landmarks)),
        ])
    }

    /// Render the report as JSON, sanitized by the normalizer so no
    /// non-finite float can reach the wire.
    pub fn to_json(&self) -> serde_json::Value {
        normalize(&self.to_analysis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: Vec<f32>) -> Embedding {
        Embedding { values, model_version: None }
    }

    #[test]
    fn test_similarity_identical() {
        let a = emb(vec![1.0, 0.0, 0.0]);
        assert!((a.similarity(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_symmetric() {
        let a = emb(vec![0.3, 0.7, 0.1]);
        let b = emb(vec![0.9, 0.2, 0.4]);
        assert_eq!(a.similarity(&b), b.similarity(&a));
    }

    #[test]
    fn test_similarity_orthogonal() {
        let a = emb(vec![1.0, 0.0]);
        let b = emb(vec![0.0, 1.0]);
        assert!(a.similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_opposite() {
        let a = emb(vec![1.0, 0.0]);
        let b = emb(vec![-1.0, 0.0]);
        assert!((a.similarity(&b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_zero_vector() {
        let a = emb(vec![0.0, 0.0]);
        let b = emb(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
        assert_eq!(b.similarity(&a), 0.0);
    }

    #[test]
    fn test_attribute_set_empty_serializes_to_empty_object() {
        let json = serde_json::to_value(AttributeSet::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn test_attribute_set_skips_absent_fields() {
        let set = AttributeSet {
            age: Some(31),
            gender: None,
            dominant_emotion: Some("happy".into()),
            dominant_race: None,
        };
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"age": 31, "dominant_emotion": "happy"})
        );
    }

    #[test]
    fn test_landmark_set_preserves_insertion_order() {
        let mut set = LandmarkSet::default();
        set.insert("right_eye", Point { x: 2.0, y: 1.0 });
        set.insert("left_eye", Point { x: 1.0, y: 1.0 });
        let names: Vec<&str> = set.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["right_eye", "left_eye"]);
        assert_eq!(set.get("left_eye"), Some(Point { x: 1.0, y: 1.0 }));
    }

    #[test]
    fn test_report_to_json_shape() {
        let report = MatchReport {
            top_match: RankedMatch { name: "Alice".into(), similarity_percent: 99.39 },
            top_k_matches: vec![
                RankedMatch { name: "Alice".into(), similarity_percent: 99.39 },
                RankedMatch { name: "Bob".into(), similarity_percent: 11.04 },
            ],
            user_attributes: AttributeSet { age: Some(30), ..Default::default() },
            celeb_attributes: AttributeSet::default(),
            user_landmarks: {
                let mut set = LandmarkSet::default();
                set.insert("nose", Point { x: 50.0, y: 60.0 });
                set
            },
            celeb_landmarks: LandmarkSet::default(),
        };

        let json = report.to_json();
        assert_eq!(json["top_match"]["name"], "Alice");
        assert_eq!(json["top_k_matches"].as_array().unwrap().len(), 2);
        assert_eq!(json["user_attributes"], serde_json::json!({"age": 30}));
        assert_eq!(json["celeb_attributes"], serde_json::json!({}));
        assert_eq!(json["user_landmarks"]["nose"], serde_json::json!([50.0, 60.0]));
        assert_eq!(json["celeb_landmarks"], serde_json::json!({}));
    }
}
