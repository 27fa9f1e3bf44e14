//! Type normalization — flatten analysis-layer value trees into plain JSON.

use serde_json::Value;

/// Loosely typed value tree as produced by the analysis layer.
///
/// Model outputs arrive in narrow numeric types (f32 scores, i32/i64
/// counters) and raw float vectors; this enum mirrors those shapes so the
/// whole tree can be sanitized in one pass. Map entries keep insertion
/// order.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisValue {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
    /// Embedding-style float vector leaf.
    Vector(Vec<f32>),
    List(Vec<AnalysisValue>),
    Map(Vec<(String, AnalysisValue)>),
}

impl AnalysisValue {
    /// Lift an already-plain JSON value into the analysis tree.
    /// `normalize(&AnalysisValue::from_json(v)) == v` for any finite `v`.
    pub fn from_json(value: &Value) -> AnalysisValue {
        match value {
            Value::Null => AnalysisValue::Null,
            Value::Bool(b) => AnalysisValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    AnalysisValue::I64(i)
                } else {
                    AnalysisValue::F64(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => AnalysisValue::Text(s.clone()),
            Value::Array(items) => {
                AnalysisValue::List(items.iter().map(AnalysisValue::from_json).collect())
            }
            Value::Object(map) => AnalysisValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), AnalysisValue::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Recursively convert an analysis tree into a JSON-safe value.
///
/// Structure-preserving: maps and lists are walked in order, numeric
/// leaves widen to JSON numbers, vectors become arrays, everything else
/// passes through. Non-finite floats have no JSON representation and
/// become null.
pub fn normalize(value: &AnalysisValue) -> Value {
    match value {
        AnalysisValue::Null => Value::Null,
        AnalysisValue::Bool(b) => Value::Bool(*b),
        AnalysisValue::I32(i) => Value::from(i64::from(*i)),
        AnalysisValue::I64(i) => Value::from(*i),
        AnalysisValue::F32(f) => finite(f64::from(*f)),
        AnalysisValue::F64(f) => finite(*f),
        AnalysisValue::Text(s) => Value::String(s.clone()),
        AnalysisValue::Vector(v) => {
            Value::Array(v.iter().map(|f| finite(f64::from(*f))).collect())
        }
        AnalysisValue::List(items) => Value::Array(items.iter().map(normalize).collect()),
        AnalysisValue::Map(entries) => {
            let mut map = serde_json::Map::with_capacity(entries.len());
            for (key, val) in entries {
                map.insert(key.clone(), normalize(val));
            }
            Value::Object(map)
        }
    }
}

fn finite(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
