//! Typed metadata carried alongside vector-index entries.
//!
//! A record's metadata can carry any JSON shape, but the vector store only
//! accepts scalar values. `MetadataValue` makes that scalar union explicit
//! instead of hand-checking types at each call site.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Number(f64),
    Bool(bool),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Flatten an arbitrary JSON object into scalar fields only, dropping
/// arrays, nested objects, and null — mirrors the source's
/// `isinstance(v, (str, int, float, bool))` metadata filter for ChromaDB.
pub fn flatten_metadata(value: &serde_json::Value) -> HashMap<String, MetadataValue> {
    let mut out = HashMap::new();
    let Some(obj) = value.as_object() else {
        return out;
    };
    for (k, v) in obj {
        let scalar = match v {
            serde_json::Value::String(s) => Some(MetadataValue::String(s.clone())),
            serde_json::Value::Bool(b) => Some(MetadataValue::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(MetadataValue::Number),
            _ => None,
        };
        if let Some(scalar) = scalar {
            out.insert(k.clone(), scalar);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_non_scalar_fields() {
        let value = json!({
            "timestamp": 12345.0,
            "screen_name": "screen_0",
            "active": true,
            "nested": {"a": 1},
            "list": [1, 2, 3],
            "missing": null,
        });
        let flat = flatten_metadata(&value);
        assert_eq!(flat.len(), 3);
        assert_eq!(flat.get("screen_name").unwrap().as_str(), Some("screen_0"));
        assert_eq!(flat.get("timestamp").unwrap().as_f64(), Some(12345.0));
        assert!(!flat.contains_key("nested"));
        assert!(!flat.contains_key("list"));
    }
}
