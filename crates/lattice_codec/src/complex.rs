//! # Complex Value Buffer
//!
//! Faux values the inline encoders cannot express (deep objects, arrays
//! of non-primitive items, `Any`-shaped properties) are emitted
//! out-of-band: they accumulate in a nested `eid -> component type ->
//! property key` map that is JSON-encoded once and appended after the
//! entity region, projected to Latin-1 bytes.
//!
//! The replacer/reviver pair carries host-language `Map`/`Set` values
//! through the buffer as their tagged projections
//! (`{"dataType":"Map","value":[[k,v],…]}` and
//! `{"dataType":"Set","value":[…]}`): the replacer normalizes values on
//! the way in, the reviver walks the decoded document and hands the
//! tagged forms back bit-exactly so a host can revive real Map/Set
//! values from them.

use serde_json::{Map, Value};

use crate::error::{CodecError, CodecResult};
use crate::wire::{latin1_bytes, latin1_string};

/// Tag key marking Map/Set projections.
const DATA_TYPE_KEY: &str = "dataType";

/// Whether a value is a tagged `Map`/`Set` projection.
fn is_tagged(value: &Map<String, Value>) -> bool {
    matches!(
        value.get(DATA_TYPE_KEY).and_then(Value::as_str),
        Some("Map" | "Set")
    )
}

/// Normalizes a value for the complex buffer, preserving tagged
/// `Map`/`Set` projections and recursing into containers.
#[must_use]
pub fn replacer(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(replacer).collect()),
        Value::Object(map) if is_tagged(map) => Value::Object(map.clone()),
        Value::Object(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), replacer(v))).collect())
        }
        other => other.clone(),
    }
}

/// Walks a decoded document, handing tagged `Map`/`Set` projections back
/// unchanged and recursing into containers.
#[must_use]
pub fn reviver(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(reviver).collect()),
        Value::Object(map) if is_tagged(&map) => Value::Object(map),
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, reviver(v))).collect())
        }
        other => other,
    }
}

/// Accumulates out-of-band values during serialization.
#[derive(Debug, Default)]
pub struct ComplexBuffer {
    root: Map<String, Value>,
}

impl ComplexBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Records `complex[eid][component_type][key] = replacer(value)`.
    pub fn insert(&mut self, eid: u32, component_type: &str, key: &str, value: &Value) {
        let by_component = self
            .root
            .entry(eid.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(by_component) = by_component else { return };
        let by_key = by_component
            .entry(component_type.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(by_key) = by_key else { return };
        by_key.insert(key.to_string(), replacer(value));
    }

    /// JSON-encodes the nested map and projects it to Latin-1 bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        latin1_bytes(&Value::Object(self.root.clone()).to_string())
    }
}

/// The decoded complex buffer, queried while patching faux columns.
#[derive(Debug, Default)]
pub struct ComplexData {
    root: Map<String, Value>,
}

impl ComplexData {
    /// Parses the Latin-1 JSON bytes appended after the entity region.
    ///
    /// # Errors
    ///
    /// [`CodecError::MalformedPayload`] when the bytes are not a JSON
    /// object.
    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_str(&latin1_string(bytes))?;
        match reviver(value) {
            Value::Object(root) => Ok(Self { root }),
            _ => Err(CodecError::MalformedPayload {
                detail: "complex buffer is not a JSON object".to_string(),
            }),
        }
    }

    /// Fetches the recorded value for `(eid, component_type, key)`.
    #[must_use]
    pub fn get(&self, eid: u32, component_type: &str, key: &str) -> Option<&Value> {
        self.root
            .get(&eid.to_string())?
            .get(component_type)?
            .get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_roundtrip_nested_value() {
        let mut buffer = ComplexBuffer::new();
        let value = json!({"nested": {"deep": [1, {"x": 2}]}});
        buffer.insert(3, "Inventory", "contents", &value);

        let data = ComplexData::from_bytes(&buffer.to_bytes()).unwrap();
        assert_eq!(data.get(3, "Inventory", "contents"), Some(&value));
        assert_eq!(data.get(3, "Inventory", "missing"), None);
        assert_eq!(data.get(4, "Inventory", "contents"), None);
    }

    #[test]
    fn test_map_set_projections_survive() {
        let mut buffer = ComplexBuffer::new();
        let map = json!({"dataType": "Map", "value": [["a", 1], ["b", 2]]});
        let set = json!({"dataType": "Set", "value": [1, 2, 3]});
        buffer.insert(0, "Caches", "lookup", &map);
        buffer.insert(0, "Caches", "seen", &set);

        let data = ComplexData::from_bytes(&buffer.to_bytes()).unwrap();
        assert_eq!(data.get(0, "Caches", "lookup"), Some(&map));
        assert_eq!(data.get(0, "Caches", "seen"), Some(&set));
    }

    #[test]
    fn test_empty_bytes_decode_to_empty() {
        let data = ComplexData::from_bytes(&[]).unwrap();
        assert_eq!(data.get(0, "X", "y"), None);
    }

    #[test]
    fn test_reviver_recurses_into_containers() {
        let tagged = json!([{"outer": {"dataType": "Set", "value": [9]}}]);
        assert_eq!(reviver(tagged.clone()), tagged);
    }
}
