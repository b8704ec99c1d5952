//! Case-insensitive JSON decoding.
//!
//! Object keys are lowercased recursively before typed deserialization, so
//! target types accept the lowercase spelling of every field (directly or
//! through a serde alias).

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut lowered = Map::with_capacity(map.len());
            for (key, value) in map {
                let key = key.to_lowercase();
                // keys differing only by case collapse to one entry
                if !lowered.contains_key(&key) {
                    lowered.insert(key, lowercase_keys(value));
                }
            }
            Value::Object(lowered)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

pub fn from_str_ignore_case<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    serde_json::from_value(lowercase_keys(value))
}
