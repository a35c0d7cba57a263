//! Text encoding for list and mapping values
//!
//! Lists are stored as a JSON array of externally tagged values
//! (`[{"int":1},{"str":"a"}]`). Mappings are first flattened to an ordered
//! list of `[key, value]` pairs and stored the same way, so a `DICT` column
//! holds `[{"list":[{"str":"k"},{"int":1}]}, ...]`.
//!
//! Decoding only ever parses JSON. Stored text is data, never code.
//!
//! `serde_json` refuses to parse JSON nested more than [`MAX_JSON_DEPTH`]
//! brackets deep, so encoding rejects anything deeper. Every value that
//! encodes also decodes.

use crate::value::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Deepest bracket nesting `serde_json` will parse
pub const MAX_JSON_DEPTH: usize = 127;

/// Errors from the list/mapping text codec
#[derive(Debug, Error)]
pub enum TextCodecError {
    /// JSON could not be produced or parsed
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// NaN or infinite float, which JSON cannot represent
    #[error("non-finite float cannot be stored in a list or mapping")]
    NonFinite,

    /// Mapping entry was not a `[text, value]` pair
    #[error("mapping entry {index} is not a [key, value] pair")]
    NotAPair {
        /// Position of the bad entry
        index: usize,
    },

    /// Encoded JSON is nested deeper than the decoder accepts
    #[error("value nests {depth} levels deep, limit is {limit}")]
    TooDeep {
        /// Bracket depth of the encoded text
        depth: usize,
        /// Deepest nesting accepted
        limit: usize,
    },

    /// Mapping repeats a key
    #[error("duplicate mapping key '{0}'")]
    DuplicateKey(String),
}

/// Encode a list as tagged JSON
pub fn encode_list(items: &[Value]) -> Result<String, TextCodecError> {
    if items.iter().any(Value::contains_non_finite) {
        return Err(TextCodecError::NonFinite);
    }
    let text = serde_json::to_string(items)?;
    let depth = json_depth(&text);
    if depth > MAX_JSON_DEPTH {
        return Err(TextCodecError::TooDeep {
            depth,
            limit: MAX_JSON_DEPTH,
        });
    }
    Ok(text)
}

/// Deepest `[`/`{` nesting in JSON text, ignoring brackets inside strings
fn json_depth(text: &str) -> usize {
    let (mut depth, mut max) = (0usize, 0usize);
    let (mut in_string, mut escaped) = (false, false);
    for b in text.bytes() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                max = max.max(depth);
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max
}

/// Decode tagged JSON back into a list
pub fn decode_list(text: &str) -> Result<Vec<Value>, TextCodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Flatten a mapping to its ordered `[key, value]` pair list
pub fn mapping_to_pairs(map: &BTreeMap<String, Value>) -> Vec<Value> {
    map.iter()
        .map(|(k, v)| Value::List(vec![Value::Text(k.clone()), v.clone()]))
        .collect()
}

/// Rebuild a mapping from a `[key, value]` pair list
pub fn pairs_to_mapping(pairs: Vec<Value>) -> Result<BTreeMap<String, Value>, TextCodecError> {
    let mut map = BTreeMap::new();
    for (index, pair) in pairs.into_iter().enumerate() {
        let Value::List(mut kv) = pair else {
            return Err(TextCodecError::NotAPair { index });
        };
        if kv.len() != 2 {
            return Err(TextCodecError::NotAPair { index });
        }
        let value = kv.pop().unwrap_or(Value::Null);
        let Some(Value::Text(key)) = kv.pop() else {
            return Err(TextCodecError::NotAPair { index });
        };
        if map.contains_key(&key) {
            return Err(TextCodecError::DuplicateKey(key));
        }
        map.insert(key, value);
    }
    Ok(map)
}

/// Encode a mapping as its pair list
pub fn encode_mapping(map: &BTreeMap<String, Value>) -> Result<String, TextCodecError> {
    encode_list(&mapping_to_pairs(map))
}

/// Decode a pair list back into a mapping
pub fn decode_mapping(text: &str) -> Result<BTreeMap<String, Value>, TextCodecError> {
    pairs_to_mapping(decode_list(text)?)
}
