//! Type registry: semantic kinds, storage types, and value codecs
//!
//! The registry owns the association between each [`SemanticKind`] and the
//! declared SQLite column type that stores it, plus the encode/decode pair
//! for every kind. One registry instance belongs to each open store; there
//! is no process-wide adapter state.
//!
//! | Kind | Storage type | Stored as |
//! |------|--------------|-----------|
//! | `int` | `INTEGER` | integer |
//! | `bool` | `BOOL` | integer 0/1 |
//! | `str` | `TEXT` | text |
//! | `float` | `REAL` | real |
//! | `float64` | `FLOAT64` | real |
//! | `ndarray` | `ARRAY` | tensor blob |
//! | `list` | `LIST` | tagged JSON text |
//! | `dict` | `DICT` | tagged JSON text of `[key, value]` pairs |
//! | `function` | `FUNCTION` | qualified name as UTF-8 blob |
//!
//! `bytes` is known but unregistered by default; `none` can never be
//! registered.

use juntdb_core::codec::{decode_list, decode_mapping, encode_list, encode_mapping};
use juntdb_core::{CallableRef, Error, Result, SemanticKind, Tensor, Value};
use once_cell::sync::Lazy;
use rusqlite::types::Value as SqlValue;
use std::collections::BTreeMap;
use tracing::warn;

/// Built-in associations seeded into every new store
pub static BUILTIN_ASSOCIATIONS: Lazy<BTreeMap<SemanticKind, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        (SemanticKind::Integer, "INTEGER"),
        (SemanticKind::Boolean, "BOOL"),
        (SemanticKind::Text, "TEXT"),
        (SemanticKind::Real, "REAL"),
        (SemanticKind::Float64, "FLOAT64"),
        (SemanticKind::Array, "ARRAY"),
        (SemanticKind::List, "LIST"),
        (SemanticKind::Mapping, "DICT"),
        (SemanticKind::Function, "FUNCTION"),
    ])
});

/// Kind-to-storage associations and value codecs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRegistry {
    associations: BTreeMap<SemanticKind, String>,
}

impl TypeRegistry {
    /// Registry with the built-in kinds
    pub fn builtin() -> Self {
        TypeRegistry {
            associations: BUILTIN_ASSOCIATIONS
                .iter()
                .map(|(k, v)| (*k, v.to_string()))
                .collect(),
        }
    }

    /// Registry with no kinds at all
    pub fn empty() -> Self {
        TypeRegistry {
            associations: BTreeMap::new(),
        }
    }

    /// Associate a kind with a storage type, replacing any previous one
    ///
    /// Storage type names are upper-cased and must be a plain identifier.
    pub fn register(&mut self, kind: SemanticKind, storage_type: &str) -> Result<()> {
        if kind == SemanticKind::Null {
            return Err(Error::invalid_input("the 'none' kind cannot own a column"));
        }
        let valid = !storage_type.is_empty()
            && storage_type
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_');
        if !valid {
            return Err(Error::invalid_input(format!(
                "'{}' is not a valid storage type name",
                storage_type
            )));
        }
        self.associations
            .insert(kind, storage_type.to_ascii_uppercase());
        Ok(())
    }

    /// Builder form of [`TypeRegistry::register`]
    pub fn with(mut self, kind: SemanticKind, storage_type: &str) -> Result<Self> {
        self.register(kind, storage_type)?;
        Ok(self)
    }

    /// Drop a kind's association
    pub fn unregister(&mut self, kind: SemanticKind) -> Option<String> {
        self.associations.remove(&kind)
    }

    /// Storage type for a kind
    pub fn storage_type_for(&self, kind: SemanticKind) -> Option<&str> {
        self.associations.get(&kind).map(String::as_str)
    }

    /// Storage type for a field's value, or `UnsupportedType`
    pub fn resolve(&self, field: &str, value: &Value) -> Result<&str> {
        let kind = value.kind();
        self.storage_type_for(kind)
            .ok_or_else(|| Error::UnsupportedType {
                field: field.to_string(),
                kind: kind.name().to_string(),
            })
    }

    /// Kind stored under a declared column type
    pub fn kind_for_storage(&self, storage_type: &str) -> Option<SemanticKind> {
        self.associations
            .iter()
            .find(|(_, s)| s.eq_ignore_ascii_case(storage_type))
            .map(|(k, _)| *k)
    }

    /// All associations, ordered by kind
    pub fn associations(&self) -> impl Iterator<Item = (SemanticKind, &str)> {
        self.associations.iter().map(|(k, s)| (*k, s.as_str()))
    }

    /// Take over associations persisted in a store file
    ///
    /// Persisted rows win over this registry's own. Rows naming a kind this
    /// build does not know are skipped.
    pub fn adopt<'a>(&mut self, persisted: impl IntoIterator<Item = (&'a str, &'a str)>) {
        for (kind_name, storage_type) in persisted {
            match SemanticKind::parse(kind_name) {
                Some(kind) if kind != SemanticKind::Null => {
                    if let Err(e) = self.register(kind, storage_type) {
                        warn!(
                            target: "juntdb::registry",
                            kind = kind_name,
                            storage_type,
                            error = %e,
                            "skipping persisted type association"
                        );
                    }
                }
                _ => warn!(
                    target: "juntdb::registry",
                    kind = kind_name,
                    storage_type,
                    "skipping persisted association for unknown kind"
                ),
            }
        }
    }

    // =========================================================================
    // Codecs
    // =========================================================================

    /// Encode a value for binding
    ///
    /// Fails with `InvalidInput` for NaN floats (SQLite would silently store
    /// NULL), and for lists or mappings holding non-finite floats or nested
    /// deeper than the decoder accepts.
    pub fn encode(&self, value: &Value) -> Result<SqlValue> {
        Ok(match value {
            Value::Null => SqlValue::Null,
            Value::Int(i) => SqlValue::Integer(*i),
            Value::Bool(b) => SqlValue::Integer(*b as i64),
            Value::Text(s) => SqlValue::Text(s.clone()),
            Value::Real(f) | Value::Float64(f) => {
                if f.is_nan() {
                    return Err(Error::invalid_input("NaN cannot be stored"));
                }
                SqlValue::Real(*f)
            }
            Value::Array(t) => SqlValue::Blob(t.to_blob()),
            Value::List(items) => {
                SqlValue::Text(encode_list(items).map_err(|e| Error::invalid_input(e.to_string()))?)
            }
            Value::Mapping(map) => {
                SqlValue::Text(encode_mapping(map).map_err(|e| Error::invalid_input(e.to_string()))?)
            }
            // Blobs skip the column's NUMERIC affinity, so "1e3" stays "1e3"
            Value::Function(c) => SqlValue::Blob(c.as_str().as_bytes().to_vec()),
            Value::Bytes(b) => SqlValue::Blob(b.clone()),
        })
    }

    /// Decode a stored value as `kind`
    ///
    /// `None` decodes by storage class alone. NULL is `Value::Null` for
    /// every kind.
    pub fn decode(&self, column: &str, raw: SqlValue, kind: Option<SemanticKind>) -> Result<Value> {
        if matches!(raw, SqlValue::Null) {
            return Ok(Value::Null);
        }
        let Some(kind) = kind else {
            return Ok(native(raw));
        };
        let mismatch = |raw: &SqlValue| {
            Error::decode(
                column,
                format!("{} column holds {}", kind, storage_class(raw)),
            )
        };
        match (kind, raw) {
            (SemanticKind::Integer, SqlValue::Integer(i)) => Ok(Value::Int(i)),
            (SemanticKind::Boolean, SqlValue::Integer(0)) => Ok(Value::Bool(false)),
            (SemanticKind::Boolean, SqlValue::Integer(1)) => Ok(Value::Bool(true)),
            (SemanticKind::Text, SqlValue::Text(s)) => Ok(Value::Text(s)),
            (SemanticKind::Real, SqlValue::Real(f)) => Ok(Value::Real(f)),
            (SemanticKind::Real, SqlValue::Integer(i)) => Ok(Value::Real(i as f64)),
            (SemanticKind::Float64, SqlValue::Real(f)) => Ok(Value::Float64(f)),
            (SemanticKind::Float64, SqlValue::Integer(i)) => Ok(Value::Float64(i as f64)),
            (SemanticKind::Array, SqlValue::Blob(b)) => Tensor::from_blob(&b)
                .map(Value::Array)
                .map_err(|e| Error::decode(column, e)),
            (SemanticKind::List, SqlValue::Text(s)) => decode_list(&s)
                .map(Value::List)
                .map_err(|e| Error::decode(column, e)),
            (SemanticKind::Mapping, SqlValue::Text(s)) => decode_mapping(&s)
                .map(Value::Mapping)
                .map_err(|e| Error::decode(column, e)),
            (SemanticKind::Function, SqlValue::Text(s)) => Ok(Value::Function(CallableRef::new(s))),
            (SemanticKind::Function, SqlValue::Blob(b)) => String::from_utf8(b)
                .map(|s| Value::Function(CallableRef::new(s)))
                .map_err(|e| Error::decode(column, e)),
            (SemanticKind::Bytes, SqlValue::Blob(b)) => Ok(Value::Bytes(b)),
            (_, raw) => Err(mismatch(&raw)),
        }
    }

    /// Decode a stored value using a column's declared type
    pub fn decode_declared(&self, column: &str, raw: SqlValue, declared: &str) -> Result<Value> {
        self.decode(column, raw, self.kind_for_storage(declared))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn native(raw: SqlValue) -> Value {
    match raw {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Int(i),
        SqlValue::Real(f) => Value::Real(f),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Blob(b) => Value::Bytes(b),
    }
}

fn storage_class(raw: &SqlValue) -> &'static str {
    match raw {
        SqlValue::Null => "null",
        SqlValue::Integer(_) => "integer",
        SqlValue::Real(_) => "real",
        SqlValue::Text(_) => "text",
        SqlValue::Blob(_) => "blob",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn round_trip(value: Value) -> Value {
        let registry = TypeRegistry::builtin();
        let kind = value.kind();
        let raw = registry.encode(&value).unwrap();
        registry.decode("col", raw, Some(kind)).unwrap()
    }

    #[test]
    fn test_builtin_associations() {
        let registry = TypeRegistry::builtin();
        assert_eq!(registry.storage_type_for(SemanticKind::Integer), Some("INTEGER"));
        assert_eq!(registry.storage_type_for(SemanticKind::Boolean), Some("BOOL"));
        assert_eq!(registry.storage_type_for(SemanticKind::Mapping), Some("DICT"));
        assert_eq!(registry.storage_type_for(SemanticKind::Bytes), None);
        assert_eq!(registry.associations().count(), 9);
        assert_eq!(registry.kind_for_storage("float64"), Some(SemanticKind::Float64));
    }

    #[test]
    fn test_resolve_unsupported() {
        let registry = TypeRegistry::builtin();
        let err = registry.resolve("blob", &Value::Bytes(vec![1])).unwrap_err();
        match err {
            Error::UnsupportedType { field, kind } => {
                assert_eq!(field, "blob");
                assert_eq!(kind, "bytes");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(registry.resolve("nothing", &Value::Null).is_err());
    }

    #[test]
    fn test_register_extends_and_validates() {
        let registry = TypeRegistry::builtin().with(SemanticKind::Bytes, "blob").unwrap();
        assert_eq!(registry.storage_type_for(SemanticKind::Bytes), Some("BLOB"));

        let mut registry = TypeRegistry::builtin();
        assert!(registry.register(SemanticKind::Null, "NULLTYPE").is_err());
        assert!(registry.register(SemanticKind::Bytes, "BLOB); DROP TABLE x").is_err());
        assert!(registry.register(SemanticKind::Bytes, "").is_err());
    }

    #[test]
    fn test_adopt_persisted() {
        let mut registry = TypeRegistry::empty();
        registry.adopt([("int", "INTEGER"), ("bytes", "BLOB"), ("complex", "COMPLEX"), ("none", "X")]);
        assert_eq!(registry.storage_type_for(SemanticKind::Integer), Some("INTEGER"));
        assert_eq!(registry.storage_type_for(SemanticKind::Bytes), Some("BLOB"));
        assert_eq!(registry.associations().count(), 2);
    }

    #[test]
    fn test_scalar_round_trips() {
        for v in [
            Value::Int(-42),
            Value::Bool(true),
            Value::Bool(false),
            Value::Text("machine learning".into()),
            Value::Real(0.1),
            Value::Float64(std::f64::consts::PI),
            Value::Function(CallableRef::new("scorer::keyword_score")),
        ] {
            assert_eq!(round_trip(v.clone()), v);
        }
    }

    #[test]
    fn test_precision_class_preserved() {
        assert!(matches!(round_trip(Value::Float64(1.5)), Value::Float64(_)));
        assert!(matches!(round_trip(Value::Real(1.5)), Value::Real(_)));
    }

    #[test]
    fn test_array_round_trip() {
        let t = Tensor::new(vec![2, 2], vec![0.5f64, 1.5, 2.5, 3.5]).unwrap();
        assert_eq!(round_trip(Value::Array(t.clone())), Value::Array(t));
    }

    #[test]
    fn test_list_and_mapping_round_trip() {
        let list = Value::List(vec![Value::Int(1), Value::Text("two".into()), Value::Bool(false)]);
        assert_eq!(round_trip(list.clone()), list);

        let mut map = BTreeMap::new();
        map.insert("score".to_string(), Value::Int(7));
        map.insert("tags".to_string(), Value::List(vec![Value::from("rust")]));
        let mapping = Value::Mapping(map);
        assert_eq!(round_trip(mapping.clone()), mapping);
    }

    #[test]
    fn test_numeric_looking_callable_names_stay_text() {
        let registry = TypeRegistry::builtin();
        let encoded = registry
            .encode(&Value::Function(CallableRef::new("1e3")))
            .unwrap();
        assert_eq!(encoded, SqlValue::Blob(b"1e3".to_vec()));
        for name in ["0.10", "1e3", "007"] {
            let v = Value::Function(CallableRef::new(name));
            assert_eq!(round_trip(v.clone()), v);
        }
        assert!(registry
            .decode("scorer", SqlValue::Blob(vec![0xff, 0xfe]), Some(SemanticKind::Function))
            .is_err());
    }

    #[test]
    fn test_too_deep_list_is_invalid_input() {
        let mut deep = Value::List(vec![Value::Int(1)]);
        for _ in 0..200 {
            deep = Value::List(vec![deep]);
        }
        assert!(matches!(
            TypeRegistry::builtin().encode(&deep),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_bool_is_zero_one() {
        let registry = TypeRegistry::builtin();
        assert_eq!(registry.encode(&Value::Bool(true)).unwrap(), SqlValue::Integer(1));
        assert_eq!(registry.encode(&Value::Bool(false)).unwrap(), SqlValue::Integer(0));
        assert!(registry
            .decode("viewed", SqlValue::Integer(2), Some(SemanticKind::Boolean))
            .is_err());
    }

    #[test]
    fn test_nan_rejected() {
        let registry = TypeRegistry::builtin();
        assert!(registry.encode(&Value::Real(f64::NAN)).is_err());
        assert!(registry.encode(&Value::Float64(f64::INFINITY)).is_ok());
    }

    #[test]
    fn test_null_decodes_for_every_kind() {
        let registry = TypeRegistry::builtin();
        for kind in SemanticKind::ALL {
            assert_eq!(registry.decode("c", SqlValue::Null, Some(kind)).unwrap(), Value::Null);
        }
    }

    #[test]
    fn test_mismatch_names_column() {
        let registry = TypeRegistry::builtin();
        let err = registry
            .decode("score", SqlValue::Text("abc".into()), Some(SemanticKind::Integer))
            .unwrap_err();
        assert!(err.to_string().contains("score"));
    }

    #[test]
    fn test_unknown_declared_type_decodes_natively() {
        let registry = TypeRegistry::builtin();
        let v = registry
            .decode_declared("legacy", SqlValue::Blob(vec![1, 2]), "VARBINARY")
            .unwrap();
        assert_eq!(v, Value::Bytes(vec![1, 2]));
    }
}
