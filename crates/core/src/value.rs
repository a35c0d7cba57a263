//! Value types for juntdb
//!
//! This module defines:
//! - Value: the closed set of values a record field can hold
//! - SemanticKind: the abstract category of a value, independent of storage
//! - CallableRef: a stable textual reference to a function
//!
//! ## Kind Rules
//!
//! - Every `Value` variant maps to exactly one `SemanticKind`
//! - The kind is derived from the variant, never from inspecting contents
//! - `Real` and `Float64` are both IEEE-754 binary64 but are distinct kinds:
//!   a `Float64` column always decodes back to `Float64`
//! - `Int(1) != Real(1.0)`: different variants are never equal

use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A value held by a record field
///
/// The serde representation is externally tagged with the kind name
/// (`{"int":5}`, `{"str":"a"}`). That tagged form is what list and mapping
/// columns store as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absent value (SQL NULL)
    #[serde(rename = "none")]
    Null,
    /// 64-bit signed integer
    #[serde(rename = "int")]
    Int(i64),
    /// Boolean, stored as 0/1
    #[serde(rename = "bool")]
    Bool(bool),
    /// UTF-8 text
    #[serde(rename = "str")]
    Text(String),
    /// Floating point value stored in a `REAL` column
    #[serde(rename = "float")]
    Real(f64),
    /// Double-precision float stored in a `FLOAT64` column
    #[serde(rename = "float64")]
    Float64(f64),
    /// N-dimensional array
    #[serde(rename = "ndarray")]
    Array(Tensor),
    /// Ordered list of values
    #[serde(rename = "list")]
    List(Vec<Value>),
    /// String-keyed mapping
    #[serde(rename = "dict")]
    Mapping(BTreeMap<String, Value>),
    /// Reference to a function by qualified name
    #[serde(rename = "function")]
    Function(CallableRef),
    /// Raw bytes
    #[serde(rename = "bytes")]
    Bytes(Vec<u8>),
}

impl Value {
    /// Semantic kind of this value
    pub fn kind(&self) -> SemanticKind {
        match self {
            Value::Null => SemanticKind::Null,
            Value::Int(_) => SemanticKind::Integer,
            Value::Bool(_) => SemanticKind::Boolean,
            Value::Text(_) => SemanticKind::Text,
            Value::Real(_) => SemanticKind::Real,
            Value::Float64(_) => SemanticKind::Float64,
            Value::Array(_) => SemanticKind::Array,
            Value::List(_) => SemanticKind::List,
            Value::Mapping(_) => SemanticKind::Mapping,
            Value::Function(_) => SemanticKind::Function,
            Value::Bytes(_) => SemanticKind::Bytes,
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as i64 if this is an Int value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as bool if this is a Bool value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as &str if this is a Text value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get as f64 if this is a Real or Float64 value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(f) | Value::Float64(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as &Tensor if this is an Array value
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Value::Array(t) => Some(t),
            _ => None,
        }
    }

    /// Get as &[Value] if this is a List value
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Get as &BTreeMap if this is a Mapping value
    pub fn as_mapping(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Get as &CallableRef if this is a Function value
    pub fn as_callable(&self) -> Option<&CallableRef> {
        match self {
            Value::Function(c) => Some(c),
            _ => None,
        }
    }

    /// True if any float nested in this value is NaN or infinite
    pub fn contains_non_finite(&self) -> bool {
        match self {
            Value::Real(f) | Value::Float64(f) => !f.is_finite(),
            Value::Array(t) => t.contains_non_finite(),
            Value::List(items) => items.iter().any(Value::contains_non_finite),
            Value::Mapping(map) => map.values().any(Value::contains_non_finite),
            _ => false,
        }
    }
}

// ============================================================================
// From implementations for ergonomic API usage
// ============================================================================

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Real(f)
    }
}

impl From<Tensor> for Value {
    fn from(t: Tensor) -> Self {
        Value::Array(t)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Mapping(map)
    }
}

impl From<CallableRef> for Value {
    fn from(c: CallableRef) -> Self {
        Value::Function(c)
    }
}

// ============================================================================
// SemanticKind
// ============================================================================

/// Abstract category of a value
///
/// The `name()` strings are persisted in the type-association table and must
/// not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SemanticKind {
    /// 64-bit integer
    Integer,
    /// Boolean
    Boolean,
    /// UTF-8 text
    Text,
    /// Floating point
    Real,
    /// Double-precision float
    Float64,
    /// N-dimensional array
    Array,
    /// Ordered list
    List,
    /// String-keyed mapping
    Mapping,
    /// Callable reference
    Function,
    /// Raw bytes (not registered by default)
    Bytes,
    /// Null (never registrable)
    Null,
}

impl SemanticKind {
    /// Every kind, in declaration order
    pub const ALL: [SemanticKind; 11] = [
        SemanticKind::Integer,
        SemanticKind::Boolean,
        SemanticKind::Text,
        SemanticKind::Real,
        SemanticKind::Float64,
        SemanticKind::Array,
        SemanticKind::List,
        SemanticKind::Mapping,
        SemanticKind::Function,
        SemanticKind::Bytes,
        SemanticKind::Null,
    ];

    /// Persisted kind name
    pub fn name(&self) -> &'static str {
        match self {
            SemanticKind::Integer => "int",
            SemanticKind::Boolean => "bool",
            SemanticKind::Text => "str",
            SemanticKind::Real => "float",
            SemanticKind::Float64 => "float64",
            SemanticKind::Array => "ndarray",
            SemanticKind::List => "list",
            SemanticKind::Mapping => "dict",
            SemanticKind::Function => "function",
            SemanticKind::Bytes => "bytes",
            SemanticKind::Null => "none",
        }
    }

    /// Parse a persisted kind name
    pub fn parse(name: &str) -> Option<Self> {
        SemanticKind::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for SemanticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// CallableRef
// ============================================================================

/// Stable textual reference to a function
///
/// Stores the fully-qualified path (`my_crate::scoring::score_entry`). The
/// store never holds live function pointers; callers that want the referent
/// back resolve the name against a table they own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallableRef(String);

impl CallableRef {
    /// Create from an explicit qualified name
    pub fn new(name: impl Into<String>) -> Self {
        CallableRef(name.into())
    }

    /// Reference to a function item by its type
    ///
    /// ```
    /// use juntdb_core::CallableRef;
    ///
    /// fn score(_: i64) -> i64 { 0 }
    /// let r = CallableRef::of(score);
    /// assert!(r.as_str().ends_with("score"));
    /// ```
    pub fn of<F>(_f: F) -> Self {
        CallableRef(std::any::type_name::<F>().to_string())
    }

    /// Qualified name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve against a caller-owned table of referents
    pub fn resolve_in<'a, T>(&self, table: &'a HashMap<String, T>) -> Option<&'a T> {
        table.get(&self.0)
    }
}

impl fmt::Display for CallableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
