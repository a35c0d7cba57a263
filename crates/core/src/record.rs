//! Records handed to the store
//!
//! A record is an ordered set of named values that always carries the
//! `date` identity field. Field names follow SQLite column semantics and
//! compare ASCII-case-insensitively, so `Score` and `score` are one field.

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::value::Value;

/// Name of the identity field and primary-key column
pub const IDENTITY_FIELD: &str = "date";

/// Ordered mapping from field name to value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Empty record with no identity
    pub fn new() -> Self {
        Self::default()
    }

    /// Record carrying `identity` as its `date` field
    pub fn with_identity(identity: Identity) -> Self {
        let mut record = Record::new();
        record.set(IDENTITY_FIELD, Value::Text(identity.to_string()));
        record
    }

    /// Builder form of [`Record::set`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field, replacing any existing value in place
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.fields[i].1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    /// Get a field's value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|i| &self.fields[i].1)
    }

    /// Remove a field, returning its value
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.position(name).map(|i| self.fields.remove(i).1)
    }

    /// True if the field is present
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Number of fields, identity included
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if there are no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All fields in insertion order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// All fields except the identity, in insertion order
    pub fn data_fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields()
            .filter(|(k, _)| !k.eq_ignore_ascii_case(IDENTITY_FIELD))
    }

    /// Validated identity
    ///
    /// The `date` field must be text of exactly 17 digits, or an integer
    /// that has exactly 17 digits.
    pub fn identity(&self) -> Result<Identity> {
        match self.get(IDENTITY_FIELD) {
            None => Err(Error::malformed_identity(format!(
                "record has no '{}' field",
                IDENTITY_FIELD
            ))),
            Some(Value::Text(s)) => Identity::parse(s),
            Some(Value::Int(i)) => Identity::from_seventeen_digits(*i),
            Some(other) => Err(Error::malformed_identity(format!(
                "'{}' field holds a {} value",
                IDENTITY_FIELD,
                other.kind()
            ))),
        }
    }

    /// Replace the identity, keeping the caller's representation
    pub fn set_identity(&mut self, identity: Identity) {
        let value = match self.get(IDENTITY_FIELD) {
            Some(Value::Int(_)) => Value::Int(identity.as_i64()),
            _ => Value::Text(identity.to_string()),
        };
        self.set(IDENTITY_FIELD, value);
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}
