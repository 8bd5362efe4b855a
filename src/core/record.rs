//! Generic records addressed by integer ids
//!
//! A [`Record`] is an untyped mapping from field names to JSON values. The
//! store assigns the immutable `id` field; everything else is described by
//! the owning resource's descriptor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of a record inside its resource
pub type RecordId = i64;

/// One addressable entity within a resource
///
/// Relational fields hold a raw foreign id (many-to-one) or an array of
/// foreign ids (to-many) until the relation expander replaces them with
/// embedded records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(flatten)]
    values: Map<String, Value>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self { values: Map::new() }
    }

    /// Wrap an existing JSON object
    pub fn from_values(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// The record id, if assigned
    pub fn id(&self) -> Option<RecordId> {
        self.values.get("id").and_then(Value::as_i64)
    }

    /// Assign the record id (store-internal)
    pub fn set_id(&mut self, id: RecordId) {
        self.values.insert("id".to_string(), Value::from(id));
    }

    /// Get a field value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Set a field value
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }

    /// Remove a field, returning its previous value
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.values.shift_remove(field)
    }

    /// Whether the record carries a value for `field`
    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Iterate over field names present on the record
    pub fn field_names(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// Borrow the underlying JSON object
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Consume the record into its JSON object
    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }

    /// Human-readable label for the record
    ///
    /// Falls back to `#<id>` when the display field is unset or not a string.
    pub fn display_name(&self, display_field: &str) -> String {
        match self.get(display_field).and_then(Value::as_str) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => format!("#{}", self.id().unwrap_or_default()),
        }
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.values)
    }
}
