//! Resource descriptors: field types, relations and metadata
//!
//! A [`ResourceDescriptor`] declares the shape of one resource: an ordered
//! mapping of field names to typed descriptors, the display field, the
//! optional active/soft-delete field and whether the resource holds
//! identities. Descriptors are immutable at request time and safe to share.

use indexmap::IndexMap;
use serde_json::{Map, Value, json};

use crate::core::record::Record;

/// Type of a resource field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Char,
    Text,
    Integer,
    Float,
    Boolean,
    DateTime,
    /// Base64 payload; rewritable to a retrieval URL on reads
    Binary,
    /// Holds a single foreign id of the target resource
    ManyToOne { relation: String },
    /// Holds a list of foreign ids of the target resource
    ToMany { relation: String },
}

impl FieldType {
    /// Target resource name for relational fields
    pub fn relation(&self) -> Option<&str> {
        match self {
            FieldType::ManyToOne { relation } | FieldType::ToMany { relation } => Some(relation),
            _ => None,
        }
    }

    pub fn is_relational(&self) -> bool {
        self.relation().is_some()
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, FieldType::Binary)
    }

    /// Stable type name used in field metadata
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::Char => "char",
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::DateTime => "datetime",
            FieldType::Binary => "binary",
            FieldType::ManyToOne { .. } => "many_to_one",
            FieldType::ToMany { .. } => "to_many",
        }
    }
}

/// Declaration of one field on a resource
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub field_type: FieldType,

    /// Must be present and non-null on create
    pub required: bool,

    /// Whether the field may appear in read projections. Credential hashes
    /// are stored with `readable = false` and never leave the store.
    pub readable: bool,
}

impl FieldDescriptor {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            readable: true,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn internal(mut self) -> Self {
        self.readable = false;
        self
    }
}

/// Declaration of one resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    /// Registry key, matched case-sensitively (e.g. "res.users")
    pub name: String,

    /// Field used as the record's display label
    pub display_field: String,

    /// Soft-delete flag field; records with a `false` value are hidden from
    /// reads unless the query plan disables the implicit filter
    pub active_field: Option<String>,

    /// Identity-like resources get uniqueness/password handling and token
    /// issuance in the dispatcher
    pub identity: bool,

    /// Ordered field map; `id` is implicit and always present on records
    pub fields: IndexMap<String, FieldDescriptor>,
}

impl ResourceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_field: "name".to_string(),
            active_field: None,
            identity: false,
            fields: IndexMap::new(),
        }
    }

    /// Add a field (builder style)
    pub fn field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.fields.insert(name.into(), descriptor);
        self
    }

    pub fn with_display_field(mut self, field: impl Into<String>) -> Self {
        self.display_field = field.into();
        self
    }

    pub fn with_active_field(mut self, field: impl Into<String>) -> Self {
        self.active_field = Some(field.into());
        self
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    /// Whether `name` is a declared field or the implicit `id`
    pub fn has_field(&self, name: &str) -> bool {
        name == "id" || self.fields.contains_key(name)
    }

    /// All readable field names, in declaration order (without `id`)
    pub fn readable_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, d)| d.readable)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Field metadata projection, computable without side effects
    ///
    /// Shape: `{"id": {"type": "integer", ...}, "<field>": {"type": ...,
    /// "required": ..., "relation"?: ...}}`.
    pub fn describe(&self) -> Value {
        let mut out = Map::new();
        out.insert(
            "id".to_string(),
            json!({"type": "integer", "required": false, "readonly": true}),
        );
        for (name, descriptor) in &self.fields {
            let mut meta = Map::new();
            meta.insert(
                "type".to_string(),
                Value::from(descriptor.field_type.type_name()),
            );
            meta.insert("required".to_string(), Value::from(descriptor.required));
            if let Some(relation) = descriptor.field_type.relation() {
                meta.insert("relation".to_string(), Value::from(relation));
            }
            out.insert(name.clone(), Value::Object(meta));
        }
        Value::Object(out)
    }
}

/// Project a record onto a field set
///
/// An empty `fields` slice means "all readable fields" (the framework
/// default). The `id` field is always included; unreadable fields are
/// silently omitted even when explicitly requested; fields absent on the
/// record surface as `null`.
pub fn project(descriptor: &ResourceDescriptor, record: &Record, fields: &[String]) -> Record {
    let defaults;
    let wanted: &[String] = if fields.is_empty() {
        defaults = descriptor.readable_fields();
        &defaults
    } else {
        fields
    };

    let mut out = Record::new();
    if let Some(id) = record.id() {
        out.set_id(id);
    }
    for name in wanted {
        if name == "id" {
            continue;
        }
        let readable = descriptor.get_field(name).is_some_and(|d| d.readable);
        if !readable {
            continue;
        }
        out.set(
            name.clone(),
            record.get(name).cloned().unwrap_or(Value::Null),
        );
    }
    out
}
