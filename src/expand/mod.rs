//! Nested relation expansion
//!
//! Given a page of records and a tree of dotted field paths, the expander
//! replaces raw foreign-key references with embedded records: a many-to-one
//! field becomes the expanded record (or `null`), a to-many field becomes an
//! ordered list of expanded records. Target records are bulk-fetched once
//! per level — one `read` per relational root — and re-indexed by id, so a
//! page never triggers per-record queries. Expansion mutates the targeted
//! fields in place and never reorders the top-level sequence.
//!
//! Depth and per-level fan-out are bounded by [`ExpansionConfig`]; both
//! limits exist because unbounded recursive expansion over attacker-chosen
//! field paths can exhaust the store.

use futures::FutureExt;
use futures::future::BoxFuture;
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use std::collections::HashMap;

use crate::config::ExpansionConfig;
use crate::core::error::{GatewayError, QueryError};
use crate::core::record::{Record, RecordId};
use crate::core::resource::ResourceDescriptor;
use crate::core::store::ResourceCollection;
use crate::registry::ResourceRegistry;

/// Requested fields at one expansion level
///
/// `fields` are read directly; each entry in `nested` names a relational
/// root whose sub-selection is expanded recursively. Built from a flat list
/// of possibly-dotted paths; ordering of sub-paths per root is irrelevant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSelection {
    pub fields: Vec<String>,
    pub nested: IndexMap<String, FieldSelection>,
}

impl FieldSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a selection from a flat path list, splitting on `.`
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selection = Self::new();
        for path in paths {
            selection.insert_path(path.as_ref());
        }
        selection
    }

    /// Insert one path, e.g. `"manager.department.name"`
    pub fn insert_path(&mut self, path: &str) {
        match path.split_once('.') {
            None => {
                if !path.is_empty() && !self.fields.iter().any(|f| f == path) {
                    self.fields.push(path.to_string());
                }
            }
            Some((root, rest)) => {
                self.nested
                    .entry(root.to_string())
                    .or_default()
                    .insert_path(rest);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.nested.is_empty()
    }

    /// Number of expansion levels below this one
    pub fn depth(&self) -> usize {
        self.nested
            .values()
            .map(|sub| sub.depth() + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Expand all nested relations of `selection` into `records`
pub async fn expand_records(
    registry: &ResourceRegistry,
    descriptor: &ResourceDescriptor,
    records: &mut [Record],
    selection: &FieldSelection,
    config: &ExpansionConfig,
) -> Result<(), GatewayError> {
    expand_level(registry, descriptor.clone(), records, selection, config, 0).await
}

/// One level of expansion; recursion is boxed so the future stays `Sized`
fn expand_level<'a>(
    registry: &'a ResourceRegistry,
    descriptor: ResourceDescriptor,
    records: &'a mut [Record],
    selection: &'a FieldSelection,
    config: &'a ExpansionConfig,
    depth: usize,
) -> BoxFuture<'a, Result<(), GatewayError>> {
    async move {
        if depth >= config.max_depth && !selection.nested.is_empty() {
            return Err(QueryError::DepthExceeded {
                max: config.max_depth,
            }
            .into());
        }

        for (root, sub) in &selection.nested {
            // Non-relational or unknown roots are skipped, not errored
            let Some(field) = descriptor.get_field(root) else {
                continue;
            };
            let Some(relation) = field.field_type.relation() else {
                continue;
            };
            let target = registry.get(relation).ok_or_else(|| GatewayError::Store {
                message: format!(
                    "relation target '{}' of field '{}' is not registered",
                    relation, root
                ),
            })?;

            let ids = collect_ids(records, root);
            if ids.len() > config.max_ids_per_level {
                return Err(QueryError::TooManyTargets {
                    max: config.max_ids_per_level,
                }
                .into());
            }
            if ids.is_empty() {
                continue;
            }

            let target_descriptor = target.descriptor().clone();
            let ids: Vec<RecordId> = ids.into_iter().collect();
            // Projection: the direct fields plus the roots of deeper paths,
            // whose raw references the next level still needs. `read` always
            // includes the id, which the re-indexing below depends on.
            let mut projection = sub.fields.clone();
            for deeper_root in sub.nested.keys() {
                if !projection.iter().any(|f| f == deeper_root) {
                    projection.push(deeper_root.clone());
                }
            }
            let mut fetched = target.read(&ids, &projection).await?;

            if !sub.nested.is_empty() {
                expand_level(
                    registry,
                    target_descriptor,
                    &mut fetched,
                    sub,
                    config,
                    depth + 1,
                )
                .await?;
            }

            let index: HashMap<RecordId, Record> = fetched
                .into_iter()
                .filter_map(|record| record.id().map(|id| (id, record)))
                .collect();

            for record in records.iter_mut() {
                rewrite_field(record, root, &index);
            }
        }
        Ok(())
    }
    .boxed()
}

/// Distinct target ids referenced by `field` across all records
fn collect_ids(records: &[Record], field: &str) -> IndexSet<RecordId> {
    let mut ids = IndexSet::new();
    for record in records {
        match record.get(field) {
            Some(Value::Number(n)) => {
                if let Some(id) = n.as_i64() {
                    ids.insert(id);
                }
            }
            Some(Value::Array(items)) => {
                ids.extend(items.iter().filter_map(Value::as_i64));
            }
            _ => {}
        }
    }
    ids
}

/// Replace a raw reference value with the expanded record(s)
///
/// Many-to-one references with no match become `null`; to-many ids with no
/// match are dropped from the list.
fn rewrite_field(record: &mut Record, field: &str, index: &HashMap<RecordId, Record>) {
    let Some(current) = record.get(field).cloned() else {
        return;
    };
    match current {
        Value::Number(n) => {
            let expanded = n
                .as_i64()
                .and_then(|id| index.get(&id))
                .map(|r| Value::from(r.clone()))
                .unwrap_or(Value::Null);
            record.set(field, expanded);
        }
        Value::Array(items) => {
            let expanded: Vec<Value> = items
                .iter()
                .filter_map(Value::as_i64)
                .filter_map(|id| index.get(&id))
                .map(|r| Value::from(r.clone()))
                .collect();
            record.set(field, Value::Array(expanded));
        }
        _ => {}
    }
}
