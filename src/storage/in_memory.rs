//! In-memory implementation of ResourceCollection for testing and development

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use crate::core::filter::FilterNode;
use crate::core::record::{Record, RecordId};
use crate::core::resource::{ResourceDescriptor, project};
use crate::core::store::ResourceCollection;

/// In-memory resource collection
///
/// Uses RwLock for thread-safe access; a BTreeMap keeps records in id order
/// so list reads are deterministic. Ids are assigned monotonically from 1.
pub struct InMemoryCollection {
    descriptor: ResourceDescriptor,
    records: Arc<RwLock<BTreeMap<RecordId, Record>>>,
    next_id: AtomicI64,
}

impl InMemoryCollection {
    /// Create an empty collection for the given descriptor
    pub fn new(descriptor: ResourceDescriptor) -> Self {
        Self {
            descriptor,
            records: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: AtomicI64::new(1),
        }
    }

    /// Whether a record passes the implicit default-active filter
    fn passes_active(&self, record: &Record, active_test: bool) -> bool {
        if !active_test {
            return true;
        }
        let Some(active_field) = &self.descriptor.active_field else {
            return true;
        };
        // Only an explicit `false` hides the record
        record.get(active_field) != Some(&Value::Bool(false))
    }
}

#[async_trait]
impl ResourceCollection for InMemoryCollection {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    async fn search(
        &self,
        filter: &FilterNode,
        limit: usize,
        offset: usize,
        active_test: bool,
    ) -> Result<Vec<Record>> {
        let records = self
            .records
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(records
            .values()
            .filter(|r| self.passes_active(r, active_test) && filter.matches(r))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &FilterNode, active_test: bool) -> Result<usize> {
        let records = self
            .records
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(records
            .values()
            .filter(|r| self.passes_active(r, active_test) && filter.matches(r))
            .count())
    }

    async fn get(&self, id: RecordId) -> Result<Option<Record>> {
        let records = self
            .records
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(records.get(&id).cloned())
    }

    async fn read(&self, ids: &[RecordId], fields: &[String]) -> Result<Vec<Record>> {
        let records = self
            .records
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(ids
            .iter()
            .filter_map(|id| records.get(id))
            .map(|r| project(&self.descriptor, r, fields))
            .collect())
    }

    async fn create(&self, values: Record) -> Result<Record> {
        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let mut record = values;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        record.set_id(id);

        // Soft-deletable records start out active
        if let Some(active_field) = &self.descriptor.active_field
            && !record.contains(active_field)
        {
            record.set(active_field.clone(), Value::Bool(true));
        }

        records.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: RecordId, values: Record) -> Result<Option<Record>> {
        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let Some(record) = records.get_mut(&id) else {
            return Ok(None);
        };
        for (field, value) in values.into_values() {
            if field == "id" {
                continue; // ids are immutable
            }
            record.set(field, value);
        }
        Ok(Some(record.clone()))
    }

    async fn delete(&self, id: RecordId) -> Result<bool> {
        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        Ok(records.remove(&id).is_some())
    }
}
