//! The resource collection capability trait
//!
//! Every resource registers one implementation of [`ResourceCollection`] at
//! startup; the dispatcher only ever talks to this interface. The gateway is
//! agnostic to the underlying storage mechanism — implementations delegate
//! to whatever search/read/write primitives their backend offers and rely on
//! its per-call atomicity. No gateway operation spans more than one call.

use anyhow::Result;
use async_trait::async_trait;

use crate::core::filter::FilterNode;
use crate::core::record::{Record, RecordId};
use crate::core::resource::ResourceDescriptor;

/// Fixed capability interface for one resource
///
/// `search`/`count` honor the implicit default-active filter (records whose
/// active field is `false` are hidden) unless `active_test` is `false`;
/// resources without an active field ignore the flag entirely.
#[async_trait]
pub trait ResourceCollection: Send + Sync {
    /// Field metadata for this resource
    fn descriptor(&self) -> &ResourceDescriptor;

    /// Bounded search: matching records in stable id order
    async fn search(
        &self,
        filter: &FilterNode,
        limit: usize,
        offset: usize,
        active_test: bool,
    ) -> Result<Vec<Record>>;

    /// Number of records matching the filter
    async fn count(&self, filter: &FilterNode, active_test: bool) -> Result<usize>;

    /// Fetch one full record by id, ignoring the active filter
    async fn get(&self, id: RecordId) -> Result<Option<Record>>;

    /// Bulk-read records by id, projected onto `fields` (empty = all
    /// readable). Results keep the input id order; unknown ids are skipped.
    async fn read(&self, ids: &[RecordId], fields: &[String]) -> Result<Vec<Record>>;

    /// Insert a record; the store assigns the id
    async fn create(&self, values: Record) -> Result<Record>;

    /// Apply a partial update; `None` when the id does not resolve
    async fn update(&self, id: RecordId, values: Record) -> Result<Option<Record>>;

    /// Remove a record; `false` when the id does not resolve
    async fn delete(&self, id: RecordId) -> Result<bool>;
}
