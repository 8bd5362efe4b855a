//! Resource registry mapping names to collection implementations
//!
//! Resources register once at startup; afterwards the registry is read-only
//! metadata shared across requests, so concurrent reads need no locking.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::core::error::{GatewayError, NotFoundError};
use crate::core::store::ResourceCollection;

/// Registry for all resources exposed by the gateway
#[derive(Default)]
pub struct ResourceRegistry {
    collections: HashMap<String, Arc<dyn ResourceCollection>>,
}

impl ResourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            collections: HashMap::new(),
        }
    }

    /// Register a collection under its descriptor's name
    ///
    /// Registering the same name twice replaces the earlier entry.
    pub fn register(&mut self, collection: Arc<dyn ResourceCollection>) {
        let name = collection.descriptor().name.clone();
        self.collections.insert(name, collection);
    }

    /// Look up a collection by exact, case-sensitive name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ResourceCollection>> {
        self.collections.get(name).cloned()
    }

    /// Look up a collection, propagating a 404 for unknown names
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ResourceCollection>, GatewayError> {
        self.get(name).ok_or_else(|| {
            NotFoundError::Resource {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Field metadata for a resource, computable without side effects
    pub fn describe(&self, name: &str) -> Result<Value, GatewayError> {
        Ok(self.resolve(name)?.descriptor().describe())
    }

    /// Names of all registered resources
    pub fn names(&self) -> Vec<&str> {
        self.collections.keys().map(|s| s.as_str()).collect()
    }

    /// The identity-like resource, if one is registered
    pub fn identity_resource(&self) -> Option<Arc<dyn ResourceCollection>> {
        self.collections
            .values()
            .find(|c| c.descriptor().identity)
            .cloned()
    }
}
