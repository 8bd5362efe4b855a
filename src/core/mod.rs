//! Core module containing the fundamental types of the gateway

pub mod error;
pub mod filter;
pub mod query;
pub mod record;
pub mod resource;
pub mod store;

pub use error::{AuthError, GatewayError, NotFoundError, QueryError, RequestError};
pub use filter::{Condition, FilterNode, FilterOp};
pub use query::QueryPlan;
pub use record::{Record, RecordId};
pub use resource::{FieldDescriptor, FieldType, ResourceDescriptor};
pub use store::ResourceCollection;
