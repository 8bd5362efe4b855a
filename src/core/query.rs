//! Query plans: pagination, filtering and field projection
//!
//! List reads accept parameters from the query string and, for reads only,
//! from an optional JSON body; explicit query-string values win over body
//! values. [`QueryPlan::build`] normalizes everything into one plan:
//!
//! - `limit` (alias `page_size`): default 80, clamped to the configured
//!   maximum; zero and negative values are rejected rather than meaning
//!   "unbounded"
//! - `offset` / `page`: `offset = (page - 1) * limit` when only `page` is
//!   given; an explicit `offset` always wins
//! - `domain`: JSON filter tree, passed through except for the `is_active`
//!   normalization
//! - `fields`: JSON array or comma list; dotted paths split into the root
//!   (kept in the flat projection) and a sub-path handed to the expander
//! - `is_active`/`active`: rewrites the active-field term (last-write-wins)
//!   and disables the store's implicit default-active filter, so explicit
//!   true and false requests are both satisfiable
//! - `image_url`: toggles binary-field URL rewriting

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::config::GatewayConfig;
use crate::core::error::QueryError;
use crate::core::filter::{Condition, FilterNode};
use crate::core::resource::ResourceDescriptor;
use crate::expand::FieldSelection;

/// Normalized plan for one list or single-record read
///
/// Owned by the dispatcher for the lifetime of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Parsed filter tree (match-all when no domain was supplied)
    pub filter: FilterNode,

    /// Flat projection: requested top-level fields, nested roots included.
    /// Empty means "all readable fields".
    pub fields: Vec<String>,

    /// Nested expansion tree grouped by root field
    pub selection: FieldSelection,

    pub limit: usize,
    pub offset: usize,

    /// 1-based page, explicit or derived from offset
    pub page: usize,

    /// Whether the store applies its implicit default-active filter
    pub active_test: bool,

    /// Rewrite binary fields to retrieval URLs
    pub binary_urls: bool,
}

impl QueryPlan {
    /// Build a plan from merged request parameters
    pub fn build(
        descriptor: &ResourceDescriptor,
        params: &Map<String, Value>,
        config: &GatewayConfig,
    ) -> Result<Self, QueryError> {
        let limit = match param_i64(params, "limit")?.or(param_i64(params, "page_size")?) {
            None => config.pagination.default_limit,
            Some(v) if v <= 0 => {
                return Err(QueryError::InvalidParameter {
                    name: "limit".to_string(),
                    message: "must be a positive integer".to_string(),
                });
            }
            Some(v) => (v as usize).min(config.pagination.max_limit),
        };

        let explicit_offset = param_i64(params, "offset")?;
        if explicit_offset.is_some_and(|v| v < 0) {
            return Err(QueryError::InvalidParameter {
                name: "offset".to_string(),
                message: "must not be negative".to_string(),
            });
        }
        let explicit_page = param_i64(params, "page")?;
        if explicit_page.is_some_and(|v| v < 1) {
            return Err(QueryError::InvalidParameter {
                name: "page".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        // Explicit offset wins; page is only a derivation convenience
        let offset = match (explicit_offset, explicit_page) {
            (Some(offset), _) => offset as usize,
            (None, Some(page)) => (page as usize - 1) * limit,
            (None, None) => 0,
        };
        let page = match explicit_page {
            Some(page) if explicit_offset.is_none() => page as usize,
            _ => offset / limit + 1,
        };

        let mut filter = match param_json(params, "domain")? {
            None => FilterNode::empty(),
            Some(domain) => FilterNode::parse(&domain)?,
        };

        let (fields, selection) = parse_fields(descriptor, params)?;
        if selection.depth() > config.expansion.max_depth {
            return Err(QueryError::DepthExceeded {
                max: config.expansion.max_depth,
            });
        }

        let active_flag = match param_bool(params, "is_active")? {
            Some(flag) => Some(flag),
            None => param_bool(params, "active")?,
        };
        let mut active_test = true;
        if let (Some(flag), Some(active_field)) = (active_flag, &descriptor.active_field) {
            filter.set_term(Condition::eq(active_field.clone(), Value::Bool(flag)));
            active_test = false;
        }

        let binary_urls = param_bool(params, "image_url")?.unwrap_or(false);

        Ok(Self {
            filter,
            fields,
            selection,
            limit,
            offset,
            page,
            active_test,
            binary_urls,
        })
    }
}

/// Total page count for a list result (`limit` is always positive here)
pub fn total_pages(total: usize, limit: usize) -> usize {
    total.div_ceil(limit.max(1))
}

/// Merge query-string parameters over an optional JSON read body
///
/// Body values act as defaults; explicit query-string values override them.
pub fn merge_params(query: HashMap<String, String>, body: Option<Value>) -> Map<String, Value> {
    let mut params = match body {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    for (key, value) in query {
        params.insert(key, Value::String(value));
    }
    params
}

/// Parse the `fields` parameter into a flat projection and expansion tree
fn parse_fields(
    descriptor: &ResourceDescriptor,
    params: &Map<String, Value>,
) -> Result<(Vec<String>, FieldSelection), QueryError> {
    let raw = match params.get("fields") {
        None | Some(Value::Null) => return Ok((Vec::new(), FieldSelection::new())),
        Some(value) => value,
    };

    let paths: Vec<String> = match raw {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    QueryError::InvalidParameter {
                        name: "fields".to_string(),
                        message: "entries must be strings".to_string(),
                    }
                })
            })
            .collect::<Result<_, _>>()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok((Vec::new(), FieldSelection::new()));
            }
            if trimmed.starts_with('[') {
                let parsed: Vec<String> =
                    serde_json::from_str(trimmed).map_err(|e| QueryError::InvalidParameter {
                        name: "fields".to_string(),
                        message: format!("invalid JSON list: {}", e),
                    })?;
                parsed
            } else {
                trimmed
                    .split(',')
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect()
            }
        }
        _ => {
            return Err(QueryError::InvalidParameter {
                name: "fields".to_string(),
                message: "must be a JSON list or comma-separated string".to_string(),
            });
        }
    };

    let selection = FieldSelection::from_paths(paths.iter().map(String::as_str));

    // Flat projection: plain fields first, then the nested roots so the raw
    // references are available for re-indexing
    let mut fields = selection.fields.clone();
    for root in selection.nested.keys() {
        if !fields.iter().any(|f| f == root) {
            fields.push(root.clone());
        }
    }

    // Unknown root fields are a caller error, caught here rather than deep
    // in the store
    for field in &fields {
        if !descriptor.has_field(field) {
            return Err(QueryError::UnknownField {
                resource: descriptor.name.clone(),
                field: field.clone(),
            });
        }
    }

    Ok((fields, selection))
}

fn param_i64(params: &Map<String, Value>, name: &str) -> Result<Option<i64>, QueryError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| integer_error(name)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| integer_error(name)),
        Some(_) => Err(integer_error(name)),
    }
}

fn integer_error(name: &str) -> QueryError {
    QueryError::InvalidParameter {
        name: name.to_string(),
        message: "must be an integer".to_string(),
    }
}

fn param_bool(params: &Map<String, Value>, name: &str) -> Result<Option<bool>, QueryError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            _ => Err(QueryError::InvalidParameter {
                name: name.to_string(),
                message: "must be a boolean".to_string(),
            }),
        },
        Some(_) => Err(QueryError::InvalidParameter {
            name: name.to_string(),
            message: "must be a boolean".to_string(),
        }),
    }
}

/// Parse a JSON-valued parameter that may arrive string-encoded
fn param_json(params: &Map<String, Value>, name: &str) -> Result<Option<Value>, QueryError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            serde_json::from_str(s)
                .map(Some)
                .map_err(|e| QueryError::InvalidParameter {
                    name: name.to_string(),
                    message: format!("invalid JSON: {}", e),
                })
        }
        Some(other) => Ok(Some(other.clone())),
    }
}
