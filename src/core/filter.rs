//! Domain filter trees
//!
//! A domain is a JSON-encoded sequence describing a boolean predicate over
//! record fields, in prefix notation: the strings `"&"`, `"|"` and `"!"`
//! combine the terms that follow them, and a term is a `[field, operator,
//! value]` triple. Terms left over after operator consumption are joined by
//! an implicit AND, so `[["a","=",1],["b","=",2]]` means `a = 1 AND b = 2`.
//!
//! The gateway parses domains into a [`FilterNode`] tree, hands the tree to
//! the store unchanged, and applies exactly one normalization on top: the
//! `is_active` convenience flag replaces any condition on the designated
//! active field (last-write-wins on that single field, see
//! [`FilterNode::set_term`]).

use regex::Regex;
use serde_json::Value;

use crate::core::error::QueryError;
use crate::core::record::Record;

/// Comparison operator of a filter condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
    Like,
    ILike,
}

impl FilterOp {
    /// Parse the operator token used in domain triples
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "=" | "==" => Some(FilterOp::Eq),
            "!=" | "<>" => Some(FilterOp::Ne),
            ">" => Some(FilterOp::Gt),
            ">=" => Some(FilterOp::Ge),
            "<" => Some(FilterOp::Lt),
            "<=" => Some(FilterOp::Le),
            "in" => Some(FilterOp::In),
            "not in" => Some(FilterOp::NotIn),
            "like" => Some(FilterOp::Like),
            "ilike" => Some(FilterOp::ILike),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::In => "in",
            FilterOp::NotIn => "not in",
            FilterOp::Like => "like",
            FilterOp::ILike => "ilike",
        }
    }
}

/// One `[field, operator, value]` term
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    /// Shorthand for an equality term
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    /// Evaluate the condition against a record; absent fields read as null
    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Eq => json_eq(actual, &self.value),
            FilterOp::Ne => !json_eq(actual, &self.value),
            FilterOp::Gt => json_cmp(actual, &self.value).is_some_and(|o| o.is_gt()),
            FilterOp::Ge => json_cmp(actual, &self.value).is_some_and(|o| o.is_ge()),
            FilterOp::Lt => json_cmp(actual, &self.value).is_some_and(|o| o.is_lt()),
            FilterOp::Le => json_cmp(actual, &self.value).is_some_and(|o| o.is_le()),
            FilterOp::In => in_set(actual, &self.value),
            FilterOp::NotIn => !in_set(actual, &self.value),
            FilterOp::Like => like_matches(actual, &self.value, false),
            FilterOp::ILike => like_matches(actual, &self.value, true),
        }
    }
}

/// Boolean predicate tree over record fields
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Not(Box<FilterNode>),
    Condition(Condition),
}

impl FilterNode {
    /// The match-all filter (empty conjunction)
    pub fn empty() -> Self {
        FilterNode::And(Vec::new())
    }

    /// Parse a JSON domain sequence into a filter tree
    ///
    /// Prefix operators are evaluated right-to-left with a stack; `"&"` and
    /// `"|"` consume two operands, `"!"` one. Leftover operands are joined
    /// by an implicit AND. An empty sequence matches everything.
    pub fn parse(value: &Value) -> Result<Self, QueryError> {
        let Value::Array(items) = value else {
            return Err(QueryError::InvalidDomain {
                message: "domain must be a JSON array".to_string(),
            });
        };

        let mut stack: Vec<FilterNode> = Vec::new();
        for item in items.iter().rev() {
            match item {
                Value::String(op) if op == "&" || op == "|" => {
                    let left = stack.pop();
                    let right = stack.pop();
                    let (Some(left), Some(right)) = (left, right) else {
                        return Err(QueryError::InvalidDomain {
                            message: format!("operator '{}' is missing operands", op),
                        });
                    };
                    let node = if op == "&" {
                        FilterNode::And(vec![left, right])
                    } else {
                        FilterNode::Or(vec![left, right])
                    };
                    stack.push(node);
                }
                Value::String(op) if op == "!" => {
                    let Some(operand) = stack.pop() else {
                        return Err(QueryError::InvalidDomain {
                            message: "operator '!' is missing an operand".to_string(),
                        });
                    };
                    stack.push(FilterNode::Not(Box::new(operand)));
                }
                Value::Array(triple) => {
                    stack.push(FilterNode::Condition(parse_triple(triple)?));
                }
                other => {
                    return Err(QueryError::InvalidDomain {
                        message: format!("unexpected domain element: {}", other),
                    });
                }
            }
        }

        // Stack order is reversed relative to the source sequence
        stack.reverse();
        match stack.len() {
            0 => Ok(FilterNode::empty()),
            1 => Ok(stack.remove(0)),
            _ => Ok(FilterNode::And(stack)),
        }
    }

    /// Evaluate the tree against a record
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            FilterNode::And(children) => children.iter().all(|c| c.matches(record)),
            FilterNode::Or(children) => children.iter().any(|c| c.matches(record)),
            FilterNode::Not(child) => !child.matches(record),
            FilterNode::Condition(condition) => condition.matches(record),
        }
    }

    /// Whether any condition in the tree targets `field`
    pub fn references(&self, field: &str) -> bool {
        match self {
            FilterNode::And(children) | FilterNode::Or(children) => {
                children.iter().any(|c| c.references(field))
            }
            FilterNode::Not(child) => child.references(field),
            FilterNode::Condition(condition) => condition.field == field,
        }
    }

    /// Replace every condition on `condition.field` with `condition`
    /// (last-write-wins on that single field); append a conjunct when the
    /// tree has none. Replacing in place keeps `&`/`|`/`!` arity intact,
    /// which removal from the original flat sequence would not.
    pub fn set_term(&mut self, condition: Condition) {
        if self.replace_term(&condition) {
            return;
        }
        let current = std::mem::replace(self, FilterNode::empty());
        *self = match current {
            FilterNode::And(mut children) => {
                children.push(FilterNode::Condition(condition));
                FilterNode::And(children)
            }
            other => FilterNode::And(vec![other, FilterNode::Condition(condition)]),
        };
    }

    fn replace_term(&mut self, condition: &Condition) -> bool {
        match self {
            FilterNode::And(children) | FilterNode::Or(children) => {
                let mut replaced = false;
                for child in children {
                    replaced |= child.replace_term(condition);
                }
                replaced
            }
            FilterNode::Not(child) => child.replace_term(condition),
            FilterNode::Condition(existing) => {
                if existing.field == condition.field {
                    *existing = condition.clone();
                    true
                } else {
                    false
                }
            }
        }
    }
}

fn parse_triple(triple: &[Value]) -> Result<Condition, QueryError> {
    if triple.len() != 3 {
        return Err(QueryError::InvalidDomain {
            message: format!("term must have 3 elements, got {}", triple.len()),
        });
    }
    let Some(field) = triple[0].as_str() else {
        return Err(QueryError::InvalidDomain {
            message: "term field must be a string".to_string(),
        });
    };
    let Some(op) = triple[1].as_str().and_then(FilterOp::parse) else {
        return Err(QueryError::InvalidDomain {
            message: format!("unknown operator: {}", triple[1]),
        });
    };
    Ok(Condition::new(field, op, triple[2].clone()))
}

/// JSON equality with numeric coercion (`1 == 1.0`)
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn json_cmp(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
        return Some(x.cmp(y));
    }
    None
}

/// Membership test for `in`/`not in`
///
/// When the record value is itself a list (to-many field), any overlap with
/// the candidate set counts as a match.
fn in_set(actual: &Value, candidates: &Value) -> bool {
    let Value::Array(candidates) = candidates else {
        return false;
    };
    match actual {
        Value::Array(items) => items
            .iter()
            .any(|item| candidates.iter().any(|c| json_eq(item, c))),
        other => candidates.iter().any(|c| json_eq(other, c)),
    }
}

/// SQL-style LIKE matching with `%` and `_` wildcards
///
/// A pattern without wildcards is treated as a substring search, matching
/// the usual ORM behavior of wrapping the needle in `%`.
fn like_matches(actual: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    let (Some(actual), Some(pattern)) = (actual.as_str(), pattern.as_str()) else {
        return false;
    };
    let pattern = if pattern.contains('%') || pattern.contains('_') {
        pattern.to_string()
    } else {
        format!("%{}%", pattern)
    };

    let mut regex = String::from("^");
    if case_insensitive {
        regex.insert_str(0, "(?i)");
    }
    for ch in pattern.chars() {
        match ch {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');

    Regex::new(&regex).is_ok_and(|re| re.is_match(actual))
}
