//! Structural identity of a fetch operation.

use crate::models::ResourceKind;

/// Structural key of one distinct query: resource kind, operation name,
/// and the ordered parameter list (ids, and the opaque bearer token for
/// token-scoped queries, so different tokens never share an entry).
///
/// Two calls with equal keys refer to the same query cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub resource: ResourceKind,
    pub operation: &'static str,
    pub params: Vec<String>,
}

impl QueryKey {
    pub fn new(resource: ResourceKind, operation: &'static str, params: Vec<String>) -> Self {
        Self {
            resource,
            operation,
            params,
        }
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}({})", self.resource, self.operation, self.params.join(","))
    }
}
