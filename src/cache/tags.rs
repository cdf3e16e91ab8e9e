//! Dependency tags and the tag -> provider index.
//!
//! A query declares the tags it provides when its result lands; a
//! mutation declares the tags it invalidates. The `TagGraph` keeps the
//! reverse index so invalidation never scans every cache entry.

use std::collections::{HashMap, HashSet};

use crate::models::ResourceKind;

use super::key::QueryKey;

/// Scope of a tag: the whole collection, or one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagScope {
    List,
    Id(i64),
}

/// Dependency label relating mutations to cached queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    pub kind: ResourceKind,
    pub scope: TagScope,
}

impl Tag {
    pub fn list(kind: ResourceKind) -> Self {
        Self {
            kind,
            scope: TagScope::List,
        }
    }

    pub fn id(kind: ResourceKind, id: i64) -> Self {
        Self {
            kind,
            scope: TagScope::Id(id),
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.scope {
            TagScope::List => write!(f, "{}/LIST", self.kind),
            TagScope::Id(id) => write!(f, "{}/{}", self.kind, id),
        }
    }
}

/// Index from tag to the set of query keys currently providing it.
/// Maintained incrementally as entries land and are evicted; never the
/// source of truth (entries record their own provided tags).
#[derive(Debug, Default)]
pub struct TagGraph {
    providers: HashMap<Tag, HashSet<QueryKey>>,
}

impl TagGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` as a provider of each tag.
    pub fn link(&mut self, key: &QueryKey, tags: &[Tag]) {
        for &tag in tags {
            self.providers.entry(tag).or_default().insert(key.clone());
        }
    }

    /// Remove `key` as a provider of each tag, dropping empty buckets.
    pub fn unlink(&mut self, key: &QueryKey, tags: &[Tag]) {
        for tag in tags {
            if let Some(keys) = self.providers.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.providers.remove(tag);
                }
            }
        }
    }

    /// All query keys providing any of `tags`. Set-valued, so a batch
    /// that repeats a tag resolves the same as one that does not, and
    /// unknown tags contribute nothing.
    pub fn resolve(&self, tags: &[Tag]) -> HashSet<QueryKey> {
        let mut keys = HashSet::new();
        for tag in tags {
            if let Some(providers) = self.providers.get(tag) {
                keys.extend(providers.iter().cloned());
            }
        }
        keys
    }
}
