//! Normalized per-resource entity storage.

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::Entity;

/// Normalized storage for one resource type: entity values keyed by id,
/// plus an ordered id list for stable iteration.
///
/// Every operation is total and synchronous; the owning store serializes
/// access. Invariant: every key in the map equals its entity's own id.
#[derive(Debug)]
pub struct EntityTable<T> {
    entities: HashMap<i64, T>,
    ids: Vec<i64>,
    /// Bumped on every write; the memoized `select_all` snapshot is
    /// keyed off it so unchanged tables return the same allocation.
    generation: u64,
    memo: Option<(u64, Arc<[T]>)>,
}

impl<T> Default for EntityTable<T> {
    fn default() -> Self {
        Self {
            entities: HashMap::new(),
            ids: Vec::new(),
            generation: 0,
            memo: None,
        }
    }
}

impl<T: Entity> EntityTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire table with `items`, in their given order.
    /// This is replacement, not merge: entries absent from `items` are
    /// dropped. A duplicated id keeps its first position, last value.
    pub fn set_all(&mut self, items: Vec<T>) {
        self.entities.clear();
        self.ids.clear();
        for item in items {
            let id = item.id();
            if self.entities.insert(id, item).is_none() {
                self.ids.push(id);
            }
        }
        self.touch();
    }

    /// Insert or replace a single entity, appending its id only if new.
    pub fn upsert_one(&mut self, item: T) {
        let id = item.id();
        if self.entities.insert(id, item).is_none() {
            self.ids.push(id);
        }
        self.touch();
    }

    /// Remove an entity and its id-list slot. Absent ids are a no-op.
    pub fn remove_one(&mut self, id: i64) -> Option<T> {
        let removed = self.entities.remove(&id);
        if removed.is_some() {
            self.ids.retain(|&existing| existing != id);
            self.touch();
        }
        removed
    }

    /// All entities in id-list order. Memoized: while the table is
    /// unchanged, callers get the same `Arc` back and can skip work via
    /// `Arc::ptr_eq`.
    pub fn select_all(&mut self) -> Arc<[T]> {
        if let Some((generation, ref snapshot)) = self.memo {
            if generation == self.generation {
                return Arc::clone(snapshot);
            }
        }
        let snapshot: Arc<[T]> = self
            .ids
            .iter()
            .filter_map(|id| self.entities.get(id).cloned())
            .collect();
        self.memo = Some((self.generation, Arc::clone(&snapshot)));
        snapshot
    }

    /// Look up one entity. Absence is a defined result, not an error.
    pub fn select_by_id(&self, id: i64) -> Option<&T> {
        self.entities.get(&id)
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn touch(&mut self) {
        self.generation += 1;
        self.memo = None;
    }
}
