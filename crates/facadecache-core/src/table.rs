//! Entity table: one kind's facades plus its secondary indices behind one lock
//!
//! Uses parking_lot::RwLock (write-fair, no poisoning). Every operation holds the
//! lock only for its own lookup, copy or mutation; nothing here performs I/O.

use crate::index::BiIndex;
use crate::models::{EntityId, Facade, ForeignKey, IndexKey};
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

/// Lock-guarded contents of an [`EntityTable`]
#[derive(Debug)]
pub struct TableInner<F: Facade> {
    rows: HashMap<EntityId, Arc<F>>,
    indexes: Vec<(IndexKey, BiIndex)>,
}

impl<F: Facade> TableInner<F> {
    fn new() -> Self {
        Self {
            rows: HashMap::new(),
            indexes: F::INDEXES
                .iter()
                .map(|&key| (key, BiIndex::new()))
                .collect(),
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&Arc<F>> {
        self.rows.get(&id)
    }

    pub fn values(&self) -> impl Iterator<Item = &Arc<F>> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn index(&self, key: IndexKey) -> Option<&BiIndex> {
        self.indexes
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, index)| index)
    }

    /// Insert or swap the facade, re-deriving every secondary index from it
    ///
    /// Returns the replaced facade and the number of index bindings taken over from
    /// other identities.
    fn upsert(&mut self, facade: F) -> (Option<Arc<F>>, usize) {
        let id = facade.id();
        let mut conflicts = 0;

        for (key, index) in &mut self.indexes {
            match facade.index_value(*key) {
                Some(value) => {
                    if let Some(evicted) = index.bind(id, value) {
                        conflicts += 1;
                        warn!(
                            kind = %F::KIND,
                            index = ?key,
                            value,
                            %id,
                            %evicted,
                            "Index value moved to a different identity"
                        );
                    }
                }
                None => {
                    index.unbind(id);
                }
            }
        }

        let previous = self.rows.insert(id, Arc::new(facade));
        (previous, conflicts)
    }

    fn remove(&mut self, id: EntityId) -> Option<Arc<F>> {
        let removed = self.rows.remove(&id)?;
        for (_, index) in &mut self.indexes {
            index.unbind(id);
        }
        Some(removed)
    }

    fn clear(&mut self) {
        self.rows.clear();
        for (_, index) in &mut self.indexes {
            index.clear();
        }
    }
}

/// Keyed container for one entity kind
///
/// The primary map and all secondary indices share a single reader/writer lock,
/// so readers never observe an index out of step with the rows.
#[derive(Debug)]
pub struct EntityTable<F: Facade> {
    inner: RwLock<TableInner<F>>,
}

impl<F: Facade> Default for EntityTable<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Facade> EntityTable<F> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(TableInner::new()),
        }
    }

    // ===================
    // Mutations (write lock)
    // ===================

    /// Upsert a facade and its secondary-index entries
    ///
    /// Returns the facade it replaced, if any.
    pub fn put(&self, facade: F) -> Option<Arc<F>> {
        self.inner.write().upsert(facade).0
    }

    /// Bulk fill under one write acquisition, returning the index conflicts seen
    pub fn load(&self, facades: impl IntoIterator<Item = F>) -> usize {
        let mut inner = self.inner.write();
        facades
            .into_iter()
            .map(|facade| inner.upsert(facade).1)
            .sum()
    }

    /// Delete a facade and every index entry pointing at it; absent ids are a no-op
    pub fn remove(&self, id: EntityId) -> Option<Arc<F>> {
        self.inner.write().remove(id)
    }

    /// Delete every facade whose `fk` reference equals `parent`, returning their ids
    pub fn remove_where(&self, fk: ForeignKey, parent: EntityId) -> Vec<EntityId> {
        let mut inner = self.inner.write();
        let doomed: Vec<EntityId> = inner
            .rows
            .values()
            .filter(|facade| facade.foreign_key(fk) == Some(parent))
            .map(|facade| facade.id())
            .collect();

        for id in &doomed {
            inner.remove(*id);
        }
        doomed
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    // ===================
    // Reads (read lock)
    // ===================

    pub fn get(&self, id: EntityId) -> Option<Arc<F>> {
        self.inner.read().rows.get(&id).cloned()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.inner.read().rows.contains_key(&id)
    }

    /// Reverse lookup through a secondary index
    pub fn lookup(&self, key: IndexKey, value: &str) -> Option<EntityId> {
        self.inner.read().index(key)?.get(value)
    }

    /// Call-time copy of the primary map
    pub fn snapshot(&self) -> HashMap<EntityId, Arc<F>> {
        self.inner.read().rows.clone()
    }

    /// Ids of the facades matching `predicate`
    pub fn ids_where(&self, predicate: impl Fn(&F) -> bool) -> HashSet<EntityId> {
        self.inner
            .read()
            .rows
            .values()
            .filter(|facade| predicate(facade))
            .map(|facade| facade.id())
            .collect()
    }

    /// Call-time copy of one secondary index (key → id)
    pub fn index_snapshot(&self, key: IndexKey) -> HashMap<String, EntityId> {
        self.inner
            .read()
            .index(key)
            .map(BiIndex::to_map)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Hold the read lock for a multi-table read
    ///
    /// Callers holding more than one guard must acquire them in
    /// [`EntityKind::lock_rank`](crate::models::EntityKind::lock_rank) order.
    pub fn read(&self) -> RwLockReadGuard<'_, TableInner<F>> {
        self.inner.read()
    }

    /// True when every index is bijective and each binding matches a live row
    pub fn is_consistent(&self) -> bool {
        let inner = self.inner.read();
        inner.indexes.iter().all(|(key, index)| {
            index.is_consistent()
                && index.iter().all(|(value, id)| {
                    inner
                        .rows
                        .get(&id)
                        .is_some_and(|facade| facade.index_value(*key) == Some(value))
                })
        })
    }
}

/// Kind-erased table operations
///
/// Lets the cache manager keep a registry from
/// [`EntityKind`](crate::models::EntityKind) to its table and drive remove, cascade and
/// stats uniformly for all seven kinds. Persists are typed and go straight to the table.
pub trait TableOps: Send + Sync {
    /// Remove one identity, returning whether it was present
    fn remove_id(&self, id: EntityId) -> bool;

    /// Remove every child whose `fk` reference equals `parent`
    fn remove_children(&self, fk: ForeignKey, parent: EntityId) -> Vec<EntityId>;

    fn row_count(&self) -> usize;

    fn clear_rows(&self);
}

impl<F: Facade> TableOps for EntityTable<F> {
    fn remove_id(&self, id: EntityId) -> bool {
        self.remove(id).is_some()
    }

    fn remove_children(&self, fk: ForeignKey, parent: EntityId) -> Vec<EntityId> {
        self.remove_where(fk, parent)
    }

    fn row_count(&self) -> usize {
        self.len()
    }

    fn clear_rows(&self) {
        self.clear();
    }
}
