//! Bijective natural-key index
//!
//! Two plain maps updated together. Callers hold the owning table's lock, so both
//! directions always change atomically relative to each other.

use crate::models::EntityId;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct BiIndex {
    ids_by_key: HashMap<String, EntityId>,
    keys_by_id: HashMap<EntityId, String>,
}

impl BiIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to `id`, replacing any previous key of `id`
    ///
    /// If `key` is currently bound to a different id, that binding is evicted and the
    /// evicted id is returned.
    pub fn bind(&mut self, id: EntityId, key: &str) -> Option<EntityId> {
        if self.keys_by_id.get(&id).is_some_and(|current| current == key) {
            return None;
        }

        self.unbind(id);

        let evicted = self.ids_by_key.insert(key.to_string(), id);
        if let Some(other) = evicted {
            self.keys_by_id.remove(&other);
        }
        self.keys_by_id.insert(id, key.to_string());

        evicted
    }

    /// Remove whatever key `id` is bound to, returning it
    pub fn unbind(&mut self, id: EntityId) -> Option<String> {
        let key = self.keys_by_id.remove(&id)?;
        self.ids_by_key.remove(&key);
        Some(key)
    }

    pub fn get(&self, key: &str) -> Option<EntityId> {
        self.ids_by_key.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.ids_by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids_by_key.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids_by_key.clear();
        self.keys_by_id.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, EntityId)> {
        self.ids_by_key.iter().map(|(key, id)| (key.as_str(), *id))
    }

    /// Copy of the key → id direction
    pub fn to_map(&self) -> HashMap<String, EntityId> {
        self.ids_by_key.clone()
    }

    /// True when both directions describe the same set of pairs
    pub fn is_consistent(&self) -> bool {
        self.ids_by_key.len() == self.keys_by_id.len()
            && self
                .ids_by_key
                .iter()
                .all(|(key, id)| self.keys_by_id.get(id) == Some(key))
    }
}
