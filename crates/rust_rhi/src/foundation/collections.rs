//! Specialized collection types

use crate::foundation::id::{HandleId, INVALID_ID};
use slotmap::{DefaultKey, SlotMap};
use std::collections::HashMap;

/// Handle-based map using slot map for stable, generation-checked references
pub type HandleMap<T> = SlotMap<DefaultKey, T>;

/// Arena addressed by random handle ids.
///
/// Values live in a generational [`SlotMap`]; `index` maps the caller-visible 32-bit id to
/// the arena key. Removing an entry bumps the slot's generation, so an arena key held
/// anywhere else goes stale instead of aliasing whatever reuses the slot.
#[derive(Debug)]
pub struct IdArena<T> {
    values: HandleMap<T>,
    index: HashMap<HandleId, DefaultKey>,
}

impl<T> IdArena<T> {
    /// Create an empty arena
    pub fn new() -> Self {
        Self {
            values: SlotMap::new(),
            index: HashMap::new(),
        }
    }

    /// Insert a value under `id`. Returns the value back if `id` is taken or invalid.
    pub fn insert(&mut self, id: HandleId, value: T) -> Result<DefaultKey, T> {
        if id == INVALID_ID || self.index.contains_key(&id) {
            return Err(value);
        }
        let key = self.values.insert(value);
        self.index.insert(id, key);
        Ok(key)
    }

    /// Remove and return the value stored under `id`
    pub fn remove(&mut self, id: HandleId) -> Option<T> {
        let key = self.index.remove(&id)?;
        self.values.remove(key)
    }

    /// Whether `id` is present
    pub fn contains(&self, id: HandleId) -> bool {
        self.index.contains_key(&id)
    }

    /// Look up by id
    pub fn get(&self, id: HandleId) -> Option<&T> {
        self.index.get(&id).and_then(|key| self.values.get(*key))
    }

    /// Look up by id, mutably
    pub fn get_mut(&mut self, id: HandleId) -> Option<&mut T> {
        let key = *self.index.get(&id)?;
        self.values.get_mut(key)
    }

    /// Look up by arena key. Returns `None` for keys whose entry was removed.
    pub fn get_by_key(&self, key: DefaultKey) -> Option<&T> {
        self.values.get(key)
    }

    /// Arena key for `id`
    pub fn key_of(&self, id: HandleId) -> Option<DefaultKey> {
        self.index.get(&id).copied()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values in arbitrary order
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.values.values()
    }

    /// Mutable values in arbitrary order
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.values.values_mut()
    }

    /// Remove every entry, yielding them in arbitrary order
    pub fn drain(&mut self) -> Vec<(HandleId, T)> {
        let keys: Vec<(HandleId, DefaultKey)> = self.index.drain().collect();
        keys.into_iter()
            .filter_map(|(id, key)| self.values.remove(key).map(|value| (id, value)))
            .collect()
    }
}

impl<T> Default for IdArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut arena = IdArena::new();
        assert!(arena.insert(42, "buffer").is_ok());
        assert!(arena.contains(42));
        assert_eq!(arena.get(42), Some(&"buffer"));
        assert_eq!(arena.remove(42), Some("buffer"));
        assert!(!arena.contains(42));
        assert_eq!(arena.remove(42), None);
    }

    #[test]
    fn test_rejects_duplicate_and_invalid_ids() {
        let mut arena = IdArena::new();
        arena.insert(7, 1).unwrap();
        assert_eq!(arena.insert(7, 2), Err(2));
        assert_eq!(arena.insert(INVALID_ID, 3), Err(3));
        assert_eq!(arena.get(7), Some(&1));
    }

    #[test]
    fn test_stale_key_does_not_alias_new_entry() {
        let mut arena = IdArena::new();
        let old_key = arena.insert(1, "old").unwrap();
        arena.remove(1);
        let new_key = arena.insert(2, "new").unwrap();
        assert_ne!(old_key, new_key);
        assert_eq!(arena.get_by_key(old_key), None);
        assert_eq!(arena.get_by_key(new_key), Some(&"new"));
    }

    #[test]
    fn test_drain_empties_arena() {
        let mut arena = IdArena::new();
        arena.insert(1, 'a').unwrap();
        arena.insert(2, 'b').unwrap();
        let mut drained = arena.drain();
        drained.sort_unstable();
        assert_eq!(drained, vec![(1, 'a'), (2, 'b')]);
        assert!(arena.is_empty());
        assert!(!arena.contains(1));
    }
}
