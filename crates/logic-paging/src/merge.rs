use std::{collections::HashMap, hash::Hash};

/// Counts reported by one merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    /// Items with a previously unseen key, appended at the end.
    pub appended: usize,
    /// Items whose key was already present, replaced in place.
    pub replaced: usize,
}

/// Ordered item list with no two items sharing an identity key.
#[derive(Debug, Clone)]
pub struct IdentityList<T, K> {
    items: Vec<T>,
    index: HashMap<K, usize>,
}

impl<T, K> Default for IdentityList<T, K> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T, K> IdentityList<T, K>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Items in display order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Position of the item with `key`, if present.
    pub fn position(&self, key: &K) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    /// Merge a page of items in page order.
    ///
    /// A known key replaces the existing item at its position; an unknown key
    /// is appended. Duplicates within `incoming` collapse the same way.
    pub fn merge<I, F>(&mut self, incoming: I, key_of: F) -> MergeOutcome
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> K,
    {
        let mut outcome = MergeOutcome::default();
        for item in incoming {
            let key = key_of(&item);
            match self.index.get(&key) {
                Some(&position) => {
                    self.items[position] = item;
                    outcome.replaced += 1;
                }
                None => {
                    self.index.insert(key, self.items.len());
                    self.items.push(item);
                    outcome.appended += 1;
                }
            }
        }
        outcome
    }
}
