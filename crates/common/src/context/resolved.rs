//! Per-turn working set of entities and intents

use super::lexicon::Intent;
use serde::Serialize;

/// Insertion-ordered set with append-if-absent semantics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OrderedSet<T> {
    items: Vec<T>,
}

impl<T> Default for OrderedSet<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: PartialEq> OrderedSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `item` unless already present; returns whether it was added
    pub fn insert(&mut self, item: T) -> bool {
        if self.items.contains(&item) {
            false
        } else {
            self.items.push(item);
            true
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: PartialEq> FromIterator<T> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

impl<T: PartialEq> Extend<T> for OrderedSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}

impl<'a, T> IntoIterator for &'a OrderedSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Entities and intents resolved for one turn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedQuery {
    pub entities: OrderedSet<String>,
    pub intents: OrderedSet<Intent>,
}

impl ResolvedQuery {
    pub fn has_compare(&self) -> bool {
        self.intents.contains(&Intent::Compare)
    }

    /// Intents that map to a graph relation, in resolution order
    pub fn retrievable_intents(&self) -> impl Iterator<Item = Intent> + '_ {
        self.intents.iter().copied().filter(Intent::is_retrievable)
    }

    /// Compare layout applies only when there is something to compare
    pub fn is_compare_mode(&self) -> bool {
        self.has_compare() && self.entities.len() > 1
    }
}
