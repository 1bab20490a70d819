// Aggregate cache: entry count and the set of categories in use.
//
// Responsibilities
// - Maintain size and categories incrementally as entries come and go.
// - Keep a reference count per category so a category disappears with its last entry.
//
// Boundaries
// - Owned by the command executor only. Other parts see AggregateSnapshot copies.
// - rebuild() scans everything and is meant for the initial load.

use crate::modules::time_log::core::entry::Entry;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSnapshot {
    pub size: u64,
    pub categories: BTreeSet<String>,
    pub undo_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateCache {
    size: u64,
    categories: BTreeMap<String, usize>,
}

impl AggregateCache {
    pub fn rebuild<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Self {
        let mut cache = Self::default();
        for entry in entries {
            cache.entry_added(entry);
        }
        cache
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn categories(&self) -> BTreeSet<String> {
        self.categories.keys().cloned().collect()
    }

    pub fn entry_added(&mut self, entry: &Entry) {
        self.size += 1;
        self.retain_category(&entry.category);
    }

    pub fn entry_removed(&mut self, entry: &Entry) {
        self.size = self.size.saturating_sub(1);
        self.release_category(&entry.category);
    }

    pub fn category_changed(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        self.release_category(from);
        self.retain_category(to);
    }

    pub fn snapshot(&self, undo_count: usize) -> AggregateSnapshot {
        AggregateSnapshot {
            size: self.size,
            categories: self.categories(),
            undo_count,
        }
    }

    fn retain_category(&mut self, category: &str) {
        if category.is_empty() {
            return;
        }
        *self.categories.entry(category.to_owned()).or_insert(0) += 1;
    }

    fn release_category(&mut self, category: &str) {
        if let Some(count) = self.categories.get_mut(category) {
            *count -= 1;
            if *count == 0 {
                self.categories.remove(category);
            }
        }
    }
}
