use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};

/// Source id → destination id lookup built while a migration writes.
///
/// Entries are only ever added; an id that is already mapped keeps its
/// first destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdRemap(BTreeMap<i64, i64>);

impl IdRemap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `old → new`. Returns false when `old` was already mapped.
    pub fn record(&mut self, old: i64, new: i64) -> bool {
        match self.0.entry(old) {
            Entry::Vacant(slot) => {
                slot.insert(new);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    #[must_use]
    pub fn resolve(&self, old: i64) -> Option<i64> {
        self.0.get(&old).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pairs in ascending source id order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.0.iter().map(|(old, new)| (*old, *new))
    }
}
