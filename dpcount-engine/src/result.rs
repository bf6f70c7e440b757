use std::collections::{btree_map, BTreeMap};

use serde::{Deserialize, Serialize};

/// Immutable partition -> count mapping covering the whole domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultMap<K: Ord> {
    counts: BTreeMap<K, i64>,
}

impl<K: Ord> ResultMap<K> {
    pub(crate) fn new(counts: BTreeMap<K, i64>) -> Self {
        Self { counts }
    }

    pub fn get(&self, key: &K) -> Option<i64> {
        self.counts.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.counts.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, K, i64> {
        self.counts.iter()
    }

    pub fn total(&self) -> i64 {
        self.counts.values().fold(0i64, |acc, v| acc.saturating_add(*v))
    }

    pub fn as_map(&self) -> &BTreeMap<K, i64> {
        &self.counts
    }

    pub fn into_inner(self) -> BTreeMap<K, i64> {
        self.counts
    }
}

impl<'a, K: Ord> IntoIterator for &'a ResultMap<K> {
    type Item = (&'a K, &'a i64);
    type IntoIter = btree_map::Iter<'a, K, i64>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.iter()
    }
}
