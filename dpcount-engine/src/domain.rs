use std::collections::BTreeSet;

use serde::Serialize;

use crate::errors::ConfigError;

/// Closed set of partition keys declared before ingestion. Never extended
/// at ingestion time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PartitionDomain<K: Ord> {
    keys: BTreeSet<K>,
}

impl<K: Ord> PartitionDomain<K> {
    pub fn new(keys: impl IntoIterator<Item = K>) -> Result<Self, ConfigError> {
        let keys: BTreeSet<K> = keys.into_iter().collect();
        if keys.is_empty() {
            return Err(ConfigError::EmptyDomain);
        }
        Ok(Self { keys })
    }

    pub fn contains(&self, key: &K) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false for a constructed domain.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.keys.iter()
    }
}
