use std::time::SystemTime;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub i64);

impl EntityId {
    /// Stable shard index; all events of one entity land in the same shard.
    pub fn shard(&self, shards: usize) -> usize {
        let shards = shards.max(1) as u64;
        (self.0.unsigned_abs() % shards) as usize
    }
}

/// Anything the engine can count: a contributing entity plus a partition key
/// derived deterministically from the record.
pub trait Partitioned {
    type Key;

    fn entity_id(&self) -> EntityId;

    fn partition_key(&self) -> Self::Key;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event<K> {
    pub entity_id: EntityId,
    pub partition_key: K,
    pub timestamp: Option<SystemTime>,
}

impl<K> Event<K> {
    pub fn new(entity_id: i64, partition_key: K) -> Self {
        Self {
            entity_id: EntityId(entity_id),
            partition_key,
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl<K: Clone> Partitioned for Event<K> {
    type Key = K;

    fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    fn partition_key(&self) -> K {
        self.partition_key.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;

    #[test]
    fn timestamp_does_not_change_partitioning() {
        let at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let event = Event::new(-7, 14).at(at);
        assert_eq!(event.timestamp, Some(at));
        assert_eq!(event.entity_id(), EntityId(-7));
        assert_eq!(event.partition_key(), 14);
        assert_eq!(event.entity_id().shard(4), EntityId(7).shard(4));
    }

    #[test]
    fn zero_shards_behaves_as_one() {
        assert_eq!(EntityId(i64::MIN).shard(0), 0);
        assert_eq!(EntityId(9).shard(1), 0);
    }
}
