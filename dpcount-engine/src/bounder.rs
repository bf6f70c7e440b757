//! Per-entity contribution bounding.
//!
//! The Laplace calibration assumes one entity moves at most
//! `max_partitions_per_entity * max_contributions_per_partition` units of the
//! total count. The bounder enforces that assumption at ingestion time with a
//! first-seen-wins policy: contributions are admitted in ingestion order until
//! the entity's allowance is used up, and every later one is dropped and counted.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{config::PrivacyParameters, event::EntityId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DropReason {
    /// The entity already holds its maximum number of distinct partitions.
    PartitionLimit,
    /// The entity already contributed the maximum to this partition.
    ContributionLimit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Admission {
    Accepted,
    Dropped(DropReason),
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted)
    }
}

#[derive(Clone, Debug)]
pub struct ContributionBounder<K> {
    max_partitions: u32,
    max_per_partition: u32,
    /// Partitions held by each entity with the contributions made to each.
    entities: HashMap<EntityId, Vec<(K, u32)>>,
    dropped_partition_limit: u64,
    dropped_contribution_limit: u64,
}

impl<K: PartialEq + Clone> ContributionBounder<K> {
    pub fn new(params: &PrivacyParameters) -> Self {
        Self {
            max_partitions: params.max_partitions_per_entity,
            max_per_partition: params.max_contributions_per_partition,
            entities: HashMap::new(),
            dropped_partition_limit: 0,
            dropped_contribution_limit: 0,
        }
    }

    pub fn admit(&mut self, entity: EntityId, key: &K) -> Admission {
        let held = self.entities.entry(entity).or_default();
        let slot = held.iter().position(|(k, _)| k == key);
        let admission = match slot {
            Some(idx) if held[idx].1 >= self.max_per_partition => {
                Admission::Dropped(DropReason::ContributionLimit)
            }
            Some(idx) => {
                held[idx].1 += 1;
                Admission::Accepted
            }
            None if held.len() >= self.max_partitions as usize => {
                Admission::Dropped(DropReason::PartitionLimit)
            }
            None => {
                held.push((key.clone(), 1));
                Admission::Accepted
            }
        };
        if let Admission::Dropped(reason) = admission {
            match reason {
                DropReason::PartitionLimit => self.dropped_partition_limit += 1,
                DropReason::ContributionLimit => self.dropped_contribution_limit += 1,
            }
            debug!(entity = entity.0, ?reason, "contribution dropped by bounder");
        }
        admission
    }

    pub fn dropped(&self) -> u64 {
        self.dropped_partition_limit + self.dropped_contribution_limit
    }

    pub fn dropped_by(&self, reason: DropReason) -> u64 {
        match reason {
            DropReason::PartitionLimit => self.dropped_partition_limit,
            DropReason::ContributionLimit => self.dropped_contribution_limit,
        }
    }

    pub fn distinct_entities(&self) -> usize {
        self.entities.len()
    }

    /// Moves entity state into `shards` bounders keyed by [`EntityId::shard`],
    /// leaving this bounder with its drop counters only.
    pub(crate) fn split(&mut self, shards: usize) -> Vec<Self> {
        let mut out: Vec<Self> = (0..shards.max(1))
            .map(|_| Self {
                max_partitions: self.max_partitions,
                max_per_partition: self.max_per_partition,
                entities: HashMap::new(),
                dropped_partition_limit: 0,
                dropped_contribution_limit: 0,
            })
            .collect();
        let len = out.len();
        for (entity, held) in self.entities.drain() {
            out[entity.shard(len)].entities.insert(entity, held);
        }
        out
    }

    /// Takes back the state of a shard. Shards own disjoint entity sets.
    pub(crate) fn absorb(&mut self, shard: Self) {
        self.entities.extend(shard.entities);
        self.dropped_partition_limit += shard.dropped_partition_limit;
        self.dropped_contribution_limit += shard.dropped_contribution_limit;
    }
}
