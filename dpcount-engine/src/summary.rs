use serde::{Deserialize, Serialize};

use crate::noise::NoiseKind;

/// What happened during one run. Drops and out-of-domain events are reported
/// here instead of being discarded silently.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunSummary {
    pub events_seen: u64,
    pub accepted: u64,
    pub dropped_partition_limit: u64,
    pub dropped_contribution_limit: u64,
    pub out_of_domain: u64,
    pub partitions: usize,
    pub distinct_entities: usize,
    pub noise: NoiseKind,
    pub epsilon: f64,
    pub sensitivity: f64,
    pub noise_scale: f64,
    pub published: bool,
}

impl RunSummary {
    pub fn dropped_contributions(&self) -> u64 {
        self.dropped_partition_limit + self.dropped_contribution_limit
    }
}
