use serde::{Deserialize, Serialize};

use crate::{errors::ConfigError, noise::NoiseKind};

/// Calibration shared by the contribution bounder and every private accumulator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PrivacyParameters {
    pub epsilon: f64,
    #[serde(default = "default_max_partitions_per_entity")]
    pub max_partitions_per_entity: u32,
    #[serde(default = "default_max_contributions_per_partition")]
    pub max_contributions_per_partition: u32,
    #[serde(default)]
    pub noise: NoiseKind,
}

const fn default_max_partitions_per_entity() -> u32 {
    1
}

const fn default_max_contributions_per_partition() -> u32 {
    1
}

impl PrivacyParameters {
    pub fn new(epsilon: f64, max_partitions_per_entity: u32, noise: NoiseKind) -> Self {
        Self {
            epsilon,
            max_partitions_per_entity,
            max_contributions_per_partition: default_max_contributions_per_partition(),
            noise,
        }
    }

    pub fn with_contributions_per_partition(mut self, cap: u32) -> Self {
        self.max_contributions_per_partition = cap;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(ConfigError::InvalidEpsilon(self.epsilon));
        }
        if self.max_partitions_per_entity < 1 {
            return Err(ConfigError::InvalidPartitionBound(
                self.max_partitions_per_entity,
            ));
        }
        if self.max_contributions_per_partition < 1 {
            return Err(ConfigError::InvalidContributionBound(
                self.max_contributions_per_partition,
            ));
        }
        Ok(())
    }

    /// L1 sensitivity of a partitioned count under the configured bounds.
    pub fn l1_sensitivity(&self) -> f64 {
        f64::from(self.max_partitions_per_entity) * f64::from(self.max_contributions_per_partition)
    }
}

impl Default for PrivacyParameters {
    fn default() -> Self {
        Self::new(3f64.ln(), default_max_partitions_per_entity(), NoiseKind::Laplace)
    }
}
