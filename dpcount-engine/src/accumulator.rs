use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    errors::StateError,
    noise::{NoiseMechanism, NoiseRng},
};

/// Exact, non-private counter. Readable at any time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawCount {
    count: i64,
}

impl RawCount {
    pub fn increment(&mut self) {
        self.increment_by(1);
    }

    pub fn increment_by(&mut self, n: u64) {
        self.count = self
            .count
            .saturating_add(i64::try_from(n).unwrap_or(i64::MAX));
    }

    pub fn merge(&mut self, other: &RawCount) {
        self.count = self.count.saturating_add(other.count);
    }

    pub fn value(&self) -> i64 {
        self.count
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccumulatorState {
    Accumulating,
    Finalized,
}

/// Differentially-private count for a single partition.
///
/// `Accumulating -> Finalized` is one-way. [`PrivateCount::result`] spends the
/// accumulator's single noise draw; any later mutation or second `result`
/// call fails with [`StateError::AlreadyFinalized`]. Not `Clone`: a noise
/// draw cannot be duplicated through a copy.
#[derive(Debug)]
pub struct PrivateCount {
    raw: i64,
    mechanism: NoiseMechanism,
    rng: Arc<NoiseRng>,
    state: AccumulatorState,
}

impl PrivateCount {
    pub fn new(mechanism: NoiseMechanism, rng: Arc<NoiseRng>) -> Self {
        Self {
            raw: 0,
            mechanism,
            rng,
            state: AccumulatorState::Accumulating,
        }
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    pub fn mechanism(&self) -> &NoiseMechanism {
        &self.mechanism
    }

    pub fn increment(&mut self) -> Result<(), StateError> {
        self.increment_by(1)
    }

    pub fn increment_by(&mut self, n: u64) -> Result<(), StateError> {
        self.ensure_accumulating()?;
        self.raw = self
            .raw
            .saturating_add(i64::try_from(n).unwrap_or(i64::MAX));
        Ok(())
    }

    /// Folds another accumulator with identical calibration into this one.
    pub fn merge(&mut self, other: PrivateCount) -> Result<(), StateError> {
        self.ensure_accumulating()?;
        other.ensure_accumulating()?;
        if !self.mechanism.same_calibration(&other.mechanism) {
            return Err(StateError::CalibrationMismatch);
        }
        self.raw = self.raw.saturating_add(other.raw);
        Ok(())
    }

    /// Finalizes and returns `raw + round(noise)` from exactly one fresh draw.
    pub fn result(&mut self) -> Result<i64, StateError> {
        self.ensure_accumulating()?;
        self.state = AccumulatorState::Finalized;
        Ok(self.mechanism.privatize(self.raw, &self.rng))
    }

    fn ensure_accumulating(&self) -> Result<(), StateError> {
        match self.state {
            AccumulatorState::Accumulating => Ok(()),
            AccumulatorState::Finalized => Err(StateError::AlreadyFinalized),
        }
    }
}
