//! Noise mechanisms and the randomness they draw from.
//!
//! The generator is injected as a [`NoiseRng`] so production runs seed a
//! ChaCha20 CSPRNG from OS entropy while tests substitute a fixed seed.
//! Every call to [`NoiseMechanism::sample`] draws fresh randomness.

use std::fmt;

use blake3::Hasher;
use parking_lot::Mutex;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoiseKind {
    #[default]
    Laplace,
}

impl NoiseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoiseKind::Laplace => "laplace",
        }
    }
}

/// Lock-guarded random generator shared by every accumulator of a run.
pub struct NoiseRng {
    inner: Mutex<Box<dyn RngCore + Send>>,
}

impl NoiseRng {
    /// ChaCha20 seeded from the operating system entropy source.
    pub fn secure() -> Self {
        Self::from_rng(ChaCha20Rng::from_entropy())
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self::from_rng(ChaCha20Rng::from_seed(seed))
    }

    /// Reproducible generator keyed by a label. Output is NOT private.
    pub fn from_label(label: impl AsRef<[u8]>) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(b"dpcount/noise-seed");
        hasher.update(label.as_ref());
        let mut seed = [0u8; 32];
        seed.copy_from_slice(hasher.finalize().as_bytes());
        Self::from_seed(seed)
    }

    pub fn from_rng<R>(rng: R) -> Self
    where
        R: RngCore + Send + 'static,
    {
        Self {
            inner: Mutex::new(Box::new(rng)),
        }
    }

    /// Runs `f` with exclusive access to the generator.
    pub fn with<T>(&self, f: impl FnOnce(&mut (dyn RngCore + Send)) -> T) -> T {
        let mut guard = self.inner.lock();
        f(guard.as_mut())
    }
}

impl fmt::Debug for NoiseRng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoiseRng").finish_non_exhaustive()
    }
}

/// Grid spacing is the smallest power of two at or above
/// `scale / 2^GRANULARITY_BITS`.
const GRANULARITY_BITS: i32 = 40;

/// A noise distribution calibrated to `(epsilon, sensitivity)`.
///
/// Laplace noise is drawn on a power-of-two grid rather than as a raw
/// floating-point value: the exponential magnitude is floored to a whole
/// number of grid steps, which gives a two-sided geometric (discrete Laplace)
/// distribution. The low-order bits of a naive floating-point Laplace sample
/// leak information about the value it was added to; grid samples do not
/// carry those bits.
#[derive(Clone, Copy, Debug)]
pub struct NoiseMechanism {
    kind: NoiseKind,
    epsilon: f64,
    sensitivity: f64,
    scale: f64,
    granularity: f64,
    magnitude: Exp<f64>,
}

impl NoiseMechanism {
    pub fn calibrate(kind: NoiseKind, epsilon: f64, sensitivity: f64) -> Result<Self, ConfigError> {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(ConfigError::InvalidEpsilon(epsilon));
        }
        if !sensitivity.is_finite() || sensitivity <= 0.0 {
            return Err(ConfigError::InvalidSensitivity(sensitivity));
        }
        let scale = match kind {
            NoiseKind::Laplace => sensitivity / epsilon,
        };
        // Laplace(0, b) is an Exp(1/b) magnitude with a fair random sign.
        let magnitude = Exp::new(scale.recip()).map_err(|_| ConfigError::InvalidEpsilon(epsilon))?;
        Ok(Self {
            kind,
            epsilon,
            sensitivity,
            scale,
            granularity: granularity_for(scale),
            magnitude,
        })
    }

    pub fn kind(&self) -> NoiseKind {
        self.kind
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Spacing of the grid every sample lies on.
    pub fn granularity(&self) -> f64 {
        self.granularity
    }

    pub fn variance(&self) -> f64 {
        2.0 * self.scale * self.scale
    }

    pub fn sample(&self, rng: &NoiseRng) -> f64 {
        rng.with(|r| self.sample_with(r))
    }

    fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self.kind {
            NoiseKind::Laplace => loop {
                let steps = (self.magnitude.sample(rng) / self.granularity).floor();
                let positive = rng.gen::<bool>();
                // Zero is reachable from both signs; keep only one of them.
                if !positive && steps == 0.0 {
                    continue;
                }
                let value = steps * self.granularity;
                break if positive { value } else { -value };
            },
        }
    }

    /// Adds one fresh sample to `raw` and rounds half away from zero.
    /// The result is not clamped and may be negative.
    pub fn privatize(&self, raw: i64, rng: &NoiseRng) -> i64 {
        round_count(raw as f64 + self.sample(rng))
    }

    /// Same calibration (kind, epsilon, sensitivity).
    pub fn same_calibration(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.epsilon == other.epsilon
            && self.sensitivity == other.sensitivity
    }
}

/// Smallest power of two that is at least `scale / 2^GRANULARITY_BITS`.
fn granularity_for(scale: f64) -> f64 {
    let exponent = (scale / 2f64.powi(GRANULARITY_BITS)).log2().ceil();
    2f64.powi(exponent as i32)
}

/// `f64::round` rounds half away from zero; the cast saturates at the i64 range.
pub fn round_count(value: f64) -> i64 {
    value.round() as i64
}
