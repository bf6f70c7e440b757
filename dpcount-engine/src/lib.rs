//! Differentially-private partitioned counting.
//!
//! A [`PartitionCountEngine`] owns a closed [`PartitionDomain`], bounds how
//! many partitions each contributing entity can touch, and keeps one exact and
//! one Laplace-noised accumulator per key. Raw counts are readable at any
//! time; private counts are finalized exactly once and cached, so the privacy
//! budget of a run is spent a single time no matter how often it is read.

pub mod accumulator;
pub mod bounder;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod event;
pub mod noise;
pub mod result;
pub mod shard;
pub mod summary;

pub use accumulator::{AccumulatorState, PrivateCount, RawCount};
pub use bounder::{Admission, ContributionBounder, DropReason};
pub use config::PrivacyParameters;
pub use domain::PartitionDomain;
pub use engine::PartitionCountEngine;
pub use errors::{ConfigError, EngineError, EngineResult, IngestError, StateError};
pub use event::{EntityId, Event, Partitioned};
pub use noise::{round_count, NoiseKind, NoiseMechanism, NoiseRng};
pub use result::ResultMap;
pub use summary::RunSummary;
