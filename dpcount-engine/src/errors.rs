use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Invalid construction parameters. The engine is never partially built.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("partition domain must contain at least one key")]
    EmptyDomain,
    #[error("epsilon must be finite and > 0 (got {0})")]
    InvalidEpsilon(f64),
    #[error("max partitions per entity must be >= 1 (got {0})")]
    InvalidPartitionBound(u32),
    #[error("max contributions per partition must be >= 1 (got {0})")]
    InvalidContributionBound(u32),
    #[error("sensitivity must be finite and > 0 (got {0})")]
    InvalidSensitivity(f64),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("partition key {key} is outside the declared domain")]
    OutOfDomain { key: String },
    #[error(transparent)]
    State(#[from] StateError),
}

/// Usage-protocol violations. These are programmer errors and are never retried.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("accumulator already finalized; its noise sample has been spent")]
    AlreadyFinalized,
    #[error("cannot merge accumulators with different calibration")]
    CalibrationMismatch,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    State(#[from] StateError),
}
