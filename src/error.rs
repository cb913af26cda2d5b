//! Error taxonomy shared across the crate.

use thiserror::Error;

use crate::dic::PenaltyKind;

/// Error type for invalid operations on sample bundles, criteria, and
/// model scores.
#[derive(Error, Debug)]
pub enum Error {
    /// A caller-supplied parameter is invalid (bad chunk/iteration budget,
    /// unrecognized penalty kind, non-positive iteration count).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// An operation received zero bundles or variables where at least one
    /// is required.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// Bundles to be merged disagree on variable names.
    #[error("each sample bundle must contain the same set of variables")]
    VariableSetMismatch,

    /// A shape invariant (parameter dimension, chain length, or chain
    /// count) is violated between bundles or within one bundle.
    #[error("inconsistent shape: {0}")]
    InconsistentShape(String),

    /// DIC scoring requested on a single-chain engine.
    #[error("2 or more parallel chains required")]
    InsufficientChains,

    /// A requested variable is absent from the bundle.
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    /// Two DIC scores of different penalty kinds were differenced.
    #[error("incompatible DIC scores: different penalty kinds ({0} vs {1})")]
    PenaltyKindMismatch(PenaltyKind, PenaltyKind),

    /// The sampling engine reported a failure.
    #[error("engine error: {0}")]
    Engine(String),

    /// The diagnostics collaborator reported a failure.
    #[error("diagnostics error: {0}")]
    Diagnostics(String),

    #[cfg(feature = "csv")]
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "csv")]
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A sample file does not round-trip to a valid bundle.
    #[cfg(feature = "csv")]
    #[error("invalid sample file: {0}")]
    InvalidSampleFile(String),
}

/// Convenience type for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
