use crate::dataset::DatasetError;
use thiserror::Error;

/// Errors raised while deriving features, windowing or extending a dataset.
///
/// None of these are retried; they propagate unchanged to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrepError {
    #[error("'{0}' must be in dataset coordinates")]
    MissingCoordinate(String),

    #[error("Expected batch dimension of size 1, got {0}")]
    BatchSize(usize),

    #[error("Unsupported forcing variables for extension: unexpected {unexpected:?}, missing {missing:?}")]
    UnsupportedForcingVariables {
        unexpected: Vec<String>,
        missing: Vec<String>,
    },

    #[error("Forcing variables {forcing:?} should not overlap with target variables {target:?}")]
    OverlappingVariables {
        forcing: Vec<String>,
        target: Vec<String>,
    },

    #[error("Number of feature dimensions ({expected}) must be equal to the number of data dimensions: {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid lead times: {0}")]
    InvalidLeadTimes(String),

    #[error("Need at least {required} timesteps, dataset has {available}")]
    InsufficientTimesteps { required: usize, available: usize },

    #[error("Cannot extend {available} timesteps to {required}")]
    ShorterExtension { required: usize, available: usize },

    #[error("Extending to {required} steps of {timestep} leaves the representable time range")]
    TimeOverflow { required: usize, timestep: String },

    #[error("Irregular time axis: interval {index} is {actual}, expected {expected}")]
    IrregularTimeAxis {
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("Extended datetime does not reproduce the original at batch {batch}, step {step}")]
    DatetimeMismatch { batch: usize, step: usize },

    #[error("After extension, inputs shape is incorrect. Expected {expected} and got {actual}")]
    InputWindowLength { expected: usize, actual: usize },

    #[error("Coordinate '{0}' has a time dimension and cannot be extended")]
    UnextendableCoordinate(String),

    #[error("Solar radiation error: {0}")]
    Solar(String),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
}

impl PrepError {
    /// Caller-supplied data or arguments violate the operation's contract
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PrepError::MissingCoordinate(_)
                | PrepError::BatchSize(_)
                | PrepError::UnsupportedForcingVariables { .. }
                | PrepError::OverlappingVariables { .. }
                | PrepError::DimensionMismatch { .. }
                | PrepError::InvalidLeadTimes(_)
                | PrepError::InsufficientTimesteps { .. }
                | PrepError::ShorterExtension { .. }
                | PrepError::TimeOverflow { .. }
        )
    }

    /// Internal shape or alignment check failed; the data or the code is broken
    pub fn is_consistency_violation(&self) -> bool {
        matches!(
            self,
            PrepError::IrregularTimeAxis { .. }
                | PrepError::DatetimeMismatch { .. }
                | PrepError::InputWindowLength { .. }
                | PrepError::UnextendableCoordinate(_)
        )
    }
}
