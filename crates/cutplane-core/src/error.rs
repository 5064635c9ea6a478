use nalgebra::DVector;
use thiserror::Error;

use crate::qp::QpError;

/// Boxed error returned by a structured-model oracle.
pub type OracleError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while training or applying a structured SVM.
#[derive(Debug, Error)]
pub enum CutplaneError {
    /// An oracle call failed.
    #[error("oracle `{operation}` failed at iteration {iteration}, sample {sample}: {source}")]
    Oracle {
        /// Outer iteration in which the call was made.
        iteration: usize,
        /// Index of the offending sample.
        sample: usize,
        /// Name of the oracle operation.
        operation: &'static str,
        /// Underlying oracle error.
        #[source]
        source: OracleError,
    },

    /// The oracle returned a value outside its contract (negative or non-finite loss,
    /// non-finite features).
    #[error(
        "oracle returned a malformed result at iteration {iteration}, sample {sample}: {reason}"
    )]
    MalformedOracleOutput {
        iteration: usize,
        sample: usize,
        reason: String,
    },

    /// A feature map produced a vector whose length differs from `size_psi`.
    #[error(
        "feature vector dimension mismatch at iteration {iteration}, sample {sample}: expected {expected}, got {actual}"
    )]
    DimensionMismatch {
        iteration: usize,
        sample: usize,
        expected: usize,
        actual: usize,
    },

    /// The dual QP could not be solved.
    #[error("QP solve failed at iteration {iteration}: {source}")]
    Solver {
        iteration: usize,
        #[source]
        source: QpError,
        /// Weight vector from the last successful solve, if there was one.
        last_weights: Option<DVector<f64>>,
    },

    /// Inference failed while predicting.
    #[error("inference failed for sample {sample}: {source}")]
    Prediction {
        sample: usize,
        #[source]
        source: OracleError,
    },

    /// An oracle call on a single input failed outside of training.
    #[error("oracle `{operation}` failed: {source}")]
    Evaluation {
        operation: &'static str,
        #[source]
        source: OracleError,
    },

    /// A weight vector does not match the oracle's feature dimension.
    #[error("weight vector has dimension {actual}, oracle expects {expected}")]
    WeightDimension { expected: usize, actual: usize },

    /// Inputs and labels passed to `fit` have different lengths.
    #[error("got {inputs} inputs but {labels} labels")]
    LengthMismatch { inputs: usize, labels: usize },

    /// A solver parameter is out of range.
    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),
}

impl CutplaneError {
    /// Sample index the error refers to, when it is tied to one.
    #[must_use]
    pub fn sample(&self) -> Option<usize> {
        match self {
            Self::Oracle { sample, .. }
            | Self::MalformedOracleOutput { sample, .. }
            | Self::DimensionMismatch { sample, .. }
            | Self::Prediction { sample, .. } => Some(*sample),
            _ => None,
        }
    }

    /// Outer iteration the error occurred in, when it happened during training.
    #[must_use]
    pub fn iteration(&self) -> Option<usize> {
        match self {
            Self::Oracle { iteration, .. }
            | Self::MalformedOracleOutput { iteration, .. }
            | Self::DimensionMismatch { iteration, .. }
            | Self::Solver { iteration, .. } => Some(*iteration),
            _ => None,
        }
    }
}

/// Result type alias for cutplane operations.
pub type Result<T> = std::result::Result<T, CutplaneError>;
