//! # Dual Quadratic Program
//!
//! The margin-rescaled structured SVM dual over a working set:
//!
//! ```text
//! maximize   sum_i alpha_i * loss_i - 1/2 * alpha' K alpha
//! subject to 0 <= alpha_i <= C
//! ```
//!
//! where `K` is the Gram matrix of the feature differences. Solving the box QP is
//! delegated to a [`QpSolve`] implementation; [`DualQp`] turns the coefficients
//! into a primal weight vector.

pub mod active_set;
pub mod dual;

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

pub use active_set::ActiveSet;
pub use dual::{DualQp, QpSolution};

/// Failures of the box-constrained QP solve.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QpError {
    /// The step budget ran out before the optimality tolerance was met.
    #[error("did not converge after {steps} steps (max violation {violation:e})")]
    NotConverged { steps: usize, violation: f64 },

    /// A non-finite value appeared in the problem data or the iterate.
    #[error("non-finite value at coefficient {index}")]
    NonFinite { index: usize },

    /// The Gram matrix and the loss vector disagree in size.
    #[error("Gram matrix is {gram}x{gram} but there are {losses} losses")]
    ShapeMismatch { gram: usize, losses: usize },

    /// The box bound `C` is not positive and finite.
    #[error("invalid box bound {0}")]
    InvalidBound(f64),

    /// A solver returned a coefficient outside `[0, C]`.
    #[error("coefficient {index} = {value} lies outside the box")]
    OutOfBox { index: usize, value: f64 },
}

/// A box-constrained dual QP instance.
#[derive(Debug, Clone)]
pub struct QpProblem {
    pub gram: DMatrix<f64>,
    pub losses: DVector<f64>,
    pub c: f64,
}

impl QpProblem {
    pub fn new(gram: DMatrix<f64>, losses: DVector<f64>, c: f64) -> Self {
        Self { gram, losses, c }
    }

    pub fn len(&self) -> usize {
        self.losses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.losses.is_empty()
    }

    /// Dual objective `sum_i alpha_i * loss_i - 1/2 * alpha' K alpha`.
    pub fn objective(&self, alpha: &DVector<f64>) -> f64 {
        self.losses.dot(alpha) - 0.5 * alpha.dot(&(&self.gram * alpha))
    }

    /// Checks shapes, the bound, and finiteness of the data.
    pub fn validate(&self) -> Result<(), QpError> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(QpError::InvalidBound(self.c));
        }
        let n = self.losses.len();
        if self.gram.nrows() != n || self.gram.ncols() != n {
            return Err(QpError::ShapeMismatch {
                gram: self.gram.nrows(),
                losses: n,
            });
        }
        for i in 0..n {
            if !self.losses[i].is_finite() || self.gram.row(i).iter().any(|v| !v.is_finite()) {
                return Err(QpError::NonFinite { index: i });
            }
        }
        Ok(())
    }
}

/// Black-box solver for [`QpProblem`].
pub trait QpSolve {
    /// Returns the optimal dual coefficients, optionally starting from `warm_start`.
    ///
    /// A warm start may be shorter than the problem (constraints appended since);
    /// missing coefficients start at zero.
    fn solve(
        &self,
        problem: &QpProblem,
        warm_start: Option<&DVector<f64>>,
    ) -> Result<DVector<f64>, QpError>;
}

impl<T: QpSolve + ?Sized> QpSolve for &T {
    fn solve(
        &self,
        problem: &QpProblem,
        warm_start: Option<&DVector<f64>>,
    ) -> Result<DVector<f64>, QpError> {
        (**self).solve(problem, warm_start)
    }
}
