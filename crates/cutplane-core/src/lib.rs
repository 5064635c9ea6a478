//! # Cutplane Core
//!
//! Structured SVM training with the margin-rescaled cutting-plane algorithm
//! (l1 slack), plus its latent-variable extension. The problem-specific parts
//! (feature map, loss, inference) are supplied through the oracle traits; this
//! crate owns the working-set loop and the dual QP.
//!
//! ## Quick Start
//!
//! ```rust
//! use cutplane_core::{SolverConfig, StructuredModel, StructuredSvm};
//! use nalgebra::DVector;
//!
//! /// Binary labels on scalar inputs, `psi(x, y) = x * y`.
//! struct Sign;
//!
//! impl StructuredModel for Sign {
//!     type Input = f64;
//!     type Label = i32;
//!     type Error = std::convert::Infallible;
//!
//!     fn size_psi(&self) -> usize {
//!         1
//!     }
//!     fn psi(&self, x: &f64, y: &i32) -> Result<DVector<f64>, Self::Error> {
//!         Ok(DVector::from_element(1, x * f64::from(*y)))
//!     }
//!     fn loss(&self, y: &i32, y_hat: &i32) -> Result<f64, Self::Error> {
//!         Ok(f64::from((y - y_hat).abs()))
//!     }
//!     fn inference(&self, x: &f64, w: &DVector<f64>) -> Result<i32, Self::Error> {
//!         Ok(if w[0] * x >= 0.0 { 1 } else { -1 })
//!     }
//!     fn loss_augmented_inference(
//!         &self,
//!         x: &f64,
//!         y: &i32,
//!         w: &DVector<f64>,
//!     ) -> Result<i32, Self::Error> {
//!         let objective = |c: i32| f64::from((y - c).abs()) + w[0] * x * f64::from(c);
//!         Ok(if objective(1) > objective(-1) { 1 } else { -1 })
//!     }
//! }
//!
//! let svm = StructuredSvm::new(Sign, SolverConfig::default().with_max_iter(10));
//! let result = svm.fit(&[1.0, -1.0], &[1, -1]).unwrap();
//! assert!(result.converged());
//!
//! let predictor = svm.predictor(&result.weights).unwrap();
//! assert_eq!(predictor.predict(&[2.0, -0.5]).unwrap(), vec![1, -1]);
//! ```
pub mod config;
pub mod error;
pub mod observer;
pub mod oracle;
pub mod predictor;
pub mod qp;
pub mod trainer;
pub mod working_set;

#[cfg(test)]
mod testing;

// Re-export primary API
pub use config::{
    DEFAULT_BOX_SLACK, DEFAULT_FEATURE_SCALE, LatentConfig, LatentConstraintSource, QpConfig,
    SolverConfig,
};
pub use error::{CutplaneError, OracleError, Result};
pub use observer::{CancelToken, IterationReport, NoopObserver, ReportLog, TrainingObserver};
pub use oracle::{LatentStructuredModel, StructuredModel};
pub use predictor::{LatentPredictor, Predictor};
pub use qp::{ActiveSet, DualQp, QpError, QpProblem, QpSolution, QpSolve};
pub use trainer::{
    ConstraintStrategy, CuttingPlane, FitResult, LatentMarginRescaling, LatentStructuredSvm,
    MarginRescaling, Proposal, Site, StopReason, StructuredSvm,
};
pub use working_set::{LatentConstraint, SampleConstraint, WorkingEntry, WorkingSet};
