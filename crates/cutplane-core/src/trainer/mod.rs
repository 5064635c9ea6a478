//! # Cutting-Plane Training
//!
//! The working-set loop shared by the fully observed and the latent trainers.
//! Each outer iteration sweeps the training set, asks the constraint strategy for
//! the most violated label of every sample, inserts the constraints that are both
//! violated and new, and re-solves the dual over the whole working set. Training
//! stops when a sweep adds nothing, when the iteration budget runs out, or when
//! the run is cancelled.

pub mod latent;
pub mod plain;

use std::hash::Hash;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::{info, trace, warn};

use crate::config::SolverConfig;
use crate::error::{CutplaneError, Result};
use crate::observer::{CancelToken, IterationReport, TrainingObserver};
use crate::qp::{ActiveSet, DualQp, QpSolve};
use crate::working_set::WorkingSet;

pub use latent::{LatentMarginRescaling, LatentStructuredSvm};
pub use plain::{MarginRescaling, StructuredSvm};

/// Position in a training run, attached to every oracle failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Site {
    pub iteration: usize,
    pub sample: usize,
}

impl Site {
    /// Wraps an oracle error raised by `operation` at this site.
    pub fn oracle<E>(self, operation: &'static str) -> impl FnOnce(E) -> CutplaneError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        move |err| CutplaneError::Oracle {
            iteration: self.iteration,
            sample: self.sample,
            operation,
            source: Box::new(err),
        }
    }

    fn malformed(self, reason: String) -> CutplaneError {
        CutplaneError::MalformedOracleOutput {
            iteration: self.iteration,
            sample: self.sample,
            reason,
        }
    }
}

/// A candidate cutting plane for one sample.
#[derive(Debug, Clone)]
pub struct Proposal<K, H> {
    pub key: K,
    pub loss: f64,
    /// Completed and predicted latent states, reported to the observer.
    pub latent: Option<(H, H)>,
}

/// How a trainer turns a labelled sample into a candidate constraint.
pub trait ConstraintStrategy {
    type Input;
    type Label;
    type Latent;
    type Key: Clone + Eq + Hash;

    fn size_psi(&self) -> usize;

    /// Whether dual solves may be seeded from the previous solution.
    fn warm_start(&self) -> bool;

    /// Proposes the most violated constraint for `(x, y)` under `w`.
    fn propose(
        &self,
        site: Site,
        x: &Self::Input,
        y: &Self::Label,
        w: &DVector<f64>,
    ) -> Result<Proposal<Self::Key, Self::Latent>>;

    /// Joint feature vectors of the truth and of the prediction named by `key`.
    fn joint_features(
        &self,
        site: Site,
        x: &Self::Input,
        key: &Self::Key,
    ) -> Result<(DVector<f64>, DVector<f64>)>;
}

/// Why a training run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// A full sweep produced no new constraint.
    Converged,
    /// The outer iteration budget was used up.
    MaxIterations,
    /// The cancel token was triggered.
    Cancelled,
}

/// Result of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    /// Learned weight vector, of dimension `size_psi`.
    pub weights: DVector<f64>,
    /// Outer iterations started.
    pub iterations: usize,
    pub stop: StopReason,
    /// Constraints accumulated over the run.
    pub working_set_len: usize,
    pub last_report: Option<IterationReport>,
}

impl FitResult {
    #[must_use]
    pub fn converged(&self) -> bool {
        self.stop == StopReason::Converged
    }
}

/// Generic cutting-plane trainer over a constraint strategy `S` and a QP solver `Q`.
#[derive(Debug, Clone)]
pub struct CuttingPlane<S, Q = ActiveSet> {
    strategy: S,
    config: SolverConfig,
    qp: Q,
}

impl<S: ConstraintStrategy> CuttingPlane<S> {
    /// Create a trainer using the built-in active-set QP solver.
    pub fn new(strategy: S, config: SolverConfig) -> Self {
        let qp = ActiveSet::from_config(&config.qp);
        Self {
            strategy,
            config,
            qp,
        }
    }
}

impl<S, Q> CuttingPlane<S, Q>
where
    S: ConstraintStrategy,
    Q: QpSolve,
{
    /// Create a trainer with a custom QP solver.
    pub fn with_qp_solver(strategy: S, config: SolverConfig, qp: Q) -> Self {
        Self {
            strategy,
            config,
            qp,
        }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Runs the cutting-plane loop.
    ///
    /// Every call starts from an empty working set and a zero weight vector.
    pub fn fit<O>(
        &self,
        inputs: &[S::Input],
        labels: &[S::Label],
        observer: &mut O,
        cancel: &CancelToken,
    ) -> Result<FitResult>
    where
        O: TrainingObserver<S::Latent> + ?Sized,
    {
        self.config.validate()?;
        if inputs.len() != labels.len() {
            return Err(CutplaneError::LengthMismatch {
                inputs: inputs.len(),
                labels: labels.len(),
            });
        }

        let size_psi = self.strategy.size_psi();
        let scale = self.config.feature_scale;
        let n_samples = inputs.len().max(1) as f64;

        let mut w = DVector::zeros(size_psi);
        let mut working_set = WorkingSet::new(size_psi);
        let mut dual = DualQp::new(
            &self.qp,
            self.config.c,
            &self.config.qp,
            self.strategy.warm_start(),
        );
        let mut solved = false;
        let mut last_report = None;

        for iteration in 0..self.config.max_iter {
            if cancel.is_cancelled() {
                info!(iteration, "training cancelled");
                return Ok(FitResult {
                    weights: w,
                    iterations: iteration,
                    stop: StopReason::Cancelled,
                    working_set_len: working_set.len(),
                    last_report,
                });
            }

            let mut new_constraints = 0usize;
            let mut total_loss = 0.0;
            let mut new_loss = 0.0;

            for (sample, (x, y)) in inputs.iter().zip(labels).enumerate() {
                let site = Site { iteration, sample };
                let proposal = self.strategy.propose(site, x, y, &w)?;
                let loss = proposal.loss;
                if !loss.is_finite() || loss < 0.0 {
                    return Err(site.malformed(format!("loss must be finite and >= 0, got {loss}")));
                }
                total_loss += loss;

                if let Some((h, h_hat)) = &proposal.latent {
                    observer.on_latent_step(iteration, sample, h, h_hat);
                }

                if loss > 0.0 && !working_set.contains(&proposal.key) {
                    let diff = self.feature_difference(site, x, &proposal.key, scale)?;
                    working_set.insert(proposal.key, diff, loss);
                    new_constraints += 1;
                    new_loss += loss;
                    trace!(iteration, sample, loss, "constraint added");
                }
            }

            let mut report = IterationReport {
                iteration,
                mean_loss: total_loss / n_samples,
                new_constraint_loss: new_loss / n_samples,
                new_constraints,
                working_set_len: working_set.len(),
                support_vectors: None,
                at_upper_bound: None,
            };

            if new_constraints == 0 {
                info!(iteration, mean_loss = report.mean_loss, "no new constraints, stopping");
                observer.on_iteration(&report);
                return Ok(FitResult {
                    weights: w,
                    iterations: iteration + 1,
                    stop: StopReason::Converged,
                    working_set_len: working_set.len(),
                    last_report: Some(report),
                });
            }

            let solution = dual
                .solve(&working_set)
                .map_err(|source| CutplaneError::Solver {
                    iteration,
                    source,
                    last_weights: solved.then(|| w.clone()),
                })?;
            w = solution.weights;
            solved = true;

            report.support_vectors = Some(solution.support_vectors);
            report.at_upper_bound = Some(solution.at_upper_bound);
            info!(
                iteration,
                mean_loss = report.mean_loss,
                new_constraints,
                constraints = working_set.len(),
                support_vectors = solution.support_vectors,
                at_upper_bound = solution.at_upper_bound,
                "cutting-plane iteration"
            );
            observer.on_iteration(&report);
            last_report = Some(report);
        }

        warn!(
            max_iter = self.config.max_iter,
            constraints = working_set.len(),
            "iteration budget exhausted before convergence"
        );
        Ok(FitResult {
            weights: w,
            iterations: self.config.max_iter,
            stop: StopReason::MaxIterations,
            working_set_len: working_set.len(),
            last_report,
        })
    }

    /// Scaled `psi(truth) - psi(prediction)`, with dimension and finiteness checks.
    fn feature_difference(
        &self,
        site: Site,
        x: &S::Input,
        key: &S::Key,
        scale: f64,
    ) -> Result<DVector<f64>> {
        let expected = self.strategy.size_psi();
        let (truth, predicted) = self.strategy.joint_features(site, x, key)?;
        for actual in [truth.len(), predicted.len()] {
            if actual != expected {
                return Err(CutplaneError::DimensionMismatch {
                    iteration: site.iteration,
                    sample: site.sample,
                    expected,
                    actual,
                });
            }
        }
        let diff = (truth - predicted) * scale;
        if diff.iter().any(|v| !v.is_finite()) {
            return Err(site.malformed("feature map produced a non-finite value".into()));
        }
        Ok(diff)
    }
}
