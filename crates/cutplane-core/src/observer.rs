//! # Training Observation
//!
//! Progress reporting and cooperative cancellation for long training runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// Summary of one outer iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationReport {
    /// Zero-based outer iteration.
    pub iteration: usize,
    /// Mean loss of the proposed labels over all samples.
    pub mean_loss: f64,
    /// Summed loss of the newly inserted constraints, divided by the sample count.
    pub new_constraint_loss: f64,
    /// Constraints added during this iteration.
    pub new_constraints: usize,
    /// Working-set size after this iteration.
    pub working_set_len: usize,
    /// Support vectors of the QP solve, `None` when no solve ran.
    pub support_vectors: Option<usize>,
    /// Coefficients at `C` in the QP solve, `None` when no solve ran.
    pub at_upper_bound: Option<usize>,
}

/// Receives progress notifications from a training run.
///
/// `H` is the latent state type; fully observed trainers use `()`.
pub trait TrainingObserver<H = ()> {
    /// Called once at the end of each outer iteration.
    fn on_iteration(&mut self, _report: &IterationReport) {}

    /// Called for every sample of the latent trainer with the completed and the
    /// predicted latent states.
    fn on_latent_step(&mut self, _iteration: usize, _sample: usize, _h: &H, _h_hat: &H) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl<H> TrainingObserver<H> for NoopObserver {}

/// Observer that keeps every iteration report.
#[derive(Debug, Clone, Default)]
pub struct ReportLog {
    pub reports: Vec<IterationReport>,
}

impl<H> TrainingObserver<H> for ReportLog {
    fn on_iteration(&mut self, report: &IterationReport) {
        self.reports.push(report.clone());
    }
}

/// Shared flag checked by the trainers at every outer iteration boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that training stops at the next iteration boundary.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
