//! # Solver Configuration
//!
//! Hyper-parameters for the cutting-plane trainers and the dual QP.

use serde::{Deserialize, Serialize};

use crate::error::{CutplaneError, Result};

/// Factor applied to every feature difference before it enters the working set.
pub const DEFAULT_FEATURE_SCALE: f64 = 1.0 / 1000.0;

/// Dual coefficients above this value mark support vectors.
pub const DEFAULT_SUPPORT_THRESHOLD: f64 = 1e-5;

/// Coefficients within this distance of `C` count as pinned at the upper bound.
pub const DEFAULT_UPPER_BOUND_TOLERANCE: f64 = 1e-3;

/// Rounding a solver may leave outside `[0, C]` before its output is rejected.
pub const DEFAULT_BOX_SLACK: f64 = 1e-6;

/// Settings for the box-constrained dual QP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QpConfig {
    /// Maximum projected-gradient violation accepted as optimal.
    pub tolerance: f64,
    /// Active-set steps before the solve is declared non-convergent.
    pub max_steps: usize,
    /// Threshold above which a coefficient is a support vector.
    pub support_threshold: f64,
    /// Distance from `C` under which a coefficient counts as bounded.
    pub upper_bound_tolerance: f64,
    /// Distance outside `[0, C]` tolerated in solver output and clipped away.
    pub box_slack: f64,
}

impl Default for QpConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_steps: 10_000,
            support_threshold: DEFAULT_SUPPORT_THRESHOLD,
            upper_bound_tolerance: DEFAULT_UPPER_BOUND_TOLERANCE,
            box_slack: DEFAULT_BOX_SLACK,
        }
    }
}

/// Configuration shared by the plain and latent cutting-plane trainers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Regularization constant, the upper bound on every dual coefficient.
    pub c: f64,
    /// Maximum number of outer (constraint generation) iterations.
    pub max_iter: usize,
    /// Conditioning factor applied to feature differences.
    pub feature_scale: f64,
    /// Dual QP settings.
    pub qp: QpConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            feature_scale: DEFAULT_FEATURE_SCALE,
            qp: QpConfig::default(),
        }
    }
}

impl SolverConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the regularization constant `C`.
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set the outer iteration budget.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Override the feature-difference conditioning factor.
    pub fn with_feature_scale(mut self, scale: f64) -> Self {
        self.feature_scale = scale;
        self
    }

    /// Replace the QP settings.
    pub fn with_qp(mut self, qp: QpConfig) -> Self {
        self.qp = qp;
        self
    }

    /// Checks that every parameter is in range.
    pub fn validate(&self) -> Result<()> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(CutplaneError::InvalidConfig(format!(
                "C must be positive and finite, got {}",
                self.c
            )));
        }
        if !(self.feature_scale.is_finite() && self.feature_scale > 0.0) {
            return Err(CutplaneError::InvalidConfig(format!(
                "feature scale must be positive and finite, got {}",
                self.feature_scale
            )));
        }
        if !(self.qp.tolerance.is_finite() && self.qp.tolerance > 0.0) {
            return Err(CutplaneError::InvalidConfig(format!(
                "QP tolerance must be positive, got {}",
                self.qp.tolerance
            )));
        }
        if self.qp.max_steps == 0 {
            return Err(CutplaneError::InvalidConfig(
                "QP needs at least one step".into(),
            ));
        }
        if self.qp.support_threshold < 0.0
            || self.qp.upper_bound_tolerance < 0.0
            || self.qp.box_slack < 0.0
        {
            return Err(CutplaneError::InvalidConfig(
                "QP thresholds must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Which oracle call supplies the candidate constraint in the latent trainer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatentConstraintSource {
    /// Plain inference `(h_hat, y_hat) = inference(x, w)`.
    #[default]
    Inference,
    /// Loss-augmented inference `(h_hat, y_hat) = loss_augmented_inference(x, y, w)`.
    LossAugmented,
}

/// Configuration of the latent-variable trainer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatentConfig {
    pub solver: SolverConfig,
    pub constraint_source: LatentConstraintSource,
}

impl LatentConfig {
    pub fn new(solver: SolverConfig) -> Self {
        Self {
            solver,
            constraint_source: LatentConstraintSource::default(),
        }
    }

    /// Choose which oracle call proposes constraints.
    pub fn with_constraint_source(mut self, source: LatentConstraintSource) -> Self {
        self.constraint_source = source;
        self
    }
}
