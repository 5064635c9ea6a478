//! Latent-variable structured SVM.
//!
//! Each sample is completed with its best latent state under the current weights
//! before the violated constraint is searched. Dual solves always start from
//! zero: the latent completions, and with them the feature differences of the
//! planes, move between iterations.

use std::hash::Hash;

use nalgebra::DVector;

use super::{ConstraintStrategy, CuttingPlane, FitResult, Proposal, Site};
use crate::config::{LatentConfig, LatentConstraintSource};
use crate::error::Result;
use crate::observer::{CancelToken, NoopObserver, TrainingObserver};
use crate::oracle::LatentStructuredModel;
use crate::predictor::LatentPredictor;
use crate::qp::{ActiveSet, QpSolve};
use crate::working_set::LatentConstraint;

/// Constraint strategy of the latent trainer, keyed by `(x, h, y, h_hat, y_hat)`.
#[derive(Debug, Clone)]
pub struct LatentMarginRescaling<M> {
    model: M,
    source: LatentConstraintSource,
}

impl<M> LatentMarginRescaling<M> {
    pub fn new(model: M, source: LatentConstraintSource) -> Self {
        Self { model, source }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn source(&self) -> LatentConstraintSource {
        self.source
    }
}

impl<M> ConstraintStrategy for LatentMarginRescaling<M>
where
    M: LatentStructuredModel,
    M::Input: Clone + Eq + Hash,
    M::Label: Eq + Hash,
    M::Latent: Eq + Hash,
{
    type Input = M::Input;
    type Label = M::Label;
    type Latent = M::Latent;
    type Key = LatentConstraint<M::Input, M::Latent, M::Label>;

    fn size_psi(&self) -> usize {
        self.model.size_psi()
    }

    fn warm_start(&self) -> bool {
        false
    }

    fn propose(
        &self,
        site: Site,
        x: &M::Input,
        y: &M::Label,
        w: &DVector<f64>,
    ) -> Result<Proposal<Self::Key, M::Latent>> {
        let h = self.model.latent(x, y, w).map_err(site.oracle("latent"))?;
        let (h_hat, y_hat) = match self.source {
            LatentConstraintSource::Inference => self
                .model
                .inference(x, w)
                .map_err(site.oracle("inference"))?,
            LatentConstraintSource::LossAugmented => self
                .model
                .loss_augmented_inference(x, y, w)
                .map_err(site.oracle("loss_augmented_inference"))?,
        };
        let loss = self.model.loss(y, &y_hat).map_err(site.oracle("loss"))?;

        Ok(Proposal {
            key: LatentConstraint {
                input: x.clone(),
                latent: h.clone(),
                label: y.clone(),
                predicted_latent: h_hat.clone(),
                predicted: y_hat,
            },
            loss,
            latent: Some((h, h_hat)),
        })
    }

    fn joint_features(
        &self,
        site: Site,
        x: &M::Input,
        key: &Self::Key,
    ) -> Result<(DVector<f64>, DVector<f64>)> {
        let truth = self
            .model
            .psi(x, &key.latent, &key.label)
            .map_err(site.oracle("psi"))?;
        let predicted = self
            .model
            .psi(x, &key.predicted_latent, &key.predicted)
            .map_err(site.oracle("psi"))?;
        Ok((truth, predicted))
    }
}

/// Cutting-plane trainer for a [`LatentStructuredModel`].
#[derive(Debug, Clone)]
pub struct LatentStructuredSvm<M, Q = ActiveSet> {
    engine: CuttingPlane<LatentMarginRescaling<M>, Q>,
}

impl<M> LatentStructuredSvm<M>
where
    M: LatentStructuredModel,
    M::Input: Clone + Eq + Hash,
    M::Label: Eq + Hash,
    M::Latent: Eq + Hash,
{
    pub fn new(model: M, config: LatentConfig) -> Self {
        let strategy = LatentMarginRescaling::new(model, config.constraint_source);
        Self {
            engine: CuttingPlane::new(strategy, config.solver),
        }
    }
}

impl<M, Q> LatentStructuredSvm<M, Q>
where
    M: LatentStructuredModel,
    M::Input: Clone + Eq + Hash,
    M::Label: Eq + Hash,
    M::Latent: Eq + Hash,
    Q: QpSolve,
{
    pub fn with_qp_solver(model: M, config: LatentConfig, qp: Q) -> Self {
        let strategy = LatentMarginRescaling::new(model, config.constraint_source);
        Self {
            engine: CuttingPlane::with_qp_solver(strategy, config.solver, qp),
        }
    }

    pub fn model(&self) -> &M {
        self.engine.strategy().model()
    }

    pub fn fit(&self, inputs: &[M::Input], labels: &[M::Label]) -> Result<FitResult> {
        self.engine
            .fit(inputs, labels, &mut NoopObserver, &CancelToken::new())
    }

    /// Trains while reporting iterations and per-sample latent states to `observer`.
    pub fn fit_observed<O>(
        &self,
        inputs: &[M::Input],
        labels: &[M::Label],
        observer: &mut O,
        cancel: &CancelToken,
    ) -> Result<FitResult>
    where
        O: TrainingObserver<M::Latent> + ?Sized,
    {
        self.engine.fit(inputs, labels, observer, cancel)
    }

    pub fn predictor<'a>(&'a self, weights: &'a DVector<f64>) -> Result<LatentPredictor<'a, M>> {
        LatentPredictor::new(self.model(), weights)
    }
}
