//! Margin-rescaled structured SVM with l1 slack.

use std::hash::Hash;

use nalgebra::DVector;

use super::{ConstraintStrategy, CuttingPlane, FitResult, Proposal, Site};
use crate::config::SolverConfig;
use crate::error::Result;
use crate::observer::{CancelToken, NoopObserver, TrainingObserver};
use crate::oracle::StructuredModel;
use crate::predictor::Predictor;
use crate::qp::{ActiveSet, QpSolve};
use crate::working_set::SampleConstraint;

/// Constraint strategy of the fully observed trainer.
///
/// The most violated label comes from loss-augmented inference and constraints
/// are keyed by `(sample, y, y_hat)`.
#[derive(Debug, Clone)]
pub struct MarginRescaling<M> {
    model: M,
}

impl<M> MarginRescaling<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M> ConstraintStrategy for MarginRescaling<M>
where
    M: StructuredModel,
    M::Label: Eq + Hash,
{
    type Input = M::Input;
    type Label = M::Label;
    type Latent = ();
    type Key = SampleConstraint<M::Label>;

    fn size_psi(&self) -> usize {
        self.model.size_psi()
    }

    fn warm_start(&self) -> bool {
        true
    }

    fn propose(
        &self,
        site: Site,
        x: &M::Input,
        y: &M::Label,
        w: &DVector<f64>,
    ) -> Result<Proposal<Self::Key, ()>> {
        let y_hat = self
            .model
            .loss_augmented_inference(x, y, w)
            .map_err(site.oracle("loss_augmented_inference"))?;
        let loss = self.model.loss(y, &y_hat).map_err(site.oracle("loss"))?;
        Ok(Proposal {
            key: SampleConstraint {
                sample: site.sample,
                label: y.clone(),
                predicted: y_hat,
            },
            loss,
            latent: None,
        })
    }

    fn joint_features(
        &self,
        site: Site,
        x: &M::Input,
        key: &Self::Key,
    ) -> Result<(DVector<f64>, DVector<f64>)> {
        let truth = self.model.psi(x, &key.label).map_err(site.oracle("psi"))?;
        let predicted = self
            .model
            .psi(x, &key.predicted)
            .map_err(site.oracle("psi"))?;
        Ok((truth, predicted))
    }
}

/// Cutting-plane trainer for a fully observed [`StructuredModel`].
#[derive(Debug, Clone)]
pub struct StructuredSvm<M, Q = ActiveSet> {
    engine: CuttingPlane<MarginRescaling<M>, Q>,
}

impl<M> StructuredSvm<M>
where
    M: StructuredModel,
    M::Label: Eq + Hash,
{
    pub fn new(model: M, config: SolverConfig) -> Self {
        Self {
            engine: CuttingPlane::new(MarginRescaling::new(model), config),
        }
    }
}

impl<M, Q> StructuredSvm<M, Q>
where
    M: StructuredModel,
    M::Label: Eq + Hash,
    Q: QpSolve,
{
    /// Create a trainer that solves the dual with `qp`.
    pub fn with_qp_solver(model: M, config: SolverConfig, qp: Q) -> Self {
        Self {
            engine: CuttingPlane::with_qp_solver(MarginRescaling::new(model), config, qp),
        }
    }

    pub fn model(&self) -> &M {
        self.engine.strategy().model()
    }

    pub fn config(&self) -> &SolverConfig {
        self.engine.config()
    }

    /// Learns a weight vector from `inputs` and their true `labels`.
    pub fn fit(&self, inputs: &[M::Input], labels: &[M::Label]) -> Result<FitResult> {
        self.engine
            .fit(inputs, labels, &mut NoopObserver, &CancelToken::new())
    }

    /// Like [`fit`](Self::fit), reporting progress to `observer` and honouring `cancel`.
    pub fn fit_observed<O>(
        &self,
        inputs: &[M::Input],
        labels: &[M::Label],
        observer: &mut O,
        cancel: &CancelToken,
    ) -> Result<FitResult>
    where
        O: TrainingObserver + ?Sized,
    {
        self.engine.fit(inputs, labels, observer, cancel)
    }

    /// Predictor applying `weights` through this trainer's model.
    pub fn predictor<'a>(&'a self, weights: &'a DVector<f64>) -> Result<Predictor<'a, M>> {
        Predictor::new(self.model(), weights)
    }
}
