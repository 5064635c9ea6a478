//! # Prediction
//!
//! Applies a learned weight vector through the oracle's inference routine.

use nalgebra::DVector;

use crate::error::{CutplaneError, Result};
use crate::oracle::{LatentStructuredModel, StructuredModel};

fn check_dimension(expected: usize, weights: &DVector<f64>) -> Result<()> {
    if weights.len() != expected {
        return Err(CutplaneError::WeightDimension {
            expected,
            actual: weights.len(),
        });
    }
    Ok(())
}

fn prediction_error<E>(sample: usize) -> impl FnOnce(E) -> CutplaneError
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |err| CutplaneError::Prediction {
        sample,
        source: Box::new(err),
    }
}

fn evaluation_error<E>(operation: &'static str) -> impl FnOnce(E) -> CutplaneError
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |err| CutplaneError::Evaluation {
        operation,
        source: Box::new(err),
    }
}

/// Predictor for a fully observed model.
#[derive(Debug, Clone, Copy)]
pub struct Predictor<'a, M> {
    model: &'a M,
    weights: &'a DVector<f64>,
}

impl<'a, M: StructuredModel> Predictor<'a, M> {
    /// Fails if `weights` does not have the model's `size_psi` dimension.
    pub fn new(model: &'a M, weights: &'a DVector<f64>) -> Result<Self> {
        check_dimension(model.size_psi(), weights)?;
        Ok(Self { model, weights })
    }

    pub fn weights(&self) -> &DVector<f64> {
        self.weights
    }

    /// Predicts a label for every input, in order.
    pub fn predict(&self, inputs: &[M::Input]) -> Result<Vec<M::Label>> {
        inputs
            .iter()
            .enumerate()
            .map(|(sample, x)| {
                self.model
                    .inference(x, self.weights)
                    .map_err(prediction_error(sample))
            })
            .collect()
    }

    pub fn predict_one(&self, x: &M::Input) -> Result<M::Label> {
        self.model
            .inference(x, self.weights)
            .map_err(evaluation_error("inference"))
    }

    /// Joint score `w . psi(x, y)`.
    pub fn score(&self, x: &M::Input, y: &M::Label) -> Result<f64> {
        let psi = self.model.psi(x, y).map_err(evaluation_error("psi"))?;
        check_dimension(psi.len(), self.weights)?;
        Ok(self.weights.dot(&psi))
    }
}

/// Predictor for a latent model; surfaces only the label unless asked otherwise.
#[derive(Debug, Clone, Copy)]
pub struct LatentPredictor<'a, M> {
    model: &'a M,
    weights: &'a DVector<f64>,
}

impl<'a, M: LatentStructuredModel> LatentPredictor<'a, M> {
    pub fn new(model: &'a M, weights: &'a DVector<f64>) -> Result<Self> {
        check_dimension(model.size_psi(), weights)?;
        Ok(Self { model, weights })
    }

    pub fn weights(&self) -> &DVector<f64> {
        self.weights
    }

    /// Predicts the label `y_hat` of every input.
    pub fn predict(&self, inputs: &[M::Input]) -> Result<Vec<M::Label>> {
        inputs
            .iter()
            .enumerate()
            .map(|(sample, x)| {
                self.model
                    .inference(x, self.weights)
                    .map(|(_, y_hat)| y_hat)
                    .map_err(prediction_error(sample))
            })
            .collect()
    }

    /// Predicts `(h_hat, y_hat)` for every input.
    pub fn predict_with_latent(
        &self,
        inputs: &[M::Input],
    ) -> Result<Vec<(M::Latent, M::Label)>> {
        inputs
            .iter()
            .enumerate()
            .map(|(sample, x)| {
                self.model
                    .inference(x, self.weights)
                    .map_err(prediction_error(sample))
            })
            .collect()
    }

    /// Joint score `w . psi(x, h, y)`.
    pub fn score(&self, x: &M::Input, h: &M::Latent, y: &M::Label) -> Result<f64> {
        let psi = self.model.psi(x, h, y).map_err(evaluation_error("psi"))?;
        check_dimension(psi.len(), self.weights)?;
        Ok(self.weights.dot(&psi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fault, FaultyModel, MulticlassModel, SignModel, ViewModel};
    use approx::assert_relative_eq;

    #[test]
    fn predicts_sign_of_weighted_input() {
        let w = DVector::from_element(1, 0.5);
        let predictor = Predictor::new(&SignModel, &w).unwrap();
        assert_eq!(predictor.predict(&[2.0, -3.0]).unwrap(), vec![1, -1]);
        assert_eq!(predictor.predict_one(&4.0).unwrap(), 1);
        assert_relative_eq!(predictor.score(&2.0, &-1).unwrap(), -1.0);
    }

    #[test]
    fn prediction_is_deterministic() {
        let model = MulticlassModel::new(2, 3);
        let w = DVector::from_vec(vec![1.0, 0.0, 0.0, 1.0, -1.0, -1.0]);
        let inputs = vec![vec![2.0, 0.1], vec![0.1, 2.0], vec![-1.0, -1.0]];
        let predictor = Predictor::new(&model, &w).unwrap();

        let first = predictor.predict(&inputs).unwrap();
        let second = predictor.predict(&inputs).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec![0, 1, 2]);
        assert_eq!(model.inference_calls.get(), 6);
    }

    #[test]
    fn rejects_weights_of_wrong_dimension() {
        let w = DVector::zeros(3);
        let err = Predictor::new(&SignModel, &w).unwrap_err();
        assert!(matches!(
            err,
            CutplaneError::WeightDimension {
                expected: 1,
                actual: 3
            }
        ));
        assert!(LatentPredictor::new(&ViewModel, &w).is_err());
    }

    #[test]
    fn latent_predictor_surfaces_label_only() {
        let w = DVector::from_vec(vec![0.0, 1.0]);
        let predictor = LatentPredictor::new(&ViewModel, &w).unwrap();
        let inputs = vec![vec![5, 2], vec![5, -2]];

        assert_eq!(predictor.predict(&inputs).unwrap(), vec![1, -1]);
        assert_eq!(
            predictor.predict_with_latent(&inputs).unwrap(),
            vec![(1, 1), (1, -1)]
        );
        assert_relative_eq!(predictor.score(&inputs[0], &1, &1).unwrap(), 2.0);
    }

    #[test]
    fn batch_failure_names_the_sample() {
        let model = FaultyModel {
            fault: Fault::Inference(7),
        };
        let w = DVector::from_element(1, 1.0);
        let predictor = Predictor::new(&model, &w).unwrap();
        let err = predictor.predict(&[1, 2, 7]).unwrap_err();
        assert!(matches!(err, CutplaneError::Prediction { sample: 2, .. }));
    }

    #[test]
    fn single_input_failure_carries_no_sample_index() {
        let model = FaultyModel {
            fault: Fault::Inference(7),
        };
        let w = DVector::from_element(1, 1.0);
        let predictor = Predictor::new(&model, &w).unwrap();
        let err = predictor.predict_one(&7).unwrap_err();
        assert!(matches!(
            err,
            CutplaneError::Evaluation {
                operation: "inference",
                ..
            }
        ));
        assert_eq!(err.sample(), None);

        let model = MulticlassModel::new(2, 3);
        let w = DVector::zeros(6);
        let err = Predictor::new(&model, &w)
            .unwrap()
            .score(&vec![1.0, 0.0], &5)
            .unwrap_err();
        assert!(matches!(
            err,
            CutplaneError::Evaluation {
                operation: "psi",
                ..
            }
        ));
        assert_eq!(err.sample(), None);
    }

    #[test]
    fn empty_input_gives_empty_prediction() {
        let w = DVector::zeros(1);
        let predictor = Predictor::new(&SignModel, &w).unwrap();
        assert!(predictor.predict(&[]).unwrap().is_empty());
    }
}
